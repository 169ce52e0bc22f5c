//! Fixed-capacity byte storage for RAM, VRAM, OAM, and ROM banks.

/// Bounds-checked byte array of compile-time capacity `N`.
///
/// Out-of-range access is a programming error (an address-decoding bug), not
/// a recoverable condition: callers pre-validate, and indexing panics with a
/// clear message in debug builds.
#[derive(Clone)]
pub struct FixedStore<const N: usize> {
    bytes: Box<[u8; N]>,
}

impl<const N: usize> FixedStore<N> {
    /// Zero-filled store.
    pub fn new() -> Self {
        Self {
            bytes: Box::new([0; N]),
        }
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    pub fn read(&self, addr: usize) -> u8 {
        debug_assert!(addr < N, "FixedStore read out of range: {addr:#06x} >= {N:#06x}");
        self.bytes[addr]
    }

    pub fn write(&mut self, addr: usize, value: u8) {
        debug_assert!(addr < N, "FixedStore write out of range: {addr:#06x} >= {N:#06x}");
        self.bytes[addr] = value;
    }

    /// Bulk-copy `src` into the store starting at `addr`.
    /// Requires `addr + src.len() <= N`.
    pub fn load(&mut self, addr: usize, src: &[u8]) {
        debug_assert!(
            addr + src.len() <= N,
            "FixedStore load out of range: {addr:#06x}+{} > {N:#06x}",
            src.len()
        );
        self.bytes[addr..addr + src.len()].copy_from_slice(src);
    }
}

impl<const N: usize> Default for FixedStore<N> {
    fn default() -> Self {
        Self::new()
    }
}
