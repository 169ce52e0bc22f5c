//! Memory bus and address decoding.
//!
//! Routes every CPU-visible address to internal RAM, the PPU register
//! ports, the APU/IO range, or the cartridge. The decode is total: all
//! 64 KiB resolve, with open-bus reads ($40) for unmapped or write-only
//! locations.

use crate::apu::apu::Apu;
use crate::cartridge::cartridge::Cartridge;
use crate::gamepad::Gamepad;
use crate::ppu::ppu::Ppu;
use crate::storage::FixedStore;

/// Internal RAM: 2 KiB, mirrored four times through $0000-$1FFF.
pub const RAM_LEN: usize = 0x800;

/// Memory access seam between the CPU and the rest of the machine.
pub trait Bus {
    fn read(&mut self, addr: u16) -> u8;
    fn write(&mut self, addr: u16, data: u8);
    /// Consume a pending non-maskable interrupt request.
    fn poll_nmi(&mut self) -> bool;
    /// Level of the maskable interrupt line.
    fn poll_irq(&mut self) -> bool;
}

/// The console bus: RAM, PPU, APU, two gamepad slots, and the cartridge.
pub struct NesBus {
    pub ram: FixedStore<RAM_LEN>,
    pub ppu: Ppu,
    pub apu: Apu,
    pub gamepads: [Gamepad; 2],
    pub cart: Option<Cartridge>,
    /// Bumped by the console once per completed frame; drives gamepad
    /// turbo timing.
    pub frame_index: u64,
}

impl NesBus {
    pub fn new() -> Self {
        Self {
            ram: FixedStore::new(),
            ppu: Ppu::new(),
            apu: Apu::new(),
            gamepads: [Gamepad::new(), Gamepad::new()],
            cart: None,
            frame_index: 0,
        }
    }

    /// Replace the cartridge. The APU adopts the image's video standard;
    /// the owning console resets the CPU afterwards.
    pub fn attach_cartridge(&mut self, cart: Cartridge) {
        self.apu.set_region(cart.region());
        self.cart = Some(cart);
    }
}

impl Default for NesBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Bus for NesBus {
    fn read(&mut self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x1FFF => self.ram.read((addr & 0x07FF) as usize),
            // 8 PPU ports, mirrored every 8 bytes
            0x2000..=0x3FFF => match addr & 0x2007 {
                0x2002 => self.ppu.read_status(),
                0x2004 => self.ppu.read_oam_data(),
                0x2007 => match &self.cart {
                    Some(cart) => self.ppu.read_data(cart),
                    None => 0x40,
                },
                _ => 0x40, // write-only ports read as open bus
            },
            0x4015 => self.apu.read_status(),
            0x4016 => self.gamepads[0].read(),
            0x4017 => self.gamepads[1].read(),
            0x4000..=0x5FFF => 0x40,
            0x6000..=0xFFFF => match &self.cart {
                Some(cart) => cart.read_program(addr),
                None => 0x40,
            },
        }
    }

    fn write(&mut self, addr: u16, data: u8) {
        match addr {
            0x0000..=0x1FFF => self.ram.write((addr & 0x07FF) as usize, data),
            0x2000..=0x3FFF => match addr & 0x2007 {
                0x2000 => self.ppu.write_ctrl(data),
                0x2001 => self.ppu.write_mask(data),
                0x2003 => self.ppu.write_oam_addr(data),
                0x2004 => self.ppu.write_oam_data(data),
                0x2005 => self.ppu.write_scroll(data),
                0x2006 => self.ppu.write_addr(data),
                0x2007 => {
                    if let Some(cart) = &mut self.cart {
                        self.ppu.write_data(cart, data);
                    }
                }
                _ => {}
            },
            0x4014 => self.ppu.oam_dma(&self.ram, data),
            0x4016 => {
                for pad in &mut self.gamepads {
                    pad.write(data, self.frame_index);
                }
            }
            0x4000..=0x4013 | 0x4015 | 0x4017 => self.apu.write(addr, data),
            0x4018..=0x5FFF => {}
            0x6000..=0xFFFF => {
                if let Some(cart) = &mut self.cart {
                    // Mapper rejections (ROM writes, absent RAM) are
                    // recoverable: log and drop
                    if let Err(err) = cart.write_program(addr, data) {
                        tracing::warn!(%err, addr, "cartridge write ignored");
                    }
                }
            }
        }
    }

    fn poll_nmi(&mut self) -> bool {
        self.ppu.take_nmi()
    }

    fn poll_irq(&mut self) -> bool {
        self.apu.irq_pending()
    }
}
