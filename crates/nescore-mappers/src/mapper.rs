//! Cartridge mapper dispatch.
//!
//! Supported boards are represented as variants of a single [`Mapper`] enum
//! rather than as trait objects. The emulator only ever needs to support a
//! small, fixed set of boards, so a closed `match` dispatches faster than a
//! vtable call and keeps mapper state inline (no heap allocation, no
//! `dyn`-safety constraints on new methods).

use crate::{Cnrom, Mirroring, Mmc1, Mmc3, Nrom, Rom, RomError};

/// A cartridge mapper, dispatching to one of the supported boards.
#[derive(Debug, Clone)]
pub enum Mapper {
    /// Mapper 0: NROM.
    Nrom(Nrom),
    /// Mapper 1: MMC1.
    Mmc1(Mmc1),
    /// Mapper 3: CNROM.
    Cnrom(Cnrom),
    /// Mapper 4: MMC3.
    Mmc3(Mmc3),
}

impl Mapper {
    /// Build the appropriate mapper for a loaded ROM.
    ///
    /// # Errors
    ///
    /// Returns [`RomError::UnsupportedFormat`] if the ROM's mapper number
    /// does not match one of the supported boards.
    pub fn from_rom(rom: &Rom) -> Result<Self, RomError> {
        match rom.header.mapper_number {
            0 => Ok(Mapper::Nrom(Nrom::new(rom))),
            1 => Ok(Mapper::Mmc1(Mmc1::new(rom))),
            3 => Ok(Mapper::Cnrom(Cnrom::new(rom))),
            4 => Ok(Mapper::Mmc3(Mmc3::new(rom))),
            n => Err(RomError::UnsupportedFormat(format!("mapper {n}"))),
        }
    }

    /// Read a byte from CPU address space (`$6000-$FFFF`).
    #[must_use]
    pub fn read_prg(&self, addr: u16) -> u8 {
        match self {
            Mapper::Nrom(m) => m.read_prg(addr),
            Mapper::Mmc1(m) => m.read_prg(addr),
            Mapper::Cnrom(m) => m.read_prg(addr),
            Mapper::Mmc3(m) => m.read_prg(addr),
        }
    }

    /// Write a byte to CPU address space (`$6000-$FFFF`).
    pub fn write_prg(&mut self, addr: u16, value: u8) {
        match self {
            Mapper::Nrom(m) => m.write_prg(addr, value),
            Mapper::Mmc1(m) => m.write_prg(addr, value),
            Mapper::Cnrom(m) => m.write_prg(addr, value),
            Mapper::Mmc3(m) => m.write_prg(addr, value),
        }
    }

    /// Read a byte from PPU pattern-table address space (`$0000-$1FFF`).
    #[must_use]
    pub fn read_chr(&self, addr: u16) -> u8 {
        match self {
            Mapper::Nrom(m) => m.read_chr(addr),
            Mapper::Mmc1(m) => m.read_chr(addr),
            Mapper::Cnrom(m) => m.read_chr(addr),
            Mapper::Mmc3(m) => m.read_chr(addr),
        }
    }

    /// Write a byte to PPU pattern-table address space (`$0000-$1FFF`).
    pub fn write_chr(&mut self, addr: u16, value: u8) {
        match self {
            Mapper::Nrom(m) => m.write_chr(addr, value),
            Mapper::Mmc1(m) => m.write_chr(addr, value),
            Mapper::Cnrom(m) => m.write_chr(addr, value),
            Mapper::Mmc3(m) => m.write_chr(addr, value),
        }
    }

    /// Current nametable mirroring mode.
    #[must_use]
    pub fn mirroring(&self) -> Mirroring {
        match self {
            Mapper::Nrom(m) => m.mirroring(),
            Mapper::Mmc1(m) => m.mirroring(),
            Mapper::Cnrom(m) => m.mirroring(),
            Mapper::Mmc3(m) => m.mirroring(),
        }
    }

    /// True if the mapper has an IRQ asserted against the CPU.
    #[must_use]
    pub fn irq_pending(&self) -> bool {
        match self {
            Mapper::Mmc3(m) => m.irq_pending(),
            _ => false,
        }
    }

    /// Acknowledge/clear a pending mapper IRQ.
    pub fn irq_acknowledge(&mut self) {
        if let Mapper::Mmc3(m) = self {
            m.irq_acknowledge();
        }
    }

    /// Notify the mapper that a PPU scanline has elapsed, for mappers that
    /// clock an IRQ counter off scanline boundaries (MMC3).
    pub fn scanline(&mut self) {
        if let Mapper::Mmc3(m) = self {
            m.scanline();
        }
    }

    /// Notify the mapper of a PPU A12 address-line rising edge, for
    /// mappers with cycle-accurate IRQ clocking (MMC3).
    pub fn ppu_a12_rising(&mut self) {
        if let Mapper::Mmc3(m) = self {
            m.ppu_a12_rising();
        }
    }

    /// Advance the mapper's internal A12 debounce filter by one PPU dot.
    pub fn tick_a12_filter(&mut self) {
        if let Mapper::Mmc3(m) = self {
            m.tick_a12_filter();
        }
    }

    /// The iNES/NES 2.0 mapper number this board implements.
    #[must_use]
    pub fn mapper_number(&self) -> u16 {
        match self {
            Mapper::Nrom(_) => 0,
            Mapper::Mmc1(_) => 1,
            Mapper::Cnrom(_) => 3,
            Mapper::Mmc3(_) => 4,
        }
    }

    /// Human-readable board name.
    #[must_use]
    pub fn mapper_name(&self) -> &'static str {
        match self {
            Mapper::Nrom(_) => "NROM",
            Mapper::Mmc1(_) => "MMC1",
            Mapper::Cnrom(_) => "CNROM",
            Mapper::Mmc3(_) => "MMC3",
        }
    }

    /// True if this board has battery-backed save RAM.
    #[must_use]
    pub fn has_battery(&self) -> bool {
        match self {
            Mapper::Nrom(_) => false,
            Mapper::Mmc1(m) => m.has_battery(),
            Mapper::Cnrom(_) => false,
            Mapper::Mmc3(m) => m.has_battery(),
        }
    }

    /// Battery-backed save RAM contents, for persisting between sessions.
    #[must_use]
    pub fn battery_ram(&self) -> &[u8] {
        match self {
            Mapper::Mmc1(m) => m.battery_ram(),
            Mapper::Mmc3(m) => m.battery_ram(),
            _ => &[],
        }
    }

    /// Restore battery-backed save RAM from a previous session.
    pub fn set_battery_ram(&mut self, data: &[u8]) {
        match self {
            Mapper::Mmc1(m) => m.set_battery_ram(data),
            Mapper::Mmc3(m) => m.set_battery_ram(data),
            _ => {}
        }
    }

    /// Reset mapper state to power-on defaults.
    pub fn reset(&mut self) {
        match self {
            Mapper::Nrom(_) => {}
            Mapper::Mmc1(m) => m.reset(),
            Mapper::Cnrom(m) => m.reset(),
            Mapper::Mmc3(m) => m.reset(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RomHeader;

    fn create_test_rom(mapper_number: u16) -> Rom {
        let header = RomHeader {
            prg_rom_size: 32768,
            chr_rom_size: 8192,
            mapper_number,
            submapper: 0,
            mirroring: Mirroring::Vertical,
            has_battery: false,
            has_trainer: false,
            nes2_format: false,
            prg_ram_size: 8192,
            prg_nvram_size: 0,
            chr_ram_size: 0,
            chr_nvram_size: 0,
        };

        Rom {
            header,
            trainer: None,
            prg_rom: (0..32768).map(|i| (i & 0xFF) as u8).collect(),
            chr_rom: (0..8192).map(|i| (i & 0xFF) as u8).collect(),
        }
    }

    #[test]
    fn test_from_rom_dispatches_by_mapper_number() {
        assert_eq!(Mapper::from_rom(&create_test_rom(0)).unwrap().mapper_number(), 0);
        assert_eq!(Mapper::from_rom(&create_test_rom(1)).unwrap().mapper_number(), 1);
        assert_eq!(Mapper::from_rom(&create_test_rom(3)).unwrap().mapper_number(), 3);
        assert_eq!(Mapper::from_rom(&create_test_rom(4)).unwrap().mapper_number(), 4);
    }

    #[test]
    fn test_from_rom_unsupported_mapper() {
        let result = Mapper::from_rom(&create_test_rom(100));
        assert!(matches!(result, Err(RomError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_mapper_names() {
        assert_eq!(Mapper::from_rom(&create_test_rom(0)).unwrap().mapper_name(), "NROM");
        assert_eq!(Mapper::from_rom(&create_test_rom(4)).unwrap().mapper_name(), "MMC3");
    }

    #[test]
    fn test_nrom_read_write_via_enum() {
        let mut mapper = Mapper::from_rom(&create_test_rom(0)).unwrap();
        assert_eq!(mapper.read_prg(0x8000), 0);
        mapper.write_prg(0x8000, 0xFF);
        assert_eq!(mapper.read_prg(0x8000), 0);
    }

    #[test]
    fn test_mmc3_irq_via_enum() {
        let mut mapper = Mapper::from_rom(&create_test_rom(4)).unwrap();
        mapper.write_prg(0xC000, 0);
        mapper.write_prg(0xC001, 0);
        mapper.write_prg(0xE001, 0);
        mapper.scanline();
        assert!(mapper.irq_pending());
        mapper.irq_acknowledge();
        assert!(!mapper.irq_pending());
    }

    #[test]
    fn test_irq_noop_for_non_mmc3_mappers() {
        let mut mapper = Mapper::from_rom(&create_test_rom(0)).unwrap();
        mapper.scanline();
        mapper.ppu_a12_rising();
        assert!(!mapper.irq_pending());
    }
}
