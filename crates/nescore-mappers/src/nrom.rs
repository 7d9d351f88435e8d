//! Mapper 0: NROM
//!
//! NROM is the simplest NES mapper with no bank switching capabilities.
//! It provides direct memory mapping with optional mirroring for 16KB PRG-ROM.
//!
//! # Hardware Details
//!
//! - **PRG-ROM**: 16KB or 32KB
//! - **CHR**: 8KB CHR-ROM or CHR-RAM
//! - **Mirroring**: Fixed horizontal or vertical
//! - **Battery**: Not supported
//!
//! # Memory Map
//!
//! ```text
//! CPU:
//! $8000-$BFFF: First 16KB of PRG-ROM (or mirrored in NROM-128)
//! $C000-$FFFF: Last 16KB of PRG-ROM (or mirrored in NROM-128)
//!
//! PPU:
//! $0000-$1FFF: 8KB CHR-ROM/RAM (no banking)
//! ```

use crate::{Mirroring, Rom};

/// NROM mapper implementation (Mapper 0).
#[derive(Debug, Clone)]
pub struct Nrom {
    /// PRG-ROM data (16KB or 32KB).
    prg_rom: Vec<u8>,
    /// CHR-ROM data, or empty if CHR-RAM.
    chr_rom: Vec<u8>,
    /// CHR-RAM (8KB if `chr_rom` is empty).
    chr_ram: Vec<u8>,
    /// Nametable mirroring mode.
    mirroring: Mirroring,
    /// True if using CHR-RAM instead of CHR-ROM.
    has_chr_ram: bool,
}

impl Nrom {
    /// Build an NROM mapper from an already-validated ROM.
    ///
    /// `rom.prg_rom` is expected to be 16KB or 32KB; the cartridge loader
    /// validates this at parse time, so this constructor trusts it.
    #[must_use]
    pub fn new(rom: &Rom) -> Self {
        let has_chr_ram = rom.chr_rom.is_empty();
        let chr_ram = if has_chr_ram { vec![0; 8192] } else { Vec::new() };

        Self {
            prg_rom: rom.prg_rom.clone(),
            chr_rom: rom.chr_rom.clone(),
            chr_ram,
            mirroring: rom.header.mirroring,
            has_chr_ram,
        }
    }

    pub(crate) fn read_prg(&self, addr: u16) -> u8 {
        let offset = (addr - 0x8000) as usize;
        let masked_offset = if self.prg_rom.len() == 16384 {
            offset & 0x3FFF
        } else {
            offset
        };
        self.prg_rom[masked_offset]
    }

    pub(crate) fn write_prg(&mut self, _addr: u16, _value: u8) {
        // NROM has no writable registers.
    }

    pub(crate) fn read_chr(&self, addr: u16) -> u8 {
        if self.has_chr_ram {
            self.chr_ram[addr as usize]
        } else {
            self.chr_rom[addr as usize]
        }
    }

    pub(crate) fn write_chr(&mut self, addr: u16, value: u8) {
        if self.has_chr_ram {
            self.chr_ram[addr as usize] = value;
        }
    }

    pub(crate) fn mirroring(&self) -> Mirroring {
        self.mirroring
    }

    /// Get PRG-ROM size in bytes.
    #[must_use]
    pub fn prg_size(&self) -> usize {
        self.prg_rom.len()
    }

    /// Check if using CHR-RAM.
    #[must_use]
    pub fn has_chr_ram(&self) -> bool {
        self.has_chr_ram
    }
}
