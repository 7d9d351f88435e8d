//! NES cartridge mapper implementations.
//!
//! This crate parses iNES/NES 2.0 ROM files and provides the cartridge
//! mapper boards used to bank PRG-ROM, CHR-ROM/RAM, and nametable VRAM into
//! the CPU and PPU address spaces.
//!
//! # Supported Mappers
//!
//! | Mapper | Name  | Description                                  |
//! |--------|-------|-----------------------------------------------|
//! | 0      | NROM  | No banking, simplest mapper                    |
//! | 1      | MMC1  | Serial-shift-register PRG/CHR banking          |
//! | 3      | CNROM | CHR-ROM banking only                           |
//! | 4      | MMC3  | Fine-grained PRG/CHR banking plus scanline IRQ |
//!
//! # Example
//!
//! ```no_run
//! use nescore_mappers::{Mapper, Rom};
//!
//! let rom_data = std::fs::read("game.nes").expect("failed to read ROM");
//! let rom = Rom::load(&rom_data).expect("failed to parse ROM");
//! let mut mapper = Mapper::from_rom(&rom).expect("unsupported mapper");
//!
//! let opcode = mapper.read_prg(0x8000);
//! let tile = mapper.read_chr(0x0000);
//! ```
//!
//! # `no_std` Support
//!
//! This crate supports `no_std` environments with the `alloc` crate.
//! Disable the default `std` feature for embedded use.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(not(feature = "std"))]
extern crate alloc;

mod cnrom;
mod mmc1;
mod mmc3;
mod nrom;

pub mod mapper;
pub mod mirroring;
pub mod rom;

pub use cnrom::Cnrom;
pub use mapper::Mapper;
pub use mirroring::Mirroring;
pub use mmc1::Mmc1;
pub use mmc3::Mmc3;
pub use nrom::Nrom;
pub use rom::{Rom, RomError, RomHeader};

/// Mapper numbers implemented by this crate.
#[must_use]
pub fn supported_mappers() -> &'static [u16] {
    &[0, 1, 3, 4]
}

/// Check if a mapper number is supported.
#[must_use]
pub fn is_mapper_supported(mapper_number: u16) -> bool {
    supported_mappers().contains(&mapper_number)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_mappers() {
        assert_eq!(supported_mappers(), &[0, 1, 3, 4]);
    }

    #[test]
    fn test_is_mapper_supported() {
        assert!(is_mapper_supported(0));
        assert!(is_mapper_supported(4));
        assert!(!is_mapper_supported(2));
        assert!(!is_mapper_supported(100));
    }
}
