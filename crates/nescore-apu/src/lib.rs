//! Opaque NES APU register collaborator (no audio synthesis).
//!
//! Audio is out of scope for this emulator core, but cartridge software
//! still writes `$4000-$4017` and polls `$4015` expecting sane (if
//! inaudible) behavior. This crate gives the system bus something to hand
//! those addresses to without special-casing them, while doing none of the
//! actual channel/envelope/mixer work a real 2A03 would.
//!
//! # Example
//!
//! ```
//! use nescore_apu::Apu;
//!
//! let mut apu = Apu::new();
//! apu.write(0x4015, 0x0F); // games may enable channels; accepted, ignored
//! apu.clock();
//! assert_eq!(apu.read_status(), 0);
//! ```

mod apu;

pub use apu::Apu;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apu_integration() {
        let mut apu = Apu::new();
        apu.write(0x4015, 0x01);
        for _ in 0..1000 {
            apu.clock();
        }
        assert_eq!(apu.read_status(), 0);
    }
}
