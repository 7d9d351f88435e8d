//! NES System Bus Implementation.
//!
//! The bus connects the CPU to all other components:
//! - PPU registers ($2000-$2007, mirrored every 8 bytes to $3FFF)
//! - APU/IO registers ($4000-$4017)
//! - Cartridge space ($4020-$FFFF)
//! - Internal RAM ($0000-$07FF, mirrored to $1FFF)

use nescore_apu::Apu;
use nescore_cpu::Bus;
use nescore_mappers::Mapper;
use nescore_ppu::Ppu;

use crate::input::Controller;

/// Convert the mapper-reported mirroring mode to the PPU crate's own
/// (structurally identical) `Mirroring` type.
///
/// The two crates each define their own `Mirroring` enum rather than
/// sharing one, since `nescore-ppu` has no dependency on `nescore-mappers`.
fn to_ppu_mirroring(mirroring: nescore_mappers::Mirroring) -> nescore_ppu::Mirroring {
    match mirroring {
        nescore_mappers::Mirroring::Horizontal => nescore_ppu::Mirroring::Horizontal,
        nescore_mappers::Mirroring::Vertical => nescore_ppu::Mirroring::Vertical,
        nescore_mappers::Mirroring::SingleScreenLower => nescore_ppu::Mirroring::SingleScreenLower,
        nescore_mappers::Mirroring::SingleScreenUpper => nescore_ppu::Mirroring::SingleScreenUpper,
        nescore_mappers::Mirroring::FourScreen => nescore_ppu::Mirroring::FourScreen,
    }
}

/// NES system bus connecting all components.
pub struct NesBus {
    /// Internal RAM (2KB, mirrored 4 times).
    pub ram: [u8; 2048],
    /// PPU (Picture Processing Unit). Owns its own nametable VRAM.
    pub ppu: Ppu,
    /// APU (Audio Processing Unit). Register sink only; synthesizes no audio.
    pub apu: Apu,
    /// Cartridge mapper.
    pub mapper: Mapper,
    /// Controller 1.
    pub controller1: Controller,
    /// Controller 2.
    pub controller2: Controller,
    /// OAM DMA source page, pending execution.
    oam_dma_page: Option<u8>,
    /// CPU cycle counter, used for OAM DMA parity and debugging.
    cpu_cycles: u64,
    /// Last value on the data bus (for open bus behavior).
    last_bus_value: u8,
    /// NMI latched from the PPU, consumed by the system driver.
    nmi_pending: bool,
    /// Set when the PPU completes a frame (scanline 241, dot 1), consumed by the system driver.
    frame_complete: bool,
}

impl NesBus {
    /// Create a new NES bus with the given mapper.
    pub fn new(mapper: Mapper) -> Self {
        let ppu = Ppu::new(to_ppu_mirroring(mapper.mirroring()));
        Self {
            ram: [0; 2048],
            ppu,
            apu: Apu::new(),
            mapper,
            controller1: Controller::new(),
            controller2: Controller::new(),
            oam_dma_page: None,
            cpu_cycles: 0,
            last_bus_value: 0,
            nmi_pending: false,
            frame_complete: false,
        }
    }

    /// Reset the bus and all components.
    pub fn reset(&mut self) {
        self.ram.fill(0);
        self.mapper.reset();
        self.ppu.reset();
        self.ppu.set_mirroring(to_ppu_mirroring(self.mapper.mirroring()));
        self.apu.reset();
        self.controller1.reset();
        self.controller2.reset();
        self.oam_dma_page = None;
        self.cpu_cycles = 0;
        self.last_bus_value = 0;
        self.nmi_pending = false;
        self.frame_complete = false;
    }

    /// Check if OAM DMA is pending.
    #[must_use]
    pub fn oam_dma_pending(&self) -> bool {
        self.oam_dma_page.is_some()
    }

    /// Execute OAM DMA transfer.
    ///
    /// Copies 256 bytes from `$HH00-$HHFF` into OAM. Returns the number of
    /// CPU cycles consumed: 513, plus 1 more if `cpu_cycles` is odd at the
    /// moment the transfer runs.
    pub fn execute_oam_dma(&mut self) -> u16 {
        let Some(page) = self.oam_dma_page.take() else {
            return 0;
        };

        let base = u16::from(page) << 8;
        let mut data = [0u8; 256];
        for (i, slot) in data.iter_mut().enumerate() {
            *slot = self.dma_source_read(base.wrapping_add(i as u16));
        }
        self.ppu.oam_dma(&data);

        let cycles = if self.cpu_cycles % 2 == 1 { 514 } else { 513 };
        self.cpu_cycles += u64::from(cycles);
        cycles
    }

    /// Read a DMA source byte without disturbing bus-visible state.
    ///
    /// Real hardware drives these reads through the normal bus, but OAM DMA
    /// sources are RAM or cartridge space in practice; PPU/APU register
    /// reads here would have side effects games never rely on for DMA.
    fn dma_source_read(&self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x1FFF => self.ram[(addr & 0x07FF) as usize],
            0x4020..=0xFFFF => self.mapper.read_prg(addr),
            _ => 0,
        }
    }

    /// Step the PPU by 3 dots (one CPU cycle worth).
    ///
    /// Returns true if NMI should be triggered this CPU cycle.
    pub fn step_ppu(&mut self) -> bool {
        let mut nmi = false;

        for _ in 0..3 {
            let (frame_complete, nmi_triggered) =
                self.ppu.step_with_chr(|addr| self.mapper.read_chr(addr));
            if nmi_triggered {
                nmi = true;
            }
            if frame_complete {
                self.frame_complete = true;
            }

            // MMC3-style scanline-counter mappers: the conventional
            // scanline-260 clock point (see Mmc3::scanline doc comment).
            let scanline = self.ppu.scanline();
            if self.ppu.dot() == 260 && (scanline < 240 || scanline == 261) {
                self.mapper.scanline();
            }
        }

        if nmi {
            self.nmi_pending = true;
        }

        nmi
    }

    /// Check whether the PPU has completed a frame since the last [`NesBus::take_frame_complete`] call.
    #[must_use]
    pub fn frame_complete(&self) -> bool {
        self.frame_complete
    }

    /// Consume the frame-complete flag, returning whatever it held.
    pub fn take_frame_complete(&mut self) -> bool {
        core::mem::replace(&mut self.frame_complete, false)
    }

    /// Step the APU by one CPU cycle. Audio synthesis is out of scope; this
    /// only keeps the APU's internal register state machine advancing.
    pub fn step_apu(&mut self) {
        self.apu.clock();
    }

    /// Check if NMI is pending.
    #[must_use]
    pub fn nmi_pending(&self) -> bool {
        self.nmi_pending
    }

    /// Acknowledge NMI.
    pub fn acknowledge_nmi(&mut self) {
        self.nmi_pending = false;
    }

    /// Check if IRQ is pending (mapper or APU).
    #[must_use]
    pub fn irq_pending(&self) -> bool {
        self.mapper.irq_pending() || self.apu.irq_pending()
    }

    /// Acknowledge mapper IRQ.
    pub fn acknowledge_mapper_irq(&mut self) {
        self.mapper.irq_acknowledge();
    }

    /// Get the current CPU cycle count.
    #[must_use]
    pub fn cpu_cycles(&self) -> u64 {
        self.cpu_cycles
    }

    /// Increment CPU cycle count.
    pub fn add_cpu_cycles(&mut self, cycles: u8) {
        self.cpu_cycles += u64::from(cycles);
    }

    /// Peek at memory without side effects.
    ///
    /// This is useful for debugging/display purposes where we don't want
    /// to trigger PPU register side effects or mapper state changes.
    #[must_use]
    pub fn peek(&self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x1FFF => self.ram[(addr & 0x07FF) as usize],
            0x2000..=0x3FFF => self.last_bus_value,
            0x4015 => self.apu.peek_status(),
            0x4000..=0x401F => self.last_bus_value,
            0x4020..=0xFFFF => self.mapper.read_prg(addr),
        }
    }
}

/// CPU bus implementation.
impl Bus for NesBus {
    fn read(&mut self, addr: u16) -> u8 {
        let value = match addr {
            // Internal RAM (mirrored every 2KB)
            0x0000..=0x1FFF => self.ram[(addr & 0x07FF) as usize],

            // PPU registers (mirrored every 8 bytes)
            0x2000..=0x3FFF => self.ppu.read_register(addr, |chr_addr| self.mapper.read_chr(chr_addr)),

            // APU and I/O registers
            0x4000..=0x4017 => match addr {
                0x4015 => self.apu.read_status(),
                0x4016 => self.controller1.read(),
                0x4017 => self.controller2.read(),
                _ => self.last_bus_value, // Write-only registers
            },

            // APU test mode (normally disabled)
            0x4018..=0x401F => self.last_bus_value,

            // Cartridge space
            0x4020..=0xFFFF => self.mapper.read_prg(addr),
        };

        self.last_bus_value = value;
        value
    }

    fn write(&mut self, addr: u16, val: u8) {
        self.last_bus_value = val;

        match addr {
            // Internal RAM (mirrored every 2KB)
            0x0000..=0x1FFF => {
                self.ram[(addr & 0x07FF) as usize] = val;
            }

            // PPU registers (mirrored every 8 bytes)
            0x2000..=0x3FFF => {
                self.ppu
                    .write_register(addr, val, |chr_addr, chr_val| self.mapper.write_chr(chr_addr, chr_val));
            }

            // APU and I/O registers
            0x4000..=0x4017 => match addr {
                0x4000..=0x4013 | 0x4015 | 0x4017 => {
                    self.apu.write(addr, val);
                }
                0x4014 => {
                    // OAM DMA
                    self.oam_dma_page = Some(val);
                }
                0x4016 => {
                    // $4016 writes strobe BOTH controllers simultaneously.
                    self.controller1.write_strobe(val);
                    self.controller2.write_strobe(val);
                }
                _ => {}
            },

            // APU test mode (normally disabled)
            0x4018..=0x401F => {}

            // Cartridge space
            0x4020..=0xFFFF => {
                self.mapper.write_prg(addr, val);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::Button;
    use nescore_mappers::{Mirroring, Rom, RomHeader};

    #[cfg(not(feature = "std"))]
    use alloc::vec;

    fn create_test_bus() -> NesBus {
        let rom = Rom {
            header: RomHeader {
                prg_rom_size: 32768,
                chr_rom_size: 8192,
                mapper_number: 0,
                submapper: 0,
                mirroring: Mirroring::Vertical,
                has_battery: false,
                has_trainer: false,
                nes2_format: false,
                prg_ram_size: 0,
                prg_nvram_size: 0,
                chr_ram_size: 0,
                chr_nvram_size: 0,
            },
            trainer: None,
            prg_rom: vec![0; 32768],
            chr_rom: vec![0; 8192],
        };
        NesBus::new(Mapper::from_rom(&rom).unwrap())
    }

    #[test]
    fn test_ram_mirroring() {
        let mut bus = create_test_bus();

        Bus::write(&mut bus, 0x0000, 0x42);
        assert_eq!(Bus::read(&mut bus, 0x0000), 0x42);

        // Should mirror to $0800, $1000, $1800
        assert_eq!(Bus::read(&mut bus, 0x0800), 0x42);
        assert_eq!(Bus::read(&mut bus, 0x1000), 0x42);
        assert_eq!(Bus::read(&mut bus, 0x1800), 0x42);

        // Write to mirrored address
        Bus::write(&mut bus, 0x1234, 0xAB);
        assert_eq!(Bus::read(&mut bus, 0x0234), 0xAB); // $1234 & $07FF = $0234
    }

    #[test]
    fn test_controller_strobe() {
        let mut bus = create_test_bus();

        // A, Select, Up, Right
        bus.controller1.set_button(Button::A, true);
        bus.controller1.set_button(Button::Select, true);
        bus.controller1.set_button(Button::Up, true);
        bus.controller1.set_button(Button::Right, true);

        // Strobe high then low to latch
        Bus::write(&mut bus, 0x4016, 1);
        Bus::write(&mut bus, 0x4016, 0);

        assert_eq!(Bus::read(&mut bus, 0x4016) & 1, 1); // A
        assert_eq!(Bus::read(&mut bus, 0x4016) & 1, 0); // B
        assert_eq!(Bus::read(&mut bus, 0x4016) & 1, 1); // Select
        assert_eq!(Bus::read(&mut bus, 0x4016) & 1, 0); // Start
        assert_eq!(Bus::read(&mut bus, 0x4016) & 1, 1); // Up
        assert_eq!(Bus::read(&mut bus, 0x4016) & 1, 0); // Down
        assert_eq!(Bus::read(&mut bus, 0x4016) & 1, 0); // Left
        assert_eq!(Bus::read(&mut bus, 0x4016) & 1, 1); // Right
    }

    #[test]
    fn test_4016_write_strobes_both_controllers() {
        let mut bus = create_test_bus();
        bus.controller2.set_button(Button::B, true);

        Bus::write(&mut bus, 0x4016, 1);
        Bus::write(&mut bus, 0x4016, 0);

        assert_eq!(Bus::read(&mut bus, 0x4017) & 1, 0); // A
        assert_eq!(Bus::read(&mut bus, 0x4017) & 1, 1); // B
    }

    #[test]
    fn test_oam_dma() {
        let mut bus = create_test_bus();

        for i in 0..256u16 {
            Bus::write(&mut bus, 0x0200 + i, i as u8);
        }

        Bus::write(&mut bus, 0x4014, 0x02);
        assert!(bus.oam_dma_pending());

        let cycles = bus.execute_oam_dma();
        assert!(!bus.oam_dma_pending());
        assert!(cycles == 513 || cycles == 514);
    }

    #[test]
    fn test_open_bus_behavior() {
        let mut bus = create_test_bus();

        Bus::write(&mut bus, 0x0000, 0xAB);
        let _ = Bus::read(&mut bus, 0x0000);

        assert_eq!(bus.last_bus_value, 0xAB);
    }

    #[test]
    fn test_peek_memory() {
        let mut bus = create_test_bus();

        Bus::write(&mut bus, 0x0100, 0x42);

        assert_eq!(bus.peek(0x0100), 0x42);
        assert_eq!(bus.peek(0x0900), 0x42); // Mirrored
    }

    #[test]
    fn test_reset() {
        let mut bus = create_test_bus();
        bus.nmi_pending = true;

        bus.reset();

        assert_eq!(Bus::read(&mut bus, 0x0000), 0);
        assert_eq!(bus.cpu_cycles, 0);
        assert!(!bus.nmi_pending);
    }

    #[test]
    fn test_mmc3_scanline_irq_clocking() {
        let rom = Rom {
            header: RomHeader {
                prg_rom_size: 32768,
                chr_rom_size: 8192,
                mapper_number: 4,
                submapper: 0,
                mirroring: Mirroring::Vertical,
                has_battery: false,
                has_trainer: false,
                nes2_format: false,
                prg_ram_size: 0,
                prg_nvram_size: 0,
                chr_ram_size: 0,
                chr_nvram_size: 0,
            },
            trainer: None,
            prg_rom: vec![0; 32768],
            chr_rom: vec![0; 8192],
        };
        let mut bus = NesBus::new(Mapper::from_rom(&rom).unwrap());
        bus.mapper.write_prg(0xC000, 0); // IRQ latch = 0
        bus.mapper.write_prg(0xC001, 0); // reload
        bus.mapper.write_prg(0xE001, 0); // enable IRQ
        Bus::write(&mut bus, 0x2001, 0x18); // enable background + sprites

        // 262 scanlines * 341 dots, stepped 3 dots at a time via step_ppu
        // (one call per CPU cycle), enough to pass two scanline-260 points.
        for _ in 0..(341 / 3 + 1) {
            bus.step_ppu();
        }
        assert!(bus.irq_pending());
    }
}
