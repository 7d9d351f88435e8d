//! NES Console Implementation.
//!
//! The Console struct provides the high-level emulation API, managing the
//! CPU, PPU, APU, and mapper integration with proper timing.

use crate::bus::NesBus;
use crate::input::{Button, Controller};
use nescore_cpu::{Cpu, Status};
use nescore_mappers::{Mapper, Rom, RomError};

#[cfg(not(feature = "std"))]
use alloc::vec;
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

/// NES emulation timing constants.
pub mod timing {
    /// Master clock frequency (NTSC).
    pub const MASTER_CLOCK_NTSC: u32 = 21_477_272;
    /// CPU clock frequency (NTSC).
    pub const CPU_CLOCK_NTSC: u32 = MASTER_CLOCK_NTSC / 12;
    /// PPU clock frequency (NTSC).
    pub const PPU_CLOCK_NTSC: u32 = MASTER_CLOCK_NTSC / 4;
    /// CPU cycles per frame (NTSC).
    pub const CPU_CYCLES_PER_FRAME: u32 = 29_780;
    /// PPU dots per scanline.
    pub const PPU_DOTS_PER_SCANLINE: u16 = 341;
    /// Total scanlines (including vblank).
    pub const PPU_SCANLINES: u16 = 262;
    /// Target frame rate (NTSC).
    pub const FRAME_RATE_NTSC: f64 = 60.0988;
}

/// Console error type.
#[derive(Debug, Clone)]
pub enum ConsoleError {
    /// ROM loading error.
    RomError(RomError),
}

impl From<RomError> for ConsoleError {
    fn from(err: RomError) -> Self {
        Self::RomError(err)
    }
}

impl core::fmt::Display for ConsoleError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::RomError(e) => write!(f, "ROM error: {e}"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ConsoleError {}

/// NES console emulator: the system driver tying CPU, PPU, APU, mapper, and
/// controllers together on a fixed 1:3 CPU:PPU clock.
pub struct Console {
    /// 6502 CPU.
    cpu: Cpu,
    /// System bus (PPU, APU, mapper, RAM, controllers).
    bus: NesBus,
    /// Frame buffer (256x240 RGBA).
    framebuffer: Vec<u8>,
    /// Total CPU cycles executed.
    total_cycles: u64,
    /// Frame counter.
    frame_count: u64,
    /// Is emulation running?
    running: bool,
}

impl Console {
    /// Create a new console by loading a ROM image.
    ///
    /// # Errors
    ///
    /// Returns an error if the ROM cannot be parsed or uses an unsupported
    /// mapper (only NROM, MMC1, CNROM, and MMC3 are supported).
    pub fn new(rom_data: &[u8]) -> Result<Self, ConsoleError> {
        let rom = Rom::load(rom_data)?;
        let mapper = Mapper::from_rom(&rom)?;
        Ok(Self::with_mapper(mapper))
    }

    /// Create a new console from ROM bytes (alias for [`Console::new`]).
    ///
    /// # Errors
    ///
    /// Returns an error if the ROM cannot be parsed or uses an unsupported
    /// mapper.
    pub fn from_rom_bytes(rom_data: &[u8]) -> Result<Self, ConsoleError> {
        Self::new(rom_data)
    }

    /// Create a console with an already-constructed mapper.
    #[must_use]
    pub fn with_mapper(mapper: Mapper) -> Self {
        let bus = NesBus::new(mapper);
        let cpu = Cpu::new();

        Self {
            cpu,
            bus,
            framebuffer: vec![0; 256 * 240 * 4],
            total_cycles: 0,
            frame_count: 0,
            running: true,
        }
    }

    /// Reset the console to initial state (equivalent to pressing Reset).
    pub fn reset(&mut self) {
        self.cpu.reset(&mut self.bus);
        self.bus.reset();
        self.total_cycles = 0;
        self.running = true;
    }

    /// Power on the console (cold boot). Currently identical to [`Console::reset`].
    pub fn power_on(&mut self) {
        self.reset();
    }

    /// Run emulation for one CPU instruction, then the PPU and APU for the
    /// matching number of cycles.
    ///
    /// Returns the number of CPU cycles executed. An OAM-DMA-triggering step
    /// consumes 513 or 514 cycles by itself, wider than a single opcode.
    pub fn step(&mut self) -> u16 {
        if !self.running {
            return 0;
        }

        if self.bus.oam_dma_pending() {
            let dma_cycles = self.bus.execute_oam_dma();
            self.step_components(dma_cycles);
            self.total_cycles += u64::from(dma_cycles);
            return dma_cycles;
        }

        if self.bus.nmi_pending() {
            self.bus.acknowledge_nmi();
            self.cpu.trigger_nmi();
        } else if self.bus.irq_pending() && !self.cpu.status().contains(Status::I) {
            self.cpu.set_irq(true);
        }

        let cycles = self.cpu.step(&mut self.bus);
        self.step_components(u16::from(cycles));
        self.bus.add_cpu_cycles(cycles);
        self.total_cycles += u64::from(cycles);

        u16::from(cycles)
    }

    /// Step the PPU (3 dots per CPU cycle) and the APU (1:1) for `cpu_cycles`
    /// CPU cycles' worth of time.
    fn step_components(&mut self, cpu_cycles: u16) {
        for _ in 0..cpu_cycles {
            self.bus.step_ppu();
            self.bus.step_apu();
        }
    }

    /// Run emulation until the PPU's frame counter advances (scanline 241,
    /// dot 1), roughly 29,780 CPU cycles.
    ///
    /// Returns the actual number of CPU cycles executed.
    pub fn step_frame(&mut self) -> u64 {
        let start_cycles = self.total_cycles;

        while self.running {
            self.step();
            if self.bus.take_frame_complete() {
                break;
            }
        }

        self.update_framebuffer();
        self.frame_count += 1;

        self.total_cycles - start_cycles
    }

    /// Update the framebuffer from the PPU's palette-index output.
    fn update_framebuffer(&mut self) {
        let ppu_buffer = self.bus.ppu.frame_buffer();

        for (i, &palette_idx) in ppu_buffer.iter().enumerate() {
            let rgb = crate::palette::palette_to_rgb(palette_idx);
            let offset = i * 4;
            self.framebuffer[offset] = rgb.0;
            self.framebuffer[offset + 1] = rgb.1;
            self.framebuffer[offset + 2] = rgb.2;
            self.framebuffer[offset + 3] = 255;
        }
    }

    /// Get the current framebuffer (256x240 RGBA).
    #[must_use]
    pub fn framebuffer(&self) -> &[u8] {
        &self.framebuffer
    }

    /// Set controller 1 button state.
    pub fn set_button_1(&mut self, button: Button, pressed: bool) {
        self.bus.controller1.set_button(button, pressed);
    }

    /// Set controller 2 button state.
    pub fn set_button_2(&mut self, button: Button, pressed: bool) {
        self.bus.controller2.set_button(button, pressed);
    }

    /// Get controller 1's current button state as a bitfield (see [`Button`]).
    #[must_use]
    pub fn button_1_state(&self) -> u8 {
        self.bus.controller1.buttons()
    }

    /// Get controller 2's current button state as a bitfield (see [`Button`]).
    #[must_use]
    pub fn button_2_state(&self) -> u8 {
        self.bus.controller2.buttons()
    }

    /// Get a reference to controller 1.
    #[must_use]
    pub fn controller_1(&self) -> &Controller {
        &self.bus.controller1
    }

    /// Get a reference to controller 2.
    #[must_use]
    pub fn controller_2(&self) -> &Controller {
        &self.bus.controller2
    }

    /// Get the total CPU cycles executed.
    #[must_use]
    pub fn total_cycles(&self) -> u64 {
        self.total_cycles
    }

    /// Get the frame count.
    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Check if emulation is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Pause emulation.
    pub fn pause(&mut self) {
        self.running = false;
    }

    /// Resume emulation.
    pub fn resume(&mut self) {
        self.running = true;
    }

    /// Get a reference to the CPU for debugging.
    #[must_use]
    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    /// Get a reference to the PPU for debugging.
    #[must_use]
    pub fn ppu(&self) -> &nescore_ppu::Ppu {
        &self.bus.ppu
    }

    /// Get a reference to the APU for debugging.
    #[must_use]
    pub fn apu(&self) -> &nescore_apu::Apu {
        &self.bus.apu
    }

    /// Peek at memory without side effects.
    ///
    /// Useful for debugging/display where we don't want to trigger PPU
    /// register side effects or mapper state changes.
    #[must_use]
    pub fn peek_memory(&self, addr: u16) -> u8 {
        self.bus.peek(addr)
    }

    /// Get a reference to the bus for debugging.
    #[must_use]
    pub fn bus(&self) -> &NesBus {
        &self.bus
    }

    /// Get a mutable reference to the bus.
    pub fn bus_mut(&mut self) -> &mut NesBus {
        &mut self.bus
    }

    /// Get the mapper number.
    #[must_use]
    pub fn mapper_number(&self) -> u16 {
        self.bus.mapper.mapper_number()
    }

    /// Get the mapper name.
    #[must_use]
    pub fn mapper_name(&self) -> &'static str {
        self.bus.mapper.mapper_name()
    }

    /// Check if the ROM has battery-backed RAM.
    #[must_use]
    pub fn has_battery(&self) -> bool {
        self.bus.mapper.has_battery()
    }

    /// Get battery-backed RAM for saving.
    #[must_use]
    pub fn battery_ram(&self) -> &[u8] {
        self.bus.mapper.battery_ram()
    }

    /// Load battery-backed RAM from a previous session.
    pub fn load_battery_ram(&mut self, data: &[u8]) {
        self.bus.mapper.set_battery_ram(data);
    }
}
