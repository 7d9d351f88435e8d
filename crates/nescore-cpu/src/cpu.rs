//! 6502 CPU core implementation.
//!
//! This module contains the main CPU structure with all registers, the
//! instruction execution loop, interrupt handling, and stack operations.

use crate::addressing::AddressingMode;
use crate::bus::Bus;
use crate::opcodes::OPCODE_TABLE;
use crate::status::Status;

/// NES 6502 CPU.
///
/// Executes one full instruction per [`Cpu::step`] call and reports the
/// number of cycles it took, rather than ticking cycle-by-cycle. The
/// system driver is responsible for relating those cycles to the PPU/APU's
/// own clocks.
#[derive(Debug)]
#[allow(clippy::struct_excessive_bools)]
pub struct Cpu {
    a: u8,
    x: u8,
    y: u8,
    pc: u16,
    sp: u8,
    status: Status,
    cycles: u64,
    /// Cycles remaining to stall for (OAM/DMC DMA).
    stall_cycles: u16,
    nmi_pending: bool,
    irq_pending: bool,
    /// I flag value sampled *before* the instruction currently executing,
    /// used to give CLI/SEI/PLP/RTI one instruction of interrupt latency.
    prev_irq_inhibit: bool,
    /// Suppresses the NMI check for one instruction after BRK completes,
    /// so the first instruction of the handler always runs first.
    suppress_nmi_next: bool,
    jammed: bool,
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl Cpu {
    /// Create a new CPU in its power-on state.
    ///
    /// `PC` is left at 0 until [`Cpu::reset`] loads it from the reset
    /// vector; `A`/`X`/`Y` power on undefined, so they are zeroed.
    #[must_use]
    pub fn new() -> Self {
        Self {
            a: 0,
            x: 0,
            y: 0,
            pc: 0,
            sp: 0xFD,
            status: Status::new(),
            cycles: 0,
            stall_cycles: 0,
            nmi_pending: false,
            irq_pending: false,
            prev_irq_inhibit: true,
            suppress_nmi_next: false,
            jammed: false,
        }
    }

    /// Run the RESET sequence: three dummy stack reads, `I` set, `PC`
    /// loaded from `$FFFC`. Takes 7 cycles.
    pub fn reset(&mut self, bus: &mut impl Bus) {
        self.sp = self.sp.wrapping_sub(3);
        self.status.insert(Status::I);
        self.pc = bus.read_u16(0xFFFC);
        self.cycles += 7;
        self.nmi_pending = false;
        self.irq_pending = false;
        self.prev_irq_inhibit = true;
        self.suppress_nmi_next = false;
        self.jammed = false;
        self.stall_cycles = 0;
    }

    /// Accumulator.
    #[must_use]
    pub const fn a(&self) -> u8 {
        self.a
    }

    /// X index register.
    #[must_use]
    pub const fn x(&self) -> u8 {
        self.x
    }

    /// Y index register.
    #[must_use]
    pub const fn y(&self) -> u8 {
        self.y
    }

    /// Program counter.
    #[must_use]
    pub const fn pc(&self) -> u16 {
        self.pc
    }

    /// Stack pointer.
    #[must_use]
    pub const fn sp(&self) -> u8 {
        self.sp
    }

    /// Status flags.
    #[must_use]
    pub const fn status(&self) -> Status {
        self.status
    }

    /// Total cycles executed since construction (or the last reset).
    #[must_use]
    pub const fn cycles(&self) -> u64 {
        self.cycles
    }

    /// True if the CPU has executed a JAM/KIL opcode and halted.
    #[must_use]
    pub const fn is_jammed(&self) -> bool {
        self.jammed
    }

    /// Stall the CPU for `cycles`, as OAM DMA (513-514 cycles) does.
    pub fn stall(&mut self, cycles: u16) {
        self.stall_cycles = self.stall_cycles.saturating_add(cycles);
    }

    /// Assert an NMI. NMI is edge-triggered: call this once per transition,
    /// not once per cycle the line is held low.
    pub fn trigger_nmi(&mut self) {
        self.nmi_pending = true;
    }

    /// Set the IRQ line's level. IRQ is level-triggered and gated by the
    /// `I` flag, so callers should hold it asserted until the device's
    /// condition clears rather than pulsing it.
    pub fn set_irq(&mut self, active: bool) {
        self.irq_pending = active;
    }

    /// Execute one instruction (or service a pending interrupt) and return
    /// the number of CPU cycles it took.
    pub fn step(&mut self, bus: &mut impl Bus) -> u8 {
        if self.stall_cycles > 0 {
            self.stall_cycles -= 1;
            self.cycles += 1;
            return 1;
        }

        if self.jammed {
            self.cycles += 1;
            return 1;
        }

        let current_irq_inhibit = self.status.contains(Status::I);

        if self.nmi_pending && !self.suppress_nmi_next {
            self.nmi_pending = false;
            self.prev_irq_inhibit = true;
            let cycles = self.handle_nmi(bus);
            self.cycles += u64::from(cycles);
            return cycles;
        }

        if self.suppress_nmi_next {
            self.suppress_nmi_next = false;
        }

        if self.irq_pending && !self.prev_irq_inhibit {
            self.prev_irq_inhibit = true;
            let cycles = self.handle_irq(bus);
            self.cycles += u64::from(cycles);
            return cycles;
        }

        self.prev_irq_inhibit = current_irq_inhibit;

        let opcode = bus.read(self.pc);
        self.pc = self.pc.wrapping_add(1);

        let info = &OPCODE_TABLE[opcode as usize];
        let extra_cycles = self.execute_opcode(opcode, info.addr_mode, bus);

        let total_cycles = info.cycles + extra_cycles;
        self.cycles += u64::from(total_cycles);
        total_cycles
    }

    fn handle_nmi(&mut self, bus: &mut impl Bus) -> u8 {
        self.push_u16(bus, self.pc);
        self.push(bus, self.status.to_stack_byte(false));
        self.status.insert(Status::I);
        self.pc = bus.read_u16(0xFFFA);
        7
    }

    fn handle_irq(&mut self, bus: &mut impl Bus) -> u8 {
        self.push_u16(bus, self.pc);
        self.push(bus, self.status.to_stack_byte(false));
        self.status.insert(Status::I);
        self.pc = bus.read_u16(0xFFFE);
        7
    }

    #[allow(clippy::too_many_lines)]
    fn execute_opcode(&mut self, opcode: u8, mode: AddressingMode, bus: &mut impl Bus) -> u8 {
        match opcode {
            // Load/Store
            0xA9 | 0xA5 | 0xB5 | 0xAD | 0xBD | 0xB9 | 0xA1 | 0xB1 => self.lda(bus, mode),
            0xA2 | 0xA6 | 0xB6 | 0xAE | 0xBE => self.ldx(bus, mode),
            0xA0 | 0xA4 | 0xB4 | 0xAC | 0xBC => self.ldy(bus, mode),
            0x85 | 0x95 | 0x8D | 0x9D | 0x99 | 0x81 | 0x91 => self.sta(bus, mode),
            0x86 | 0x96 | 0x8E => self.stx(bus, mode),
            0x84 | 0x94 | 0x8C => self.sty(bus, mode),

            // Transfer
            0xAA => self.tax(),
            0xA8 => self.tay(),
            0x8A => self.txa(),
            0x98 => self.tya(),
            0xBA => self.tsx(),
            0x9A => self.txs(),

            // Stack
            0x48 => self.pha(bus),
            0x08 => self.php(bus),
            0x68 => self.pla(bus),
            0x28 => self.plp(bus),

            // Arithmetic
            0x69 | 0x65 | 0x75 | 0x6D | 0x7D | 0x79 | 0x61 | 0x71 => self.adc(bus, mode),
            0xE9 | 0xE5 | 0xF5 | 0xED | 0xFD | 0xF9 | 0xE1 | 0xF1 | 0xEB => self.sbc(bus, mode),

            // Increment/Decrement
            0xE6 | 0xF6 | 0xEE | 0xFE => self.inc(bus, mode),
            0xC6 | 0xD6 | 0xCE | 0xDE => self.dec(bus, mode),
            0xE8 => self.inx(),
            0xC8 => self.iny(),
            0xCA => self.dex(),
            0x88 => self.dey(),

            // Logic
            0x29 | 0x25 | 0x35 | 0x2D | 0x3D | 0x39 | 0x21 | 0x31 => self.and(bus, mode),
            0x09 | 0x05 | 0x15 | 0x0D | 0x1D | 0x19 | 0x01 | 0x11 => self.ora(bus, mode),
            0x49 | 0x45 | 0x55 | 0x4D | 0x5D | 0x59 | 0x41 | 0x51 => self.eor(bus, mode),
            0x24 | 0x2C => self.bit(bus, mode),

            // Shift/Rotate
            0x0A => self.asl_acc(),
            0x06 | 0x16 | 0x0E | 0x1E => self.asl(bus, mode),
            0x4A => self.lsr_acc(),
            0x46 | 0x56 | 0x4E | 0x5E => self.lsr(bus, mode),
            0x2A => self.rol_acc(),
            0x26 | 0x36 | 0x2E | 0x3E => self.rol(bus, mode),
            0x6A => self.ror_acc(),
            0x66 | 0x76 | 0x6E | 0x7E => self.ror(bus, mode),

            // Compare
            0xC9 | 0xC5 | 0xD5 | 0xCD | 0xDD | 0xD9 | 0xC1 | 0xD1 => self.cmp(bus, mode),
            0xE0 | 0xE4 | 0xEC => self.cpx(bus, mode),
            0xC0 | 0xC4 | 0xCC => self.cpy(bus, mode),

            // Branch
            0x10 => self.branch(bus, !self.status.contains(Status::N)),
            0x30 => self.branch(bus, self.status.contains(Status::N)),
            0x50 => self.branch(bus, !self.status.contains(Status::V)),
            0x70 => self.branch(bus, self.status.contains(Status::V)),
            0x90 => self.branch(bus, !self.status.contains(Status::C)),
            0xB0 => self.branch(bus, self.status.contains(Status::C)),
            0xD0 => self.branch(bus, !self.status.contains(Status::Z)),
            0xF0 => self.branch(bus, self.status.contains(Status::Z)),

            // Jump/Subroutine
            0x4C => self.jmp_abs(bus),
            0x6C => self.jmp_ind(bus),
            0x20 => self.jsr(bus),
            0x60 => self.rts(bus),
            0x40 => self.rti(bus),
            0x00 => self.brk(bus),

            // Flags
            0x18 => self.clc(),
            0x38 => self.sec(),
            0x58 => self.cli(),
            0x78 => self.sei(),
            0xB8 => self.clv(),
            0xD8 => self.cld(),
            0xF8 => self.sed(),
            0xEA => 0,

            // Unofficial opcodes
            0xA7 | 0xB7 | 0xAF | 0xBF | 0xA3 | 0xB3 => self.lax(bus, mode),
            0x87 | 0x97 | 0x8F | 0x83 => self.sax(bus, mode),
            0xC7 | 0xD7 | 0xCF | 0xDF | 0xDB | 0xC3 | 0xD3 => self.dcp(bus, mode),
            0xE7 | 0xF7 | 0xEF | 0xFF | 0xFB | 0xE3 | 0xF3 => self.isc(bus, mode),
            0x07 | 0x17 | 0x0F | 0x1F | 0x1B | 0x03 | 0x13 => self.slo(bus, mode),
            0x27 | 0x37 | 0x2F | 0x3F | 0x3B | 0x23 | 0x33 => self.rla(bus, mode),
            0x47 | 0x57 | 0x4F | 0x5F | 0x5B | 0x43 | 0x53 => self.sre(bus, mode),
            0x67 | 0x77 | 0x6F | 0x7F | 0x7B | 0x63 | 0x73 => self.rra(bus, mode),
            0x0B | 0x2B => self.anc(bus),
            0x4B => self.alr(bus),
            0x6B => self.arr(bus),
            0x8B => self.xaa(bus),
            0xAB => self.lxa(bus),
            0xCB => self.axs(bus),
            0x93 | 0x9F => self.sha(bus, mode),
            0x9C => self.shy(bus),
            0x9E => self.shx(bus),
            0x9B => self.tas(bus),
            0xBB => self.las(bus, mode),

            // Unofficial NOPs
            0x1A | 0x3A | 0x5A | 0x7A | 0xDA | 0xFA => 0,
            0x80 | 0x82 | 0x89 | 0xC2 | 0xE2 | 0x04 | 0x44 | 0x64 | 0x14 | 0x34 | 0x54 | 0x74
            | 0xD4 | 0xF4 | 0x0C | 0x1C | 0x3C | 0x5C | 0x7C | 0xDC | 0xFC => {
                self.nop_read(bus, mode)
            }

            // JAM/KIL
            0x02 | 0x12 | 0x22 | 0x32 | 0x42 | 0x52 | 0x62 | 0x72 | 0x92 | 0xB2 | 0xD2 | 0xF2 => {
                self.jammed = true;
                0
            }
        }
    }

    // ===== Stack =====

    pub(crate) fn push(&mut self, bus: &mut impl Bus, value: u8) {
        bus.write(0x0100 | u16::from(self.sp), value);
        self.sp = self.sp.wrapping_sub(1);
    }

    pub(crate) fn pop(&mut self, bus: &mut impl Bus) -> u8 {
        self.sp = self.sp.wrapping_add(1);
        bus.read(0x0100 | u16::from(self.sp))
    }

    pub(crate) fn push_u16(&mut self, bus: &mut impl Bus, value: u16) {
        self.push(bus, (value >> 8) as u8);
        self.push(bus, (value & 0xFF) as u8);
    }

    pub(crate) fn pop_u16(&mut self, bus: &mut impl Bus) -> u16 {
        let lo = self.pop(bus);
        let hi = self.pop(bus);
        u16::from_le_bytes([lo, hi])
    }

    // ===== Operand access =====

    /// Read the operand addressed by `mode`, advancing `pc` past it.
    ///
    /// Returns the value and whether indexing crossed a page boundary, so
    /// callers that take the +1 page-cross penalty can add it to their
    /// returned cycle count.
    fn read_operand(&mut self, bus: &mut impl Bus, mode: AddressingMode) -> (u8, bool) {
        let result = mode.resolve(self.pc, self.x, self.y, bus);
        self.pc = self.pc.wrapping_add(u16::from(mode.operand_bytes()));

        if result.page_crossed {
            if let AddressingMode::AbsoluteX | AddressingMode::AbsoluteY | AddressingMode::IndirectIndexedY = mode
            {
                let incorrect_addr = (result.base_addr & 0xFF00) | (result.addr & 0x00FF);
                let _ = bus.read(incorrect_addr);
            }
        }

        let value = match mode {
            AddressingMode::Accumulator => self.a,
            _ => bus.read(result.addr),
        };
        (value, result.page_crossed)
    }

    /// Write `value` to the operand addressed by `mode`, advancing `pc`
    /// past it. Indexed write addressing always performs hardware's
    /// unconditional dummy write at the unfixed address first.
    fn write_operand(&mut self, bus: &mut impl Bus, mode: AddressingMode, value: u8) {
        let result = mode.resolve(self.pc, self.x, self.y, bus);
        self.pc = self.pc.wrapping_add(u16::from(mode.operand_bytes()));

        if let AddressingMode::AbsoluteX | AddressingMode::AbsoluteY | AddressingMode::IndirectIndexedY = mode {
            let incorrect_addr = (result.base_addr & 0xFF00) | (result.addr & 0x00FF);
            bus.write(incorrect_addr, value);
        }

        match mode {
            AddressingMode::Accumulator => self.a = value,
            _ => bus.write(result.addr, value),
        }
    }

    /// Read-modify-write: resolve the address once, dummy-write the old
    /// value, run `f` to compute the new value, then write it back.
    fn modify_operand(
        &mut self,
        bus: &mut impl Bus,
        mode: AddressingMode,
        f: impl FnOnce(&mut Self, u8) -> u8,
    ) -> u8 {
        if matches!(mode, AddressingMode::Accumulator) {
            let old = self.a;
            self.a = f(self, old);
            return 0;
        }

        let result = mode.resolve(self.pc, self.x, self.y, bus);
        self.pc = self.pc.wrapping_add(u16::from(mode.operand_bytes()));
        let old = bus.read(result.addr);
        bus.write(result.addr, old);
        let new = f(self, old);
        bus.write(result.addr, new);
        0
    }

    fn set_zn(&mut self, value: u8) {
        self.status.set_zn(value);
    }

    // ===== Load/Store =====

    fn lda(&mut self, bus: &mut impl Bus, mode: AddressingMode) -> u8 {
        let (v, crossed) = self.read_operand(bus, mode);
        self.a = v;
        self.set_zn(self.a);
        u8::from(crossed)
    }

    fn ldx(&mut self, bus: &mut impl Bus, mode: AddressingMode) -> u8 {
        let (v, crossed) = self.read_operand(bus, mode);
        self.x = v;
        self.set_zn(self.x);
        u8::from(crossed)
    }

    fn ldy(&mut self, bus: &mut impl Bus, mode: AddressingMode) -> u8 {
        let (v, crossed) = self.read_operand(bus, mode);
        self.y = v;
        self.set_zn(self.y);
        u8::from(crossed)
    }

    fn sta(&mut self, bus: &mut impl Bus, mode: AddressingMode) -> u8 {
        self.write_operand(bus, mode, self.a);
        0
    }

    fn stx(&mut self, bus: &mut impl Bus, mode: AddressingMode) -> u8 {
        self.write_operand(bus, mode, self.x);
        0
    }

    fn sty(&mut self, bus: &mut impl Bus, mode: AddressingMode) -> u8 {
        self.write_operand(bus, mode, self.y);
        0
    }

    // ===== Transfer =====

    fn tax(&mut self) -> u8 {
        self.x = self.a;
        self.set_zn(self.x);
        0
    }

    fn tay(&mut self) -> u8 {
        self.y = self.a;
        self.set_zn(self.y);
        0
    }

    fn txa(&mut self) -> u8 {
        self.a = self.x;
        self.set_zn(self.a);
        0
    }

    fn tya(&mut self) -> u8 {
        self.a = self.y;
        self.set_zn(self.a);
        0
    }

    fn tsx(&mut self) -> u8 {
        self.x = self.sp;
        self.set_zn(self.x);
        0
    }

    fn txs(&mut self) -> u8 {
        self.sp = self.x;
        0
    }

    // ===== Stack =====

    fn pha(&mut self, bus: &mut impl Bus) -> u8 {
        self.push(bus, self.a);
        0
    }

    fn php(&mut self, bus: &mut impl Bus) -> u8 {
        let value = self.status.to_stack_byte(true);
        self.push(bus, value);
        0
    }

    fn pla(&mut self, bus: &mut impl Bus) -> u8 {
        self.a = self.pop(bus);
        self.set_zn(self.a);
        0
    }

    fn plp(&mut self, bus: &mut impl Bus) -> u8 {
        let value = self.pop(bus);
        self.status = Status::from_stack_byte(value);
        0
    }

    // ===== Arithmetic =====

    fn do_adc(&mut self, value: u8) {
        let carry = u16::from(self.status.contains(Status::C));
        let sum = u16::from(self.a) + u16::from(value) + carry;
        let result = sum as u8;
        self.status.set(Status::C, sum > 0xFF);
        self.status.set(Status::V, (!(self.a ^ value) & (self.a ^ result) & 0x80) != 0);
        self.a = result;
        self.set_zn(self.a);
    }

    fn do_sbc(&mut self, value: u8) {
        self.do_adc(!value);
    }

    fn do_compare(&mut self, register: u8, value: u8) {
        let result = register.wrapping_sub(value);
        self.status.set(Status::C, register >= value);
        self.set_zn(result);
    }

    fn adc(&mut self, bus: &mut impl Bus, mode: AddressingMode) -> u8 {
        let (v, crossed) = self.read_operand(bus, mode);
        self.do_adc(v);
        u8::from(crossed)
    }

    fn sbc(&mut self, bus: &mut impl Bus, mode: AddressingMode) -> u8 {
        let (v, crossed) = self.read_operand(bus, mode);
        self.do_sbc(v);
        u8::from(crossed)
    }

    // ===== Increment/Decrement =====

    fn inc(&mut self, bus: &mut impl Bus, mode: AddressingMode) -> u8 {
        self.modify_operand(bus, mode, |cpu, v| {
            let r = v.wrapping_add(1);
            cpu.set_zn(r);
            r
        })
    }

    fn dec(&mut self, bus: &mut impl Bus, mode: AddressingMode) -> u8 {
        self.modify_operand(bus, mode, |cpu, v| {
            let r = v.wrapping_sub(1);
            cpu.set_zn(r);
            r
        })
    }

    fn inx(&mut self) -> u8 {
        self.x = self.x.wrapping_add(1);
        self.set_zn(self.x);
        0
    }

    fn iny(&mut self) -> u8 {
        self.y = self.y.wrapping_add(1);
        self.set_zn(self.y);
        0
    }

    fn dex(&mut self) -> u8 {
        self.x = self.x.wrapping_sub(1);
        self.set_zn(self.x);
        0
    }

    fn dey(&mut self) -> u8 {
        self.y = self.y.wrapping_sub(1);
        self.set_zn(self.y);
        0
    }

    // ===== Logic =====

    fn and(&mut self, bus: &mut impl Bus, mode: AddressingMode) -> u8 {
        let (v, crossed) = self.read_operand(bus, mode);
        self.a &= v;
        self.set_zn(self.a);
        u8::from(crossed)
    }

    fn ora(&mut self, bus: &mut impl Bus, mode: AddressingMode) -> u8 {
        let (v, crossed) = self.read_operand(bus, mode);
        self.a |= v;
        self.set_zn(self.a);
        u8::from(crossed)
    }

    fn eor(&mut self, bus: &mut impl Bus, mode: AddressingMode) -> u8 {
        let (v, crossed) = self.read_operand(bus, mode);
        self.a ^= v;
        self.set_zn(self.a);
        u8::from(crossed)
    }

    fn bit(&mut self, bus: &mut impl Bus, mode: AddressingMode) -> u8 {
        let (v, _) = self.read_operand(bus, mode);
        self.status.set(Status::Z, (self.a & v) == 0);
        self.status.set(Status::V, v & 0x40 != 0);
        self.status.set(Status::N, v & 0x80 != 0);
        0
    }

    // ===== Shift/Rotate =====

    fn asl_acc(&mut self) -> u8 {
        self.status.set(Status::C, self.a & 0x80 != 0);
        self.a <<= 1;
        self.set_zn(self.a);
        0
    }

    fn asl(&mut self, bus: &mut impl Bus, mode: AddressingMode) -> u8 {
        self.modify_operand(bus, mode, |cpu, v| {
            cpu.status.set(Status::C, v & 0x80 != 0);
            let r = v << 1;
            cpu.set_zn(r);
            r
        })
    }

    fn lsr_acc(&mut self) -> u8 {
        self.status.set(Status::C, self.a & 1 != 0);
        self.a >>= 1;
        self.set_zn(self.a);
        0
    }

    fn lsr(&mut self, bus: &mut impl Bus, mode: AddressingMode) -> u8 {
        self.modify_operand(bus, mode, |cpu, v| {
            cpu.status.set(Status::C, v & 1 != 0);
            let r = v >> 1;
            cpu.set_zn(r);
            r
        })
    }

    fn rol_acc(&mut self) -> u8 {
        let carry_in = u8::from(self.status.contains(Status::C));
        self.status.set(Status::C, self.a & 0x80 != 0);
        self.a = (self.a << 1) | carry_in;
        self.set_zn(self.a);
        0
    }

    fn rol(&mut self, bus: &mut impl Bus, mode: AddressingMode) -> u8 {
        self.modify_operand(bus, mode, |cpu, v| {
            let carry_in = u8::from(cpu.status.contains(Status::C));
            cpu.status.set(Status::C, v & 0x80 != 0);
            let r = (v << 1) | carry_in;
            cpu.set_zn(r);
            r
        })
    }

    fn ror_acc(&mut self) -> u8 {
        let carry_in = u8::from(self.status.contains(Status::C));
        self.status.set(Status::C, self.a & 1 != 0);
        self.a = (self.a >> 1) | (carry_in << 7);
        self.set_zn(self.a);
        0
    }

    fn ror(&mut self, bus: &mut impl Bus, mode: AddressingMode) -> u8 {
        self.modify_operand(bus, mode, |cpu, v| {
            let carry_in = u8::from(cpu.status.contains(Status::C));
            cpu.status.set(Status::C, v & 1 != 0);
            let r = (v >> 1) | (carry_in << 7);
            cpu.set_zn(r);
            r
        })
    }

    // ===== Compare =====

    fn cmp(&mut self, bus: &mut impl Bus, mode: AddressingMode) -> u8 {
        let (v, crossed) = self.read_operand(bus, mode);
        self.do_compare(self.a, v);
        u8::from(crossed)
    }

    fn cpx(&mut self, bus: &mut impl Bus, mode: AddressingMode) -> u8 {
        let (v, _) = self.read_operand(bus, mode);
        self.do_compare(self.x, v);
        0
    }

    fn cpy(&mut self, bus: &mut impl Bus, mode: AddressingMode) -> u8 {
        let (v, _) = self.read_operand(bus, mode);
        self.do_compare(self.y, v);
        0
    }

    // ===== Branch =====

    /// Shared branch implementation. Returns the extra cycles beyond the
    /// opcode table's base of 2: +1 if taken, +1 more if the branch target
    /// crosses a page boundary.
    fn branch(&mut self, bus: &mut impl Bus, condition: bool) -> u8 {
        let offset = bus.read(self.pc) as i8;
        self.pc = self.pc.wrapping_add(1);

        if !condition {
            return 0;
        }

        let old_pc = self.pc;
        self.pc = old_pc.wrapping_add(offset as u16);

        if (old_pc ^ self.pc) & 0xFF00 != 0 {
            2
        } else {
            1
        }
    }

    // ===== Jump/Subroutine =====

    fn jmp_abs(&mut self, bus: &mut impl Bus) -> u8 {
        self.pc = bus.read_u16(self.pc);
        0
    }

    fn jmp_ind(&mut self, bus: &mut impl Bus) -> u8 {
        let ptr = bus.read_u16(self.pc);
        self.pc = bus.read_u16_wrap(ptr);
        0
    }

    fn jsr(&mut self, bus: &mut impl Bus) -> u8 {
        let target = bus.read_u16(self.pc);
        let return_addr = self.pc.wrapping_add(1);
        self.push_u16(bus, return_addr);
        self.pc = target;
        0
    }

    fn rts(&mut self, bus: &mut impl Bus) -> u8 {
        let addr = self.pop_u16(bus);
        self.pc = addr.wrapping_add(1);
        0
    }

    fn rti(&mut self, bus: &mut impl Bus) -> u8 {
        let status_byte = self.pop(bus);
        self.status = Status::from_stack_byte(status_byte);
        self.pc = self.pop_u16(bus);
        0
    }

    fn brk(&mut self, bus: &mut impl Bus) -> u8 {
        self.pc = self.pc.wrapping_add(1);
        self.push_u16(bus, self.pc);
        self.push(bus, self.status.to_stack_byte(true));
        self.status.insert(Status::I);
        self.pc = bus.read_u16(0xFFFE);
        0
    }

    // ===== Flags =====

    fn clc(&mut self) -> u8 {
        self.status.remove(Status::C);
        0
    }
    fn sec(&mut self) -> u8 {
        self.status.insert(Status::C);
        0
    }
    fn cli(&mut self) -> u8 {
        self.status.remove(Status::I);
        0
    }
    fn sei(&mut self) -> u8 {
        self.status.insert(Status::I);
        0
    }
    fn clv(&mut self) -> u8 {
        self.status.remove(Status::V);
        0
    }
    fn cld(&mut self) -> u8 {
        self.status.remove(Status::D);
        0
    }
    fn sed(&mut self) -> u8 {
        self.status.insert(Status::D);
        0
    }

    // ===== Unofficial opcodes =====

    fn lax(&mut self, bus: &mut impl Bus, mode: AddressingMode) -> u8 {
        let (v, crossed) = self.read_operand(bus, mode);
        self.a = v;
        self.x = v;
        self.set_zn(v);
        u8::from(crossed)
    }

    fn sax(&mut self, bus: &mut impl Bus, mode: AddressingMode) -> u8 {
        let v = self.a & self.x;
        self.write_operand(bus, mode, v);
        0
    }

    fn dcp(&mut self, bus: &mut impl Bus, mode: AddressingMode) -> u8 {
        self.modify_operand(bus, mode, |cpu, v| {
            let r = v.wrapping_sub(1);
            cpu.do_compare(cpu.a, r);
            r
        })
    }

    fn isc(&mut self, bus: &mut impl Bus, mode: AddressingMode) -> u8 {
        self.modify_operand(bus, mode, |cpu, v| {
            let r = v.wrapping_add(1);
            cpu.do_sbc(r);
            r
        })
    }

    fn slo(&mut self, bus: &mut impl Bus, mode: AddressingMode) -> u8 {
        self.modify_operand(bus, mode, |cpu, v| {
            cpu.status.set(Status::C, v & 0x80 != 0);
            let r = v << 1;
            cpu.a |= r;
            cpu.set_zn(cpu.a);
            r
        })
    }

    fn rla(&mut self, bus: &mut impl Bus, mode: AddressingMode) -> u8 {
        self.modify_operand(bus, mode, |cpu, v| {
            let carry_in = u8::from(cpu.status.contains(Status::C));
            cpu.status.set(Status::C, v & 0x80 != 0);
            let r = (v << 1) | carry_in;
            cpu.a &= r;
            cpu.set_zn(cpu.a);
            r
        })
    }

    fn sre(&mut self, bus: &mut impl Bus, mode: AddressingMode) -> u8 {
        self.modify_operand(bus, mode, |cpu, v| {
            cpu.status.set(Status::C, v & 1 != 0);
            let r = v >> 1;
            cpu.a ^= r;
            cpu.set_zn(cpu.a);
            r
        })
    }

    fn rra(&mut self, bus: &mut impl Bus, mode: AddressingMode) -> u8 {
        self.modify_operand(bus, mode, |cpu, v| {
            let carry_in = u8::from(cpu.status.contains(Status::C));
            cpu.status.set(Status::C, v & 1 != 0);
            let r = (v >> 1) | (carry_in << 7);
            cpu.do_adc(r);
            r
        })
    }

    fn anc(&mut self, bus: &mut impl Bus) -> u8 {
        let (v, _) = self.read_operand(bus, AddressingMode::Immediate);
        self.a &= v;
        self.set_zn(self.a);
        self.status.set(Status::C, self.a & 0x80 != 0);
        0
    }

    fn alr(&mut self, bus: &mut impl Bus) -> u8 {
        let (v, _) = self.read_operand(bus, AddressingMode::Immediate);
        self.a &= v;
        self.status.set(Status::C, self.a & 1 != 0);
        self.a >>= 1;
        self.set_zn(self.a);
        0
    }

    fn arr(&mut self, bus: &mut impl Bus) -> u8 {
        let (v, _) = self.read_operand(bus, AddressingMode::Immediate);
        self.a &= v;
        let carry_in = u8::from(self.status.contains(Status::C));
        self.a = (self.a >> 1) | (carry_in << 7);
        self.set_zn(self.a);
        self.status.set(Status::C, self.a & 0x40 != 0);
        self.status.set(Status::V, ((self.a >> 6) ^ (self.a >> 5)) & 1 != 0);
        0
    }

    /// Highly unstable on real hardware; approximated as `X & imm`.
    fn xaa(&mut self, bus: &mut impl Bus) -> u8 {
        let (v, _) = self.read_operand(bus, AddressingMode::Immediate);
        self.a = self.x & v;
        self.set_zn(self.a);
        0
    }

    /// Highly unstable on real hardware; approximated as a plain load.
    fn lxa(&mut self, bus: &mut impl Bus) -> u8 {
        let (v, _) = self.read_operand(bus, AddressingMode::Immediate);
        self.a = v;
        self.x = v;
        self.set_zn(self.a);
        0
    }

    fn axs(&mut self, bus: &mut impl Bus) -> u8 {
        let (v, _) = self.read_operand(bus, AddressingMode::Immediate);
        let t = self.a & self.x;
        self.status.set(Status::C, t >= v);
        self.x = t.wrapping_sub(v);
        self.set_zn(self.x);
        0
    }

    /// Unstable on real hardware (depends on the high byte of the address
    /// plus one); approximated as a plain `A & X` store.
    fn sha(&mut self, bus: &mut impl Bus, mode: AddressingMode) -> u8 {
        let v = self.a & self.x;
        self.write_operand(bus, mode, v);
        0
    }

    fn shy(&mut self, bus: &mut impl Bus) -> u8 {
        let v = self.y;
        self.write_operand(bus, AddressingMode::AbsoluteX, v);
        0
    }

    fn shx(&mut self, bus: &mut impl Bus) -> u8 {
        let v = self.x;
        self.write_operand(bus, AddressingMode::AbsoluteY, v);
        0
    }

    fn tas(&mut self, bus: &mut impl Bus) -> u8 {
        self.sp = self.a & self.x;
        let v = self.sp;
        self.write_operand(bus, AddressingMode::AbsoluteY, v);
        0
    }

    fn las(&mut self, bus: &mut impl Bus, mode: AddressingMode) -> u8 {
        let (v, crossed) = self.read_operand(bus, mode);
        let r = v & self.sp;
        self.a = r;
        self.x = r;
        self.sp = r;
        self.set_zn(r);
        u8::from(crossed)
    }

    fn nop_read(&mut self, bus: &mut impl Bus, mode: AddressingMode) -> u8 {
        let (_, crossed) = self.read_operand(bus, mode);
        u8::from(crossed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestBus {
        memory: [u8; 0x10000],
    }

    impl TestBus {
        fn new() -> Self {
            Self { memory: [0; 0x10000] }
        }
    }

    impl Bus for TestBus {
        fn read(&mut self, addr: u16) -> u8 {
            self.memory[addr as usize]
        }
        fn write(&mut self, addr: u16, value: u8) {
            self.memory[addr as usize] = value;
        }
    }

    #[test]
    fn test_cpu_new() {
        let cpu = Cpu::new();
        assert_eq!(cpu.sp(), 0xFD);
        assert!(cpu.status().contains(Status::I));
    }

    #[test]
    fn test_cpu_reset() {
        let mut bus = TestBus::new();
        bus.memory[0xFFFC] = 0x00;
        bus.memory[0xFFFD] = 0x80;

        let mut cpu = Cpu::new();
        cpu.reset(&mut bus);

        assert_eq!(cpu.pc(), 0x8000);
        assert_eq!(cpu.cycles(), 7);
    }

    #[test]
    fn test_stack_operations() {
        let mut bus = TestBus::new();
        let mut cpu = Cpu::new();
        let sp = cpu.sp();

        cpu.push(&mut bus, 0x42);
        assert_eq!(cpu.sp(), sp.wrapping_sub(1));

        let value = cpu.pop(&mut bus);
        assert_eq!(value, 0x42);
        assert_eq!(cpu.sp(), sp);
    }

    #[test]
    fn test_push_u16_is_little_endian_on_stack() {
        let mut bus = TestBus::new();
        let mut cpu = Cpu::new();
        cpu.push_u16(&mut bus, 0x1234);

        // Pushed high byte first, so popping low-to-high recovers the value.
        let value = cpu.pop_u16(&mut bus);
        assert_eq!(value, 0x1234);
    }

    #[test]
    fn test_dex_dey_affect_correct_register() {
        let mut bus = TestBus::new();
        bus.memory[0xFFFC] = 0x00;
        bus.memory[0xFFFD] = 0x80;
        // LDX #$05, LDY #$0A, DEX, DEY
        bus.memory[0x8000..0x8006].copy_from_slice(&[0xA2, 0x05, 0xA0, 0x0A, 0xCA, 0x88]);

        let mut cpu = Cpu::new();
        cpu.reset(&mut bus);
        cpu.step(&mut bus);
        cpu.step(&mut bus);
        cpu.step(&mut bus);
        cpu.step(&mut bus);

        assert_eq!(cpu.x(), 0x04);
        assert_eq!(cpu.y(), 0x09);
    }
}
