//! V810 CPU interpreter.
//!
//! A compact NEC V810 core: 32 general registers (r0 hardwired to zero),
//! the system register file reachable through LDSR/STSR, and the
//! instruction formats I through VI. The 32-bit data bus is disabled on
//! this hardware, so word loads and stores are issued as two halfword bus
//! accesses, low half first.
//!
//! The CPU owns the bus. `run_frame` executes instructions until the bus
//! requests an exit (normally the video unit finishing its frame),
//! servicing scheduled peripheral events whenever the cycle counter
//! crosses the scheduler horizon. While halted the core fast-forwards
//! straight to the horizon instead of burning cycles.
//!
//! Interrupts are sampled at instruction boundaries: acceptance requires a
//! pending level, ID/EP/NP all clear, and the level at or above the PSW
//! mask. Bit-string and floating-point opcodes are decoded but not
//! executed; they are rare outside the FPU demo titles and land in the
//! stub log.

use crate::bus::VbBus;
use crate::scheduler::EVENT_NONE;
use emu_core::logging::{log, LogCategory, LogLevel};
use serde::{Deserialize, Serialize};

pub const PSW_Z: u32 = 0x0000_0001;
pub const PSW_S: u32 = 0x0000_0002;
pub const PSW_OV: u32 = 0x0000_0004;
pub const PSW_CY: u32 = 0x0000_0008;
pub const PSW_ID: u32 = 0x0000_1000;
pub const PSW_AE: u32 = 0x0000_2000;
pub const PSW_EP: u32 = 0x0000_4000;
pub const PSW_NP: u32 = 0x0000_8000;
/// Interrupt mask level, bits 16-19.
pub const PSW_IA_SHIFT: u32 = 16;

/// Writable PSW bits.
const PSW_MASK: u32 = 0x000F_F3FF;

// System register indices for LDSR/STSR
const SR_EIPC: usize = 0;
const SR_EIPSW: usize = 1;
const SR_FEPC: usize = 2;
const SR_FEPSW: usize = 3;
const SR_ECR: usize = 4;
const SR_PSW: usize = 5;
const SR_PIR: usize = 6;
const SR_TKCW: usize = 7;
const SR_CHCW: usize = 24;
const SR_ADTRE: usize = 25;

/// Serializable CPU register file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CpuState {
    pub regs: [u32; 32],
    pub pc: u32,
    pub psw: u32,
    pub eipc: u32,
    pub eipsw: u32,
    pub fepc: u32,
    pub fepsw: u32,
    pub ecr: u32,
    pub chcw: u32,
    pub adtre: u32,
    pub timestamp: i32,
    pub halted: bool,
}

/// NEC V810 core with the system bus attached.
#[derive(Debug)]
pub struct V810 {
    pub(crate) regs: [u32; 32],
    pub(crate) pc: u32,
    pub(crate) psw: u32,
    pub(crate) eipc: u32,
    pub(crate) eipsw: u32,
    pub(crate) fepc: u32,
    pub(crate) fepsw: u32,
    pub(crate) ecr: u32,
    pub(crate) chcw: u32,
    pub(crate) adtre: u32,
    /// Master-clock cycle counter, rebased to zero each frame
    pub(crate) timestamp: i32,
    pub(crate) halted: bool,
    pub bus: VbBus,
}

impl V810 {
    pub fn new(bus: VbBus) -> Self {
        let mut cpu = Self {
            regs: [0; 32],
            pc: 0,
            psw: 0,
            eipc: 0,
            eipsw: 0,
            fepc: 0,
            fepsw: 0,
            ecr: 0,
            chcw: 0,
            adtre: 0,
            timestamp: 0,
            halted: false,
            bus,
        };
        cpu.reset();
        cpu
    }

    /// Hardware reset: fetch starts at the top of ROM with interrupts
    /// blocked by NP until software lowers it.
    pub fn reset(&mut self) {
        self.regs = [0; 32];
        self.pc = 0xFFFF_FFF0;
        self.psw = PSW_NP;
        self.eipc = 0;
        self.eipsw = 0;
        self.fepc = 0;
        self.fepsw = 0;
        self.ecr = 0x0000_FFF0;
        self.chcw = 0;
        self.adtre = 0;
        self.timestamp = 0;
        self.halted = false;
    }

    /// Run until the bus requests an exit (end of video frame or an
    /// external stop). Returns the stop timestamp.
    pub fn run_frame(&mut self) -> i32 {
        loop {
            if self.timestamp >= self.bus.scheduler.horizon() {
                self.bus.handle_events(self.timestamp);
                if self.bus.take_exit() {
                    break;
                }
            }
            self.check_interrupts();
            if self.halted {
                // Nothing will change until the next event fires. The VIP
                // always keeps a frame event pending, so the horizon is
                // finite here; the clamp keeps the counter off the sentinel
                // if that ever stops holding.
                let horizon = self.bus.scheduler.horizon().min(EVENT_NONE - 1);
                self.timestamp = horizon.max(self.timestamp + 1);
                continue;
            }
            let cycles = self.step_one();
            self.timestamp += cycles as i32;
        }
        self.timestamp
    }

    pub fn save_state(&self) -> CpuState {
        CpuState {
            regs: self.regs,
            pc: self.pc,
            psw: self.psw,
            eipc: self.eipc,
            eipsw: self.eipsw,
            fepc: self.fepc,
            fepsw: self.fepsw,
            ecr: self.ecr,
            chcw: self.chcw,
            adtre: self.adtre,
            timestamp: self.timestamp,
            halted: self.halted,
        }
    }

    pub fn load_state(&mut self, s: &CpuState) {
        self.regs = s.regs;
        self.regs[0] = 0;
        self.pc = s.pc;
        self.psw = s.psw & PSW_MASK;
        self.eipc = s.eipc;
        self.eipsw = s.eipsw;
        self.fepc = s.fepc;
        self.fepsw = s.fepsw;
        self.ecr = s.ecr;
        self.chcw = s.chcw;
        self.adtre = s.adtre;
        self.timestamp = s.timestamp;
        self.halted = s.halted;
    }

    /// Sample the interrupt lines at an instruction boundary.
    pub(crate) fn check_interrupts(&mut self) {
        let level = match self.bus.irq.level() {
            Some(l) => u32::from(l),
            None => return,
        };
        if self.psw & (PSW_ID | PSW_EP | PSW_NP) != 0 {
            return;
        }
        if level < (self.psw >> PSW_IA_SHIFT) & 0xF {
            return;
        }

        self.halted = false;
        self.eipc = self.pc;
        self.eipsw = self.psw;
        let code = 0xFE00 + (level << 4);
        self.ecr = (self.ecr & 0xFFFF_0000) | code;
        // Raise the mask past this level and block nesting until software
        // lowers ID again.
        self.psw = (self.psw & !(0xF << PSW_IA_SHIFT)) | ((level + 1) << PSW_IA_SHIFT);
        self.psw |= PSW_ID;
        self.pc = 0xFFFF_FE00 + (level << 4);
        self.timestamp += 10;

        log(LogCategory::CPU, LogLevel::Debug, || {
            format!("interrupt level {} taken, vector {:#010X}", level, self.pc)
        });
    }

    #[inline]
    fn set_reg(&mut self, r: usize, v: u32) {
        if r != 0 {
            self.regs[r] = v;
        }
    }

    #[inline]
    fn flag(&self, f: u32) -> bool {
        self.psw & f != 0
    }

    fn set_flags(&mut self, z: bool, s: bool, ov: bool, cy: bool) {
        self.psw &= !(PSW_Z | PSW_S | PSW_OV | PSW_CY);
        self.psw |= u32::from(z)
            | (u32::from(s) << 1)
            | (u32::from(ov) << 2)
            | (u32::from(cy) << 3);
    }

    /// Z/S from the result, OV cleared, CY untouched (logic ops).
    fn set_flags_logic(&mut self, v: u32) {
        let cy = self.flag(PSW_CY);
        self.set_flags(v == 0, (v as i32) < 0, false, cy);
    }

    fn alu_add(&mut self, a: u32, b: u32) -> u32 {
        let (r, cy) = a.overflowing_add(b);
        let ov = (!(a ^ b) & (a ^ r)) >> 31 != 0;
        self.set_flags(r == 0, (r as i32) < 0, ov, cy);
        r
    }

    fn alu_sub(&mut self, a: u32, b: u32) -> u32 {
        let (r, cy) = a.overflowing_sub(b);
        let ov = ((a ^ b) & (a ^ r)) >> 31 != 0;
        self.set_flags(r == 0, (r as i32) < 0, ov, cy);
        r
    }

    fn shift_left(&mut self, v: u32, amount: u32) -> u32 {
        let (r, cy) = if amount == 0 {
            (v, false)
        } else {
            (v << amount, (v >> (32 - amount)) & 1 != 0)
        };
        self.set_flags(r == 0, (r as i32) < 0, false, cy);
        r
    }

    fn shift_right(&mut self, v: u32, amount: u32) -> u32 {
        let (r, cy) = if amount == 0 {
            (v, false)
        } else {
            (v >> amount, (v >> (amount - 1)) & 1 != 0)
        };
        self.set_flags(r == 0, (r as i32) < 0, false, cy);
        r
    }

    fn shift_right_arith(&mut self, v: u32, amount: u32) -> u32 {
        let (r, cy) = if amount == 0 {
            (v, false)
        } else {
            (((v as i32) >> amount) as u32, (v >> (amount - 1)) & 1 != 0)
        };
        self.set_flags(r == 0, (r as i32) < 0, false, cy);
        r
    }

    fn test_cond(&self, cond: u32) -> bool {
        let z = self.flag(PSW_Z);
        let s = self.flag(PSW_S);
        let ov = self.flag(PSW_OV);
        let cy = self.flag(PSW_CY);
        let base = match cond & 7 {
            0 => ov,
            1 => cy,
            2 => z,
            3 => cy || z,
            4 => s,
            5 => true,
            6 => s != ov,
            _ => (s != ov) || z,
        };
        if cond & 8 != 0 {
            !base
        } else {
            base
        }
    }

    fn read32(&mut self, addr: u32) -> u32 {
        let lo = self.bus.read16(&mut self.timestamp, addr);
        let hi = self.bus.read16(&mut self.timestamp, addr.wrapping_add(2));
        u32::from(lo) | (u32::from(hi) << 16)
    }

    fn write32(&mut self, addr: u32, value: u32) {
        self.bus.write16(&mut self.timestamp, addr, value as u16);
        self.bus
            .write16(&mut self.timestamp, addr.wrapping_add(2), (value >> 16) as u16);
    }

    fn get_sysreg(&self, idx: usize) -> u32 {
        match idx {
            SR_EIPC => self.eipc,
            SR_EIPSW => self.eipsw,
            SR_FEPC => self.fepc,
            SR_FEPSW => self.fepsw,
            SR_ECR => self.ecr,
            SR_PSW => self.psw,
            SR_PIR => 0x810,
            SR_TKCW => 0xE0,
            SR_CHCW => self.chcw,
            SR_ADTRE => self.adtre,
            _ => {
                log(LogCategory::Stubs, LogLevel::Warn, || {
                    format!("STSR from unknown system register {}", idx)
                });
                0
            }
        }
    }

    fn set_sysreg(&mut self, idx: usize, value: u32) {
        match idx {
            SR_EIPC => self.eipc = value & !1,
            SR_EIPSW => self.eipsw = value & PSW_MASK,
            SR_FEPC => self.fepc = value & !1,
            SR_FEPSW => self.fepsw = value & PSW_MASK,
            // ECR is read-only.
            SR_ECR => {}
            SR_PSW => self.psw = value & PSW_MASK,
            SR_PIR | SR_TKCW => {}
            SR_CHCW => self.chcw = value & 2,
            SR_ADTRE => self.adtre = value & !1,
            _ => {
                log(LogCategory::Stubs, LogLevel::Warn, || {
                    format!("LDSR to unknown system register {}", idx)
                });
            }
        }
    }

    /// TRAP and divide-by-zero share the exception entry sequence.
    fn enter_exception(&mut self, return_pc: u32, code: u32, handler: u32) {
        self.eipc = return_pc;
        self.eipsw = self.psw;
        self.ecr = (self.ecr & 0xFFFF_0000) | code;
        self.psw |= PSW_ID | PSW_EP;
        self.pc = handler;
    }

    /// Execute one instruction. Returns its cycle cost; `pc` is fully
    /// advanced on return.
    pub(crate) fn step_one(&mut self) -> u32 {
        let hw = self.bus.read16(&mut self.timestamp, self.pc);

        // Format III: 100 cond disp9
        if hw & 0xE000 == 0x8000 {
            let cond = u32::from(hw >> 9) & 0xF;
            if self.test_cond(cond) {
                let disp = ((i32::from(hw as i16) << 23) >> 23) as u32 & !1;
                self.pc = self.pc.wrapping_add(disp);
                return 3;
            }
            self.pc = self.pc.wrapping_add(2);
            return 1;
        }

        let opcode = hw >> 10;
        let r1 = usize::from(hw & 0x1F);
        let r2 = usize::from((hw >> 5) & 0x1F);
        let imm5s = ((i32::from(hw as i16) << 27) >> 27) as u32;
        let imm5u = u32::from(hw) & 0x1F;

        match opcode {
            // Format I: register-register
            0x00 => {
                self.set_reg(r2, self.regs[r1]);
                self.pc = self.pc.wrapping_add(2);
                1
            }
            0x01 => {
                let v = self.alu_add(self.regs[r2], self.regs[r1]);
                self.set_reg(r2, v);
                self.pc = self.pc.wrapping_add(2);
                1
            }
            0x02 => {
                let v = self.alu_sub(self.regs[r2], self.regs[r1]);
                self.set_reg(r2, v);
                self.pc = self.pc.wrapping_add(2);
                1
            }
            0x03 => {
                self.alu_sub(self.regs[r2], self.regs[r1]);
                self.pc = self.pc.wrapping_add(2);
                1
            }
            0x04 => {
                let v = self.shift_left(self.regs[r2], self.regs[r1] & 0x1F);
                self.set_reg(r2, v);
                self.pc = self.pc.wrapping_add(2);
                1
            }
            0x05 => {
                let v = self.shift_right(self.regs[r2], self.regs[r1] & 0x1F);
                self.set_reg(r2, v);
                self.pc = self.pc.wrapping_add(2);
                1
            }
            0x06 => {
                self.pc = self.regs[r1] & !1;
                3
            }
            0x07 => {
                let v = self.shift_right_arith(self.regs[r2], self.regs[r1] & 0x1F);
                self.set_reg(r2, v);
                self.pc = self.pc.wrapping_add(2);
                1
            }
            0x08 => {
                // MUL: 64-bit signed product, high half to r30.
                let prod = i64::from(self.regs[r2] as i32) * i64::from(self.regs[r1] as i32);
                let lo = prod as u32;
                let hi = (prod >> 32) as u32;
                let ov = prod != i64::from(lo as i32);
                self.set_reg(30, hi);
                self.set_flags(lo == 0, (lo as i32) < 0, ov, self.flag(PSW_CY));
                self.set_reg(r2, lo);
                self.pc = self.pc.wrapping_add(2);
                13
            }
            0x09 => {
                let a = self.regs[r2] as i32;
                let b = self.regs[r1] as i32;
                if b == 0 {
                    self.enter_exception(self.pc, 0xFF80, 0xFFFF_FF80);
                    return 38;
                }
                let (q, rem, ov) = if a == i32::MIN && b == -1 {
                    (i32::MIN, 0, true)
                } else {
                    (a / b, a % b, false)
                };
                self.set_reg(30, rem as u32);
                self.set_flags(q == 0, q < 0, ov, self.flag(PSW_CY));
                self.set_reg(r2, q as u32);
                self.pc = self.pc.wrapping_add(2);
                38
            }
            0x0A => {
                let prod = u64::from(self.regs[r2]) * u64::from(self.regs[r1]);
                let lo = prod as u32;
                let hi = (prod >> 32) as u32;
                self.set_reg(30, hi);
                self.set_flags(lo == 0, (lo as i32) < 0, hi != 0, self.flag(PSW_CY));
                self.set_reg(r2, lo);
                self.pc = self.pc.wrapping_add(2);
                13
            }
            0x0B => {
                let a = self.regs[r2];
                let b = self.regs[r1];
                if b == 0 {
                    self.enter_exception(self.pc, 0xFF80, 0xFFFF_FF80);
                    return 36;
                }
                let q = a / b;
                self.set_reg(30, a % b);
                self.set_flags(q == 0, (q as i32) < 0, false, self.flag(PSW_CY));
                self.set_reg(r2, q);
                self.pc = self.pc.wrapping_add(2);
                36
            }
            0x0C => {
                let v = self.regs[r2] | self.regs[r1];
                self.set_flags_logic(v);
                self.set_reg(r2, v);
                self.pc = self.pc.wrapping_add(2);
                1
            }
            0x0D => {
                let v = self.regs[r2] & self.regs[r1];
                self.set_flags_logic(v);
                self.set_reg(r2, v);
                self.pc = self.pc.wrapping_add(2);
                1
            }
            0x0E => {
                let v = self.regs[r2] ^ self.regs[r1];
                self.set_flags_logic(v);
                self.set_reg(r2, v);
                self.pc = self.pc.wrapping_add(2);
                1
            }
            0x0F => {
                let v = !self.regs[r1];
                self.set_flags_logic(v);
                self.set_reg(r2, v);
                self.pc = self.pc.wrapping_add(2);
                1
            }

            // Format II: register-immediate
            0x10 => {
                self.set_reg(r2, imm5s);
                self.pc = self.pc.wrapping_add(2);
                1
            }
            0x11 => {
                let v = self.alu_add(self.regs[r2], imm5s);
                self.set_reg(r2, v);
                self.pc = self.pc.wrapping_add(2);
                1
            }
            0x12 => {
                let v = u32::from(self.test_cond(imm5u & 0xF));
                self.set_reg(r2, v);
                self.pc = self.pc.wrapping_add(2);
                1
            }
            0x13 => {
                self.alu_sub(self.regs[r2], imm5s);
                self.pc = self.pc.wrapping_add(2);
                1
            }
            0x14 => {
                let v = self.shift_left(self.regs[r2], imm5u);
                self.set_reg(r2, v);
                self.pc = self.pc.wrapping_add(2);
                1
            }
            0x15 => {
                let v = self.shift_right(self.regs[r2], imm5u);
                self.set_reg(r2, v);
                self.pc = self.pc.wrapping_add(2);
                1
            }
            0x16 => {
                self.psw &= !PSW_ID;
                self.pc = self.pc.wrapping_add(2);
                12
            }
            0x17 => {
                let v = self.shift_right_arith(self.regs[r2], imm5u);
                self.set_reg(r2, v);
                self.pc = self.pc.wrapping_add(2);
                1
            }
            0x18 => {
                // TRAP: vectors 0-15 and 16-31 use separate handlers.
                let vec = imm5u;
                let (code, handler) = if vec < 16 {
                    (0xFFA0 + vec, 0xFFFF_FFA0)
                } else {
                    (0xFFB0 + (vec - 16), 0xFFFF_FFB0)
                };
                self.enter_exception(self.pc.wrapping_add(2), code, handler);
                15
            }
            0x19 => {
                // RETI: NP selects the fatal-exception pair.
                if self.psw & PSW_NP != 0 {
                    self.pc = self.fepc;
                    self.psw = self.fepsw;
                } else {
                    self.pc = self.eipc;
                    self.psw = self.eipsw;
                }
                10
            }
            0x1A => {
                self.halted = true;
                self.pc = self.pc.wrapping_add(2);
                1
            }
            0x1C => {
                self.set_sysreg(r1, self.regs[r2]);
                self.pc = self.pc.wrapping_add(2);
                8
            }
            0x1D => {
                let v = self.get_sysreg(r1);
                self.set_reg(r2, v);
                self.pc = self.pc.wrapping_add(2);
                8
            }
            0x1E => {
                self.psw |= PSW_ID;
                self.pc = self.pc.wrapping_add(2);
                12
            }
            0x1F => {
                log(LogCategory::Stubs, LogLevel::Warn, || {
                    format!("bit-string sub-op {} skipped at {:#010X}", imm5u, self.pc)
                });
                self.pc = self.pc.wrapping_add(2);
                1
            }

            // Format IV: 26-bit displacement jumps
            0x2A | 0x2B => {
                let hw2 = self.bus.read16(&mut self.timestamp, self.pc.wrapping_add(2));
                let raw = (u32::from(hw) & 0x3FF) << 16 | u32::from(hw2);
                let disp = ((raw << 6) as i32 >> 6) as u32 & !1;
                if opcode == 0x2B {
                    self.set_reg(31, self.pc.wrapping_add(4));
                }
                self.pc = self.pc.wrapping_add(disp);
                3
            }

            // Format V: 16-bit immediate
            0x28 | 0x29 | 0x2C | 0x2D | 0x2E | 0x2F => {
                let hw2 = self.bus.read16(&mut self.timestamp, self.pc.wrapping_add(2));
                let imm = u32::from(hw2);
                let imm_s = i32::from(hw2 as i16) as u32;
                let cycles = match opcode {
                    0x28 => {
                        self.set_reg(r2, self.regs[r1].wrapping_add(imm_s));
                        1
                    }
                    0x29 => {
                        let v = self.alu_add(self.regs[r1], imm_s);
                        self.set_reg(r2, v);
                        1
                    }
                    0x2C => {
                        let v = self.regs[r1] | imm;
                        self.set_flags_logic(v);
                        self.set_reg(r2, v);
                        1
                    }
                    0x2D => {
                        let v = self.regs[r1] & imm;
                        self.set_flags_logic(v);
                        self.set_reg(r2, v);
                        1
                    }
                    0x2E => {
                        let v = self.regs[r1] ^ imm;
                        self.set_flags_logic(v);
                        self.set_reg(r2, v);
                        1
                    }
                    _ => {
                        self.set_reg(r2, self.regs[r1].wrapping_add(imm << 16));
                        1
                    }
                };
                self.pc = self.pc.wrapping_add(4);
                cycles
            }

            // Format VI: loads, stores and I/O
            0x30 | 0x31 | 0x33 | 0x34 | 0x35 | 0x37 | 0x38 | 0x39 | 0x3B | 0x3C | 0x3D
            | 0x3F | 0x3A => {
                let hw2 = self.bus.read16(&mut self.timestamp, self.pc.wrapping_add(2));
                let disp = i32::from(hw2 as i16) as u32;
                let addr = self.regs[r1].wrapping_add(disp);
                let cycles = match opcode {
                    0x30 => {
                        let v = self.bus.read8(&mut self.timestamp, addr);
                        self.set_reg(r2, i32::from(v as i8) as u32);
                        5
                    }
                    0x31 => {
                        let v = self.bus.read16(&mut self.timestamp, addr & !1);
                        self.set_reg(r2, i32::from(v as i16) as u32);
                        5
                    }
                    0x33 => {
                        let v = self.read32(addr & !3);
                        self.set_reg(r2, v);
                        5
                    }
                    0x34 => {
                        self.bus.write8(&mut self.timestamp, addr, self.regs[r2] as u8);
                        4
                    }
                    0x35 => {
                        self.bus
                            .write16(&mut self.timestamp, addr & !1, self.regs[r2] as u16);
                        4
                    }
                    0x37 => {
                        self.write32(addr & !3, self.regs[r2]);
                        4
                    }
                    0x38 => {
                        let v = self.bus.read8(&mut self.timestamp, addr);
                        self.set_reg(r2, u32::from(v));
                        5
                    }
                    0x39 => {
                        let v = self.bus.read16(&mut self.timestamp, addr & !1);
                        self.set_reg(r2, u32::from(v));
                        5
                    }
                    0x3B => {
                        let v = self.read32(addr & !3);
                        self.set_reg(r2, v);
                        5
                    }
                    0x3C => {
                        self.bus.write8(&mut self.timestamp, addr, self.regs[r2] as u8);
                        4
                    }
                    0x3D => {
                        self.bus
                            .write16(&mut self.timestamp, addr & !1, self.regs[r2] as u16);
                        4
                    }
                    0x3F => {
                        self.write32(addr & !3, self.regs[r2]);
                        4
                    }
                    _ => {
                        // CAXI: compare-and-exchange against r30.
                        let a = addr & !3;
                        let t = self.read32(a);
                        self.alu_sub(self.regs[r2], t);
                        if self.flag(PSW_Z) {
                            self.write32(a, self.regs[30]);
                        } else {
                            self.write32(a, t);
                        }
                        self.set_reg(r2, t);
                        26
                    }
                };
                self.pc = self.pc.wrapping_add(4);
                cycles
            }

            0x3E => {
                // Floating-point sub-ops: decoded, logged, skipped.
                let hw2 = self.bus.read16(&mut self.timestamp, self.pc.wrapping_add(2));
                log(LogCategory::Stubs, LogLevel::Warn, || {
                    format!(
                        "floating-point sub-op {:#04X} skipped at {:#010X}",
                        hw2 >> 10,
                        self.pc
                    )
                });
                self.pc = self.pc.wrapping_add(4);
                1
            }

            _ => {
                log(LogCategory::Stubs, LogLevel::Warn, || {
                    format!("illegal opcode {:#04X} at {:#010X}", opcode, self.pc)
                });
                self.pc = self.pc.wrapping_add(2);
                1
            }
        }
    }
}

impl emu_core::Cpu for V810 {
    fn reset(&mut self) {
        V810::reset(self);
    }

    fn step(&mut self) -> u32 {
        self.check_interrupts();
        if self.halted {
            return 1;
        }
        let cycles = self.step_one();
        self.timestamp += cycles as i32;
        cycles
    }
}
