// rvgpio - Switch-to-LED Monitor Firmware and Board Simulator
// Copyright (C) 2026 The rvgpio developers
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::decoder::{decode, AluKind, BranchKind, CsrKind, CsrSource, LoadKind, Op, StoreKind};
use crate::{Bus, Cpu, SimResult, SimulationObserver, StepOutcome};
use std::collections::HashMap;
use std::sync::Arc;

const CSR_MEPC: u16 = 0x341;
const CSR_MHARTID: u16 = 0xF14;

#[derive(Debug, Default)]
pub struct RiscV {
    x: [u32; 32], // x0..x31. x0 is hardwired to 0 in logic.
    pc: u32,
    csrs: HashMap<u16, u32>,
}

impl RiscV {
    pub fn new() -> Self {
        Self::default()
    }

    fn read_reg(&self, n: u8) -> u32 {
        if n == 0 {
            0
        } else {
            self.x[n as usize]
        }
    }

    fn write_reg(&mut self, n: u8, val: u32) {
        if n != 0 {
            self.x[n as usize] = val;
        }
    }

    fn read_csr(&self, csr: u16) -> u32 {
        match csr {
            CSR_MHARTID => 0, // single hart
            _ => self.csrs.get(&csr).copied().unwrap_or(0),
        }
    }

    fn write_csr(&mut self, csr: u16, val: u32) {
        if csr != CSR_MHARTID {
            self.csrs.insert(csr, val);
        }
    }

    fn alu(&self, kind: AluKind, lhs: u32, rhs: u32) -> u32 {
        match kind {
            AluKind::Add => lhs.wrapping_add(rhs),
            AluKind::Sub => lhs.wrapping_sub(rhs),
            AluKind::Sll => lhs << (rhs & 0x1F),
            AluKind::Slt => ((lhs as i32) < (rhs as i32)) as u32,
            AluKind::Sltu => (lhs < rhs) as u32,
            AluKind::Xor => lhs ^ rhs,
            AluKind::Srl => lhs >> (rhs & 0x1F),
            AluKind::Sra => ((lhs as i32) >> (rhs & 0x1F)) as u32,
            AluKind::Or => lhs | rhs,
            AluKind::And => lhs & rhs,
        }
    }

    fn branch_taken(&self, kind: BranchKind, rs1: u8, rs2: u8) -> bool {
        let a = self.read_reg(rs1);
        let b = self.read_reg(rs2);
        match kind {
            BranchKind::Eq => a == b,
            BranchKind::Ne => a != b,
            BranchKind::Lt => (a as i32) < (b as i32),
            BranchKind::Ge => (a as i32) >= (b as i32),
            BranchKind::Ltu => a < b,
            BranchKind::Geu => a >= b,
        }
    }
}

impl Cpu for RiscV {
    fn reset(&mut self) {
        self.pc = 0;
        self.x = [0; 32];
        self.csrs.clear();
    }

    fn step(
        &mut self,
        bus: &mut dyn Bus,
        observers: &[Arc<dyn SimulationObserver>],
    ) -> SimResult<StepOutcome> {
        let word = bus.read_u32(self.pc as u64)?;

        for observer in observers {
            observer.on_step_start(self.pc, word);
        }

        let op = decode(word);
        tracing::trace!("PC={:#010x} Op={:#010x} {:?}", self.pc, word, op);

        let mut next_pc = self.pc.wrapping_add(4);
        let mut outcome = StepOutcome::Continue;

        match op {
            Op::Lui { rd, imm } => self.write_reg(rd, imm),
            Op::Auipc { rd, imm } => {
                self.write_reg(rd, self.pc.wrapping_add(imm));
            }
            Op::Jal { rd, offset } => {
                self.write_reg(rd, self.pc.wrapping_add(4));
                next_pc = self.pc.wrapping_add(offset as u32);
            }
            Op::Jalr { rd, rs1, offset } => {
                let target = self.read_reg(rs1).wrapping_add(offset as u32) & !1;
                self.write_reg(rd, self.pc.wrapping_add(4));
                next_pc = target;
            }
            Op::Branch {
                kind,
                rs1,
                rs2,
                offset,
            } => {
                if self.branch_taken(kind, rs1, rs2) {
                    next_pc = self.pc.wrapping_add(offset as u32);
                }
            }
            Op::Load {
                kind,
                rd,
                rs1,
                offset,
            } => {
                let addr = self.read_reg(rs1).wrapping_add(offset as u32) as u64;
                let val = match kind {
                    LoadKind::B => bus.read_u8(addr)? as i8 as i32 as u32,
                    LoadKind::Bu => bus.read_u8(addr)? as u32,
                    LoadKind::H => bus.read_u16(addr)? as i16 as i32 as u32,
                    LoadKind::Hu => bus.read_u16(addr)? as u32,
                    LoadKind::W => bus.read_u32(addr)?,
                };
                self.write_reg(rd, val);
            }
            Op::Store {
                kind,
                rs1,
                rs2,
                offset,
            } => {
                let addr = self.read_reg(rs1).wrapping_add(offset as u32) as u64;
                let val = self.read_reg(rs2);
                match kind {
                    StoreKind::B => bus.write_u8(addr, val as u8)?,
                    StoreKind::H => bus.write_u16(addr, val as u16)?,
                    StoreKind::W => bus.write_u32(addr, val)?,
                }
            }
            Op::AluImm { kind, rd, rs1, imm } => {
                let res = self.alu(kind, self.read_reg(rs1), imm as u32);
                self.write_reg(rd, res);
            }
            Op::Alu { kind, rd, rs1, rs2 } => {
                let res = self.alu(kind, self.read_reg(rs1), self.read_reg(rs2));
                self.write_reg(rd, res);
            }
            Op::Csr { kind, rd, src, csr } => {
                let old = self.read_csr(csr);
                let (src_val, src_is_zero) = match src {
                    CsrSource::Reg(rs1) => (self.read_reg(rs1), rs1 == 0),
                    CsrSource::Imm(imm) => (imm as u32, imm == 0),
                };
                match kind {
                    CsrKind::Rw => self.write_csr(csr, src_val),
                    // Rs/Rc with x0 or a zero immediate are pure reads.
                    CsrKind::Rs if !src_is_zero => self.write_csr(csr, old | src_val),
                    CsrKind::Rc if !src_is_zero => self.write_csr(csr, old & !src_val),
                    _ => {}
                }
                self.write_reg(rd, old);
            }
            Op::Fence => {
                // Single in-order core, no reordering to fence off.
            }
            Op::Ecall => {
                tracing::warn!("ECALL at {:#x} with no trap handler model", self.pc);
            }
            Op::Ebreak => {
                tracing::info!("EBREAK at {:#x}, halting simulation", self.pc);
                outcome = StepOutcome::Halted;
            }
            Op::Mret => {
                next_pc = self.read_csr(CSR_MEPC);
            }
            Op::Wfi => {
                // No interrupt sources are modeled, so the core would sleep forever.
                tracing::info!("WFI at {:#x}, halting simulation", self.pc);
                outcome = StepOutcome::Halted;
            }
            Op::Unknown(inst) => {
                tracing::error!("Unknown instruction {:#010x} at {:#x}", inst, self.pc);
                return Err(crate::SimulationError::DecodeError(self.pc as u64));
            }
        }

        self.pc = next_pc;

        for observer in observers {
            observer.on_step_end(1);
        }

        Ok(outcome)
    }

    fn set_pc(&mut self, val: u32) {
        self.pc = val;
    }
    fn pc(&self) -> u32 {
        self.pc
    }
    fn register(&self, id: u8) -> u32 {
        if id < 32 {
            self.read_reg(id)
        } else {
            0
        }
    }
    fn set_register(&mut self, id: u8, val: u32) {
        if id < 32 {
            self.write_reg(id, val);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::SystemBus;
    use crate::{Machine, StopReason};

    fn machine_with(words: &[u32]) -> Machine<RiscV> {
        let mut bus = SystemBus::new();
        for (i, w) in words.iter().enumerate() {
            crate::Bus::write_u32(&mut bus, (i * 4) as u64, *w).unwrap();
        }
        Machine::new(RiscV::new(), bus)
    }

    #[test]
    fn test_addi() {
        // ADDI x1, x0, 5
        let mut machine = machine_with(&[0x0050_0093]);
        machine.step().unwrap();
        assert_eq!(machine.cpu.register(1), 5);
        assert_eq!(machine.cpu.pc(), 4);
    }

    #[test]
    fn test_lui_srli() {
        // LUI x3, 0x12340; SRLI x3, x3, 16
        let mut machine = machine_with(&[0x1234_01B7, 0x0101_D193]);
        machine.step().unwrap();
        assert_eq!(machine.cpu.register(3), 0x1234_0000);
        machine.step().unwrap();
        assert_eq!(machine.cpu.register(3), 0x0000_1234);
    }

    #[test]
    fn test_beq_taken() {
        let mut machine = machine_with(&[
            0x00A0_0093, // ADDI x1, x0, 10
            0x00A0_0113, // ADDI x2, x0, 10
            0x0020_8463, // BEQ x1, x2, +8
            0x0010_0193, // ADDI x3, x0, 1 (skipped)
            0x0010_0213, // ADDI x4, x0, 1
        ]);
        machine.step().unwrap();
        machine.step().unwrap();
        assert_eq!(machine.cpu.pc(), 8);
        machine.step().unwrap();
        assert_eq!(machine.cpu.pc(), 16);
        machine.step().unwrap();
        assert_eq!(machine.cpu.register(4), 1);
        assert_eq!(machine.cpu.register(3), 0);
    }

    #[test]
    fn test_store_load_roundtrip() {
        let mut machine = machine_with(&[
            0x0100_0093, // ADDI x1, x0, 0x10
            0x4020_A023, // SW x2, 0x400(x1)   ; 0x410, plain RAM
            0x4000_A183, // LW x3, 0x400(x1)
        ]);
        machine.cpu.set_register(2, 0xDEAD_BEEF);
        machine.step().unwrap();
        machine.step().unwrap();
        machine.step().unwrap();
        assert_eq!(machine.cpu.register(3), 0xDEAD_BEEF);
    }

    #[test]
    fn test_x0_stays_zero() {
        // ADDI x0, x0, 7
        let mut machine = machine_with(&[0x0070_0013]);
        machine.step().unwrap();
        assert_eq!(machine.cpu.register(0), 0);
    }

    #[test]
    fn test_csr_roundtrip() {
        let mut machine = machine_with(&[
            0x3050_9073, // CSRRW x0, mtvec, x1
            0x3050_2173, // CSRRS x2, mtvec, x0
        ]);
        machine.cpu.set_register(1, 0x8000_0040);
        machine.step().unwrap();
        machine.step().unwrap();
        assert_eq!(machine.cpu.register(2), 0x8000_0040);
    }

    #[test]
    fn test_mhartid_reads_zero() {
        // CSRRS x5, mhartid, x0
        let mut machine = machine_with(&[0xF140_22F3]);
        machine.cpu.set_register(5, 0xFFFF_FFFF);
        machine.step().unwrap();
        assert_eq!(machine.cpu.register(5), 0);
    }

    #[test]
    fn test_ebreak_halts() {
        let mut machine = machine_with(&[0x0010_0073]);
        let outcome = machine.run(10);
        assert_eq!(outcome.stop, StopReason::Halt);
        assert_eq!(outcome.steps, 1);
    }

    #[test]
    fn test_unknown_instruction_faults() {
        let mut machine = machine_with(&[0xFFFF_FFFF]);
        let outcome = machine.run(10);
        assert_eq!(outcome.stop, StopReason::DecodeError(0));
    }

    #[test]
    fn test_fetch_from_unmapped_faults() {
        let mut machine = machine_with(&[]);
        machine.cpu.set_pc(0x4000_0000);
        let outcome = machine.run(10);
        assert_eq!(outcome.stop, StopReason::MemoryViolation(0x4000_0000));
    }
}
