// rvgpio - Switch-to-LED Monitor Firmware and Board Simulator
// Copyright (C) 2026 The rvgpio developers
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! RV32I + Zicsr instruction decoding.
//!
//! Covers the base integer ISA plus the CSR instructions and MRET/WFI that
//! `riscv-rt` startup code executes before reaching `main`.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchKind {
    Eq,
    Ne,
    Lt,
    Ge,
    Ltu,
    Geu,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadKind {
    B,
    H,
    W,
    Bu,
    Hu,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    B,
    H,
    W,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AluKind {
    Add,
    Sub,
    Sll,
    Slt,
    Sltu,
    Xor,
    Srl,
    Sra,
    Or,
    And,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CsrKind {
    Rw,
    Rs,
    Rc,
}

/// CSR operand: a source register or a 5-bit zero-extended immediate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CsrSource {
    Reg(u8),
    Imm(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Lui { rd: u8, imm: u32 },
    Auipc { rd: u8, imm: u32 },
    Jal { rd: u8, offset: i32 },
    Jalr { rd: u8, rs1: u8, offset: i32 },
    Branch { kind: BranchKind, rs1: u8, rs2: u8, offset: i32 },
    Load { kind: LoadKind, rd: u8, rs1: u8, offset: i32 },
    Store { kind: StoreKind, rs1: u8, rs2: u8, offset: i32 },
    AluImm { kind: AluKind, rd: u8, rs1: u8, imm: i32 },
    Alu { kind: AluKind, rd: u8, rs1: u8, rs2: u8 },
    Csr { kind: CsrKind, rd: u8, src: CsrSource, csr: u16 },
    Fence,
    Ecall,
    Ebreak,
    Mret,
    Wfi,
    Unknown(u32),
}

fn rd(word: u32) -> u8 {
    ((word >> 7) & 0x1F) as u8
}

fn rs1(word: u32) -> u8 {
    ((word >> 15) & 0x1F) as u8
}

fn rs2(word: u32) -> u8 {
    ((word >> 20) & 0x1F) as u8
}

fn funct3(word: u32) -> u32 {
    (word >> 12) & 0x7
}

fn funct7(word: u32) -> u32 {
    word >> 25
}

fn imm_i(word: u32) -> i32 {
    (word as i32) >> 20
}

fn imm_s(word: u32) -> i32 {
    (((word & 0xFE00_0000) as i32) >> 20) | (((word >> 7) & 0x1F) as i32)
}

fn imm_b(word: u32) -> i32 {
    (((word & 0x8000_0000) as i32) >> 19)
        | (((word & 0x80) << 4) as i32)
        | (((word >> 20) & 0x7E0) as i32)
        | (((word >> 7) & 0x1E) as i32)
}

fn imm_u(word: u32) -> u32 {
    word & 0xFFFF_F000
}

fn imm_j(word: u32) -> i32 {
    (((word & 0x8000_0000) as i32) >> 11)
        | ((word & 0xF_F000) as i32)
        | (((word >> 9) & 0x800) as i32)
        | (((word >> 20) & 0x7FE) as i32)
}

pub fn decode(word: u32) -> Op {
    match word & 0x7F {
        0x37 => Op::Lui {
            rd: rd(word),
            imm: imm_u(word),
        },
        0x17 => Op::Auipc {
            rd: rd(word),
            imm: imm_u(word),
        },
        0x6F => Op::Jal {
            rd: rd(word),
            offset: imm_j(word),
        },
        0x67 if funct3(word) == 0 => Op::Jalr {
            rd: rd(word),
            rs1: rs1(word),
            offset: imm_i(word),
        },
        0x63 => {
            let kind = match funct3(word) {
                0 => BranchKind::Eq,
                1 => BranchKind::Ne,
                4 => BranchKind::Lt,
                5 => BranchKind::Ge,
                6 => BranchKind::Ltu,
                7 => BranchKind::Geu,
                _ => return Op::Unknown(word),
            };
            Op::Branch {
                kind,
                rs1: rs1(word),
                rs2: rs2(word),
                offset: imm_b(word),
            }
        }
        0x03 => {
            let kind = match funct3(word) {
                0 => LoadKind::B,
                1 => LoadKind::H,
                2 => LoadKind::W,
                4 => LoadKind::Bu,
                5 => LoadKind::Hu,
                _ => return Op::Unknown(word),
            };
            Op::Load {
                kind,
                rd: rd(word),
                rs1: rs1(word),
                offset: imm_i(word),
            }
        }
        0x23 => {
            let kind = match funct3(word) {
                0 => StoreKind::B,
                1 => StoreKind::H,
                2 => StoreKind::W,
                _ => return Op::Unknown(word),
            };
            Op::Store {
                kind,
                rs1: rs1(word),
                rs2: rs2(word),
                offset: imm_s(word),
            }
        }
        0x13 => {
            let kind = match (funct3(word), funct7(word)) {
                (0, _) => AluKind::Add,
                (1, 0x00) => AluKind::Sll,
                (2, _) => AluKind::Slt,
                (3, _) => AluKind::Sltu,
                (4, _) => AluKind::Xor,
                (5, 0x00) => AluKind::Srl,
                (5, 0x20) => AluKind::Sra,
                (6, _) => AluKind::Or,
                (7, _) => AluKind::And,
                _ => return Op::Unknown(word),
            };
            let imm = match kind {
                // Shift amount lives in the low 5 bits of the I-immediate.
                AluKind::Sll | AluKind::Srl | AluKind::Sra => (imm_i(word)) & 0x1F,
                _ => imm_i(word),
            };
            Op::AluImm {
                kind,
                rd: rd(word),
                rs1: rs1(word),
                imm,
            }
        }
        0x33 => {
            let kind = match (funct3(word), funct7(word)) {
                (0, 0x00) => AluKind::Add,
                (0, 0x20) => AluKind::Sub,
                (1, 0x00) => AluKind::Sll,
                (2, 0x00) => AluKind::Slt,
                (3, 0x00) => AluKind::Sltu,
                (4, 0x00) => AluKind::Xor,
                (5, 0x00) => AluKind::Srl,
                (5, 0x20) => AluKind::Sra,
                (6, 0x00) => AluKind::Or,
                (7, 0x00) => AluKind::And,
                _ => return Op::Unknown(word),
            };
            Op::Alu {
                kind,
                rd: rd(word),
                rs1: rs1(word),
                rs2: rs2(word),
            }
        }
        // FENCE / FENCE.I are no-ops on a single in-order core.
        0x0F => Op::Fence,
        0x73 => {
            let csr = ((word >> 20) & 0xFFF) as u16;
            match funct3(word) {
                0 => match word {
                    0x0000_0073 => Op::Ecall,
                    0x0010_0073 => Op::Ebreak,
                    0x3020_0073 => Op::Mret,
                    0x1050_0073 => Op::Wfi,
                    _ => Op::Unknown(word),
                },
                1 => Op::Csr { kind: CsrKind::Rw, rd: rd(word), src: CsrSource::Reg(rs1(word)), csr },
                2 => Op::Csr { kind: CsrKind::Rs, rd: rd(word), src: CsrSource::Reg(rs1(word)), csr },
                3 => Op::Csr { kind: CsrKind::Rc, rd: rd(word), src: CsrSource::Reg(rs1(word)), csr },
                5 => Op::Csr { kind: CsrKind::Rw, rd: rd(word), src: CsrSource::Imm(rs1(word)), csr },
                6 => Op::Csr { kind: CsrKind::Rs, rd: rd(word), src: CsrSource::Imm(rs1(word)), csr },
                7 => Op::Csr { kind: CsrKind::Rc, rd: rd(word), src: CsrSource::Imm(rs1(word)), csr },
                _ => Op::Unknown(word),
            }
        }
        _ => Op::Unknown(word),
    }
}
