mod rv32i;

pub use rv32i::RiscV;
