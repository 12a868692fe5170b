pub mod gpio;
pub mod uart;
