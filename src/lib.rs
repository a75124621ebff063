pub mod chip8;
pub mod display;
pub mod emulator;
pub mod error;
pub mod instruction;
pub mod peripherals;
pub mod state;
