use std::path::PathBuf;

use thiserror::Error;

use crate::state::Address;

#[derive(Error, Debug)]
pub enum Chip8Error {
    #[error("Stack overflow: more than 16 nested calls (return address {pc:#05X})")]
    StackOverflow { pc: Address },
    #[error("Stack underflow: return with an empty call stack (pc {pc:#05X})")]
    StackUnderflow { pc: Address },
    #[error("ROM too large to fit in memory: {len} bytes (max {max})")]
    RomTooLarge { len: usize, max: usize },
    #[error("Unable to read ROM {}", path.display())]
    RomRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
