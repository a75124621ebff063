use rand::Rng;

use crate::error::Chip8Error;
use crate::state::{Address, Chip8State, FONT_ADDR, FONT_HEIGHT, Register};

/// One decoded instruction word. Each variant is a single opcode family or
/// sub-family; anything the decoder does not recognize becomes `Unknown`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Instruction {
    ClearScreen,
    SubroutineReturn,
    Jump(Address),
    SubroutineCall(Address),
    SkipEqImmediate(Register, u8),
    SkipNeqImmediate(Register, u8),
    SkipEqRegister(Register, Register),
    SkipNeqRegister(Register, Register),
    SetImmediate(Register, u8),
    AddImmediate(Register, u8),
    SetXToY(Register, Register),
    BinaryOr(Register, Register),
    BinaryAnd(Register, Register),
    LogicalXor(Register, Register),
    BinaryAdd(Register, Register),
    SubtractYFromX(Register, Register),
    RightShift(Register),
    SubtractXFromY(Register, Register),
    LeftShift(Register),
    SetIndex(Address),
    JumpWithOffset(Address),
    Random(Register, u8),
    Draw(Register, Register, u8),
    SkipIfKeyPressed(Register),
    SkipIfKeyNotPressed(Register),
    SetVxFromTimer(Register),
    WaitForKey(Register),
    SetDelayTimer(Register),
    SetSoundTimer(Register),
    AddToIndex(Register),
    FontChar(Register),
    BinaryCodedDecimal(Register),
    Store(Register),
    Load(Register),
    Unknown(u16),
}

struct DecodedInstruction {
    /// First nibble. Represents the operation code.
    opcode: u8,
    /// Second nibble. Used to look up one of the 16 registers.
    x: Register,
    /// Third nibble. Used to look up one of the 16 registers.
    y: Register,
    /// Fourth nibble. A 4-bit number.
    n: u8,
    /// The second byte (third and fourth nibbles). An 8-bit immediate number.
    nn: u8,
    /// The second, third, and fourth nibbles. A 12-bit immediate address.
    nnn: Address,
}
impl DecodedInstruction {
    fn new(raw: u16) -> Self {
        DecodedInstruction {
            opcode: (raw >> 12) as u8,
            x: Register::from_nibble((raw >> 8) as u8),
            y: Register::from_nibble((raw >> 4) as u8),
            n: (raw & 0x0F) as u8,
            nn: (raw & 0x00FF) as u8,
            nnn: (raw & 0x0FFF) as Address,
        }
    }
}

pub fn decode(raw: u16) -> Instruction {
    use Instruction::*;

    let DecodedInstruction {
        opcode,
        x,
        y,
        n,
        nn,
        nnn,
    } = DecodedInstruction::new(raw);

    match (opcode, n) {
        (0x0, _) => match nnn {
            0x0E0 => ClearScreen,
            0x0EE => SubroutineReturn,
            _ => Unknown(raw),
        },
        (0x1, _) => Jump(nnn),
        (0x2, _) => SubroutineCall(nnn),
        (0x3, _) => SkipEqImmediate(x, nn),
        (0x4, _) => SkipNeqImmediate(x, nn),
        (0x5, 0x0) => SkipEqRegister(x, y),
        (0x6, _) => SetImmediate(x, nn),
        (0x7, _) => AddImmediate(x, nn),
        (0x8, 0x0) => SetXToY(x, y),
        (0x8, 0x1) => BinaryOr(x, y),
        (0x8, 0x2) => BinaryAnd(x, y),
        (0x8, 0x3) => LogicalXor(x, y),
        (0x8, 0x4) => BinaryAdd(x, y),
        (0x8, 0x5) => SubtractYFromX(x, y),
        (0x8, 0x6) => RightShift(x),
        (0x8, 0x7) => SubtractXFromY(x, y),
        (0x8, 0xE) => LeftShift(x),
        (0x9, 0x0) => SkipNeqRegister(x, y),
        (0xA, _) => SetIndex(nnn),
        (0xB, _) => JumpWithOffset(nnn),
        (0xC, _) => Random(x, nn),
        (0xD, _) => Draw(x, y, n),
        (0xE, _) => match nn {
            0x9E => SkipIfKeyPressed(x),
            0xA1 => SkipIfKeyNotPressed(x),
            _ => Unknown(raw),
        },
        (0xF, _) => match nn {
            0x07 => SetVxFromTimer(x),
            0x0A => WaitForKey(x),
            0x15 => SetDelayTimer(x),
            0x18 => SetSoundTimer(x),
            0x1E => AddToIndex(x),
            0x29 => FontChar(x),
            0x33 => BinaryCodedDecimal(x),
            0x55 => Store(x),
            0x65 => Load(x),
            _ => Unknown(raw),
        },
        _ => Unknown(raw),
    }
}

impl Instruction {
    /// Applies the instruction to `state`. The program counter has already
    /// been moved past this instruction.
    pub fn execute(&self, state: &mut Chip8State) -> Result<(), Chip8Error> {
        use Instruction::*;

        let regs = &mut state.registers;
        match *self {
            ClearScreen => state.display.clear(),
            SubroutineReturn => {
                let return_addr = state.stack.pop(state.pc)?;
                state.jump(return_addr);
            }
            Jump(addr) => state.jump(addr),
            SubroutineCall(addr) => {
                state.stack.push(state.pc)?;
                state.jump(addr);
            }
            SkipEqImmediate(x, nn) => {
                if regs.read(x) == nn {
                    state.skip();
                }
            }
            SkipNeqImmediate(x, nn) => {
                if regs.read(x) != nn {
                    state.skip();
                }
            }
            SkipEqRegister(x, y) => {
                if regs.read(x) == regs.read(y) {
                    state.skip();
                }
            }
            SkipNeqRegister(x, y) => {
                if regs.read(x) != regs.read(y) {
                    state.skip();
                }
            }
            SetImmediate(x, nn) => regs.write(x, nn),
            AddImmediate(x, nn) => regs.write(x, regs.read(x).wrapping_add(nn)),
            SetXToY(x, y) => regs.write(x, regs.read(y)),
            BinaryOr(x, y) => regs.write(x, regs.read(x) | regs.read(y)),
            BinaryAnd(x, y) => regs.write(x, regs.read(x) & regs.read(y)),
            LogicalXor(x, y) => regs.write(x, regs.read(x) ^ regs.read(y)),
            BinaryAdd(x, y) => {
                let (sum, carry) = regs.read(x).overflowing_add(regs.read(y));
                regs.write(x, sum);
                regs.set_flag(carry);
            }
            SubtractYFromX(x, y) => {
                let (value_x, value_y) = (regs.read(x), regs.read(y));
                regs.write(x, value_x.wrapping_sub(value_y));
                regs.set_flag(value_x >= value_y); // No borrow
            }
            SubtractXFromY(x, y) => {
                let (value_x, value_y) = (regs.read(x), regs.read(y));
                regs.write(x, value_y.wrapping_sub(value_x));
                regs.set_flag(value_y >= value_x); // No borrow
            }
            RightShift(x) => {
                let value_x = regs.read(x);
                regs.write(x, value_x >> 1);
                regs.set_flag(value_x & 0x01 == 0x01);
            }
            LeftShift(x) => {
                let value_x = regs.read(x);
                regs.write(x, value_x << 1);
                regs.set_flag(value_x & 0x80 == 0x80);
            }
            SetIndex(addr) => state.set_index(addr),
            JumpWithOffset(addr) => {
                let offset = Address::from(regs.read(Register::V0));
                state.jump(addr + offset);
            }
            Random(x, nn) => {
                let random_value = state.rng.random::<u8>() & nn;
                regs.write(x, random_value);
            }
            Draw(x, y, n) => state.draw_sprite(x, y, n),
            SkipIfKeyPressed(x) => {
                if state.keypad.is_key_pressed(regs.read(x)) {
                    state.skip();
                }
            }
            SkipIfKeyNotPressed(x) => {
                if !state.keypad.is_key_pressed(regs.read(x)) {
                    state.skip();
                }
            }
            SetVxFromTimer(x) => regs.write(x, state.timers.delay),
            WaitForKey(x) => match state.keypad.first_pressed() {
                Some(key) => regs.write(x, key),
                // Refetch this same instruction next cycle.
                None => state.jump(state.pc.wrapping_sub(2)),
            },
            SetDelayTimer(x) => state.timers.delay = regs.read(x),
            SetSoundTimer(x) => state.timers.sound = regs.read(x),
            AddToIndex(x) => {
                let value_x = Address::from(regs.read(x));
                state.set_index(state.index + value_x);
            }
            FontChar(x) => {
                let glyph = Address::from(regs.read(x));
                state.set_index(FONT_ADDR + glyph * FONT_HEIGHT);
            }
            BinaryCodedDecimal(x) => {
                let value_x = regs.read(x);
                let bcd = [value_x / 100, (value_x / 10) % 10, value_x % 10];
                for (i, digit) in bcd.into_iter().enumerate() {
                    state.memory.write(state.index + i, digit);
                }
            }
            Store(x) => {
                for (i, reg) in x.up_to().enumerate() {
                    state.memory.write(state.index + i, regs.read(reg));
                }
                state.set_index(state.index + x as usize + 1);
            }
            Load(x) => {
                for (i, reg) in x.up_to().enumerate() {
                    regs.write(reg, state.memory.read(state.index + i));
                }
                state.set_index(state.index + x as usize + 1);
            }
            Unknown(raw) => log::warn!("Ignoring unrecognized opcode {raw:#06X}"),
        }
        Ok(())
    }
}
