use std::path::PathBuf;

use log::warn;
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::display::{FrameBuffer, WrapMode};
use crate::error::Chip8Error;

pub type Timer = u8;
pub type Address = usize;

pub const MEM_SIZE: usize = 4096;
pub const ADDR_MASK: Address = 0x0FFF;
pub const FONT_ADDR: Address = 0x000;
pub const FONT_HEIGHT: usize = 5;
pub const PC_START_ADDR: Address = 0x200;
pub const NUM_REGISTERS: usize = 16;
pub const NUM_KEYS: usize = 16;
pub const STACK_DEPTH: usize = 16;
pub const DEFAULT_FRAME_RATE: u64 = 60;

const FONT_DATA: [u8; 16 * FONT_HEIGHT] = [
    0xF0, 0x90, 0x90, 0x90, 0xF0, // 0
    0x20, 0x60, 0x20, 0x20, 0x70, // 1
    0xF0, 0x10, 0xF0, 0x80, 0xF0, // 2
    0xF0, 0x10, 0xF0, 0x10, 0xF0, // 3
    0x90, 0x90, 0xF0, 0x10, 0x10, // 4
    0xF0, 0x80, 0xF0, 0x10, 0xF0, // 5
    0xF0, 0x80, 0xF0, 0x90, 0xF0, // 6
    0xF0, 0x10, 0x20, 0x40, 0x40, // 7
    0xF0, 0x90, 0xF0, 0x90, 0xF0, // 8
    0xF0, 0x90, 0xF0, 0x10, 0xF0, // 9
    0xF0, 0x90, 0xF0, 0x90, 0x90, // A
    0xE0, 0x90, 0xE0, 0x90, 0xE0, // B
    0xF0, 0x80, 0x80, 0x80, 0xF0, // C
    0xE0, 0x90, 0x90, 0x90, 0xE0, // D
    0xF0, 0x80, 0xF0, 0x80, 0xF0, // E
    0xF0, 0x80, 0xF0, 0x80, 0x80, // F
];
const FONT_END: Address = FONT_ADDR + FONT_DATA.len();

/// Flat 4 KiB address space. Every address is wrapped into `0x000..=0xFFF`
/// before use, and the glyph font at the bottom is read-only.
pub struct Memory {
    data: [u8; MEM_SIZE],
}
impl Memory {
    pub fn new() -> Self {
        let data = {
            let mut data = [0; MEM_SIZE];
            data[FONT_ADDR..FONT_END].copy_from_slice(&FONT_DATA);
            data
        };

        Memory { data }
    }

    pub fn read(&self, addr: Address) -> u8 {
        self.data[addr & ADDR_MASK]
    }

    pub fn write(&mut self, addr: Address, value: u8) {
        let addr = addr & ADDR_MASK;
        if (FONT_ADDR..FONT_END).contains(&addr) {
            warn!("Dropped write of {value:#04X} into font region at {addr:#05X}");
            return;
        }
        self.data[addr] = value;
    }

    /// Reads the big-endian instruction word at `addr`.
    pub fn read_word(&self, addr: Address) -> u16 {
        u16::from_be_bytes([self.read(addr), self.read(addr + 1)])
    }

    pub fn load_rom(&mut self, rom: &[u8]) -> Result<(), Chip8Error> {
        let max = MEM_SIZE - PC_START_ADDR;
        if rom.len() > max {
            return Err(Chip8Error::RomTooLarge {
                len: rom.len(),
                max,
            });
        }
        self.data[PC_START_ADDR..PC_START_ADDR + rom.len()].copy_from_slice(rom);
        Ok(())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Register {
    V0,
    V1,
    V2,
    V3,
    V4,
    V5,
    V6,
    V7,
    V8,
    V9,
    VA,
    VB,
    VC,
    VD,
    VE,
    VF,
}
impl Register {
    const ALL: [Register; NUM_REGISTERS] = [
        Register::V0,
        Register::V1,
        Register::V2,
        Register::V3,
        Register::V4,
        Register::V5,
        Register::V6,
        Register::V7,
        Register::V8,
        Register::V9,
        Register::VA,
        Register::VB,
        Register::VC,
        Register::VD,
        Register::VE,
        Register::VF,
    ];

    /// Selects a register from the low nibble of `value`.
    pub fn from_nibble(value: u8) -> Self {
        Self::ALL[usize::from(value & 0x0F)]
    }

    /// `V0` up to and including `self`.
    pub fn up_to(self) -> impl Iterator<Item = Register> {
        Self::ALL.into_iter().take(self as usize + 1)
    }
}

pub struct RegisterBank {
    registers: [u8; NUM_REGISTERS],
}
impl RegisterBank {
    pub fn new() -> Self {
        RegisterBank {
            registers: [0; NUM_REGISTERS],
        }
    }

    pub fn read(&self, reg: Register) -> u8 {
        self.registers[reg as usize]
    }

    pub fn write(&mut self, reg: Register, value: u8) {
        self.registers[reg as usize] = value;
    }

    pub fn set_flag(&mut self, set: bool) {
        self.write(Register::VF, u8::from(set));
    }
}

pub struct CallStack {
    frames: Vec<Address>,
}
impl CallStack {
    pub fn new() -> Self {
        CallStack {
            frames: Vec::with_capacity(STACK_DEPTH),
        }
    }

    /// Number of live return addresses.
    pub fn pointer(&self) -> usize {
        self.frames.len()
    }

    pub fn push(&mut self, return_addr: Address) -> Result<(), Chip8Error> {
        if self.frames.len() == STACK_DEPTH {
            return Err(Chip8Error::StackOverflow { pc: return_addr });
        }
        self.frames.push(return_addr);
        Ok(())
    }

    pub fn pop(&mut self, pc: Address) -> Result<Address, Chip8Error> {
        self.frames.pop().ok_or(Chip8Error::StackUnderflow { pc })
    }
}

/// Snapshot of the 16 logical keys, replaced wholesale every cycle.
pub struct Keypad {
    keys: [bool; NUM_KEYS],
}
impl Keypad {
    pub fn new() -> Self {
        Keypad {
            keys: [false; NUM_KEYS],
        }
    }

    pub fn update(&mut self, keys: [bool; NUM_KEYS]) {
        self.keys = keys;
    }

    /// Keys outside `0x0..=0xF` are never pressed.
    pub fn is_key_pressed(&self, key: u8) -> bool {
        self.keys.get(usize::from(key)).copied().unwrap_or(false)
    }

    /// Lowest-numbered key currently held.
    pub fn first_pressed(&self) -> Option<u8> {
        (0..NUM_KEYS as u8).find(|&key| self.is_key_pressed(key))
    }
}

pub struct Timers {
    pub delay: Timer,
    pub sound: Timer,
}
impl Timers {
    pub fn new() -> Self {
        Timers { delay: 0, sound: 0 }
    }

    /// Decrements both counters towards zero. Returns `true` when the sound
    /// counter reached zero during this tick.
    pub fn tick(&mut self) -> bool {
        self.delay = self.delay.saturating_sub(1);
        if self.sound > 0 {
            self.sound -= 1;
            return self.sound == 0;
        }
        false
    }
}

pub struct Settings {
    pub rom: PathBuf,
    pub frame_rate: u64,
    pub wrap: WrapMode,
    pub seed: Option<u64>,
    pub mute: bool,
}
impl Settings {
    pub fn new(rom: impl Into<PathBuf>) -> Self {
        Settings {
            rom: rom.into(),
            frame_rate: DEFAULT_FRAME_RATE,
            wrap: WrapMode::default(),
            seed: None,
            mute: false,
        }
    }
}

pub struct Chip8State {
    pub settings: Settings,
    pub memory: Memory,
    pub registers: RegisterBank,
    pub pc: Address,
    pub index: Address,
    pub stack: CallStack,
    pub timers: Timers,
    pub display: FrameBuffer,
    pub keypad: Keypad,
    pub rng: StdRng,
}
impl Chip8State {
    pub fn new(settings: Settings) -> Self {
        let rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Chip8State {
            settings,
            memory: Memory::new(),
            registers: RegisterBank::new(),
            pc: PC_START_ADDR,
            index: 0,
            stack: CallStack::new(),
            timers: Timers::new(),
            display: FrameBuffer::new(),
            keypad: Keypad::new(),
            rng,
        }
    }

    pub fn jump(&mut self, addr: Address) {
        self.pc = addr & ADDR_MASK;
    }

    pub fn skip(&mut self) {
        self.jump(self.pc + 2);
    }

    pub fn set_index(&mut self, addr: Address) {
        self.index = addr & ADDR_MASK;
    }

    /// Composites the `rows`-high sprite at the index register onto the
    /// display and records the collision in `VF`. The coordinates are read
    /// after `VF` is cleared, so a `VF` coordinate is always 0.
    pub fn draw_sprite(&mut self, x: Register, y: Register, rows: u8) {
        self.registers.set_flag(false);
        let (x, y) = (self.registers.read(x), self.registers.read(y));
        let sprite: Vec<u8> = (0..usize::from(rows))
            .map(|row| self.memory.read(self.index + row))
            .collect();
        let collision = self.display.draw_sprite(
            usize::from(x),
            usize::from(y),
            &sprite,
            self.settings.wrap,
        );
        self.registers.set_flag(collision);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn font_is_preloaded_at_bottom_of_memory() {
        let memory = Memory::new();
        assert_eq!(memory.read(0x000), 0xF0);
        assert_eq!(memory.read(0x005), 0x20);
        // Glyph A starts at 10 * 5.
        assert_eq!(memory.read(50), 0xF0);
        assert_eq!(memory.read(54), 0x90);
        assert_eq!(memory.read(0x04F), 0x80);
        assert_eq!(memory.read(0x050), 0x00);
    }

    #[test]
    fn font_region_is_read_only() {
        let mut memory = Memory::new();
        memory.write(0x000, 0x12);
        memory.write(0x04F, 0x34);
        assert_eq!(memory.read(0x000), 0xF0);
        assert_eq!(memory.read(0x04F), 0x80);

        memory.write(0x050, 0x56);
        assert_eq!(memory.read(0x050), 0x56);
    }

    #[test]
    fn addresses_wrap_into_twelve_bits() {
        let mut memory = Memory::new();
        memory.write(0x1300, 0xAB);
        assert_eq!(memory.read(0x300), 0xAB);
        assert_eq!(memory.read(0xF300), 0xAB);
    }

    #[test]
    fn read_word_is_big_endian() {
        let mut memory = Memory::new();
        memory.load_rom(&[0x12, 0x34]).unwrap();
        assert_eq!(memory.read_word(PC_START_ADDR), 0x1234);
    }

    #[test]
    fn load_rom_rejects_oversized_images() {
        let mut memory = Memory::new();
        let rom = vec![0xAA; MEM_SIZE - PC_START_ADDR + 1];
        let err = memory.load_rom(&rom).unwrap_err();
        assert!(matches!(
            err,
            Chip8Error::RomTooLarge { len, max } if len == 0xE01 && max == 0xE00
        ));

        let rom = vec![0xAA; MEM_SIZE - PC_START_ADDR];
        assert!(memory.load_rom(&rom).is_ok());
        assert_eq!(memory.read(0xFFF), 0xAA);
    }

    #[test]
    fn call_stack_holds_sixteen_frames() {
        let mut stack = CallStack::new();
        for i in 0..STACK_DEPTH {
            stack.push(0x200 + i * 2).unwrap();
        }
        assert_eq!(stack.pointer(), STACK_DEPTH);
        assert!(matches!(
            stack.push(0x300),
            Err(Chip8Error::StackOverflow { pc: 0x300 })
        ));
        assert_eq!(stack.pop(0x400).unwrap(), 0x21E);
        assert_eq!(stack.pointer(), STACK_DEPTH - 1);
    }

    #[test]
    fn empty_call_stack_underflows() {
        let mut stack = CallStack::new();
        assert!(matches!(
            stack.pop(0x202),
            Err(Chip8Error::StackUnderflow { pc: 0x202 })
        ));
    }

    #[test]
    fn keypad_reports_first_pressed_key() {
        let mut keypad = Keypad::new();
        assert_eq!(keypad.first_pressed(), None);

        let mut keys = [false; NUM_KEYS];
        keys[0xB] = true;
        keys[0x3] = true;
        keypad.update(keys);
        assert_eq!(keypad.first_pressed(), Some(0x3));
        assert!(keypad.is_key_pressed(0xB));
        assert!(!keypad.is_key_pressed(0x4));
        assert!(!keypad.is_key_pressed(0x13));

        keypad.update([false; NUM_KEYS]);
        assert_eq!(keypad.first_pressed(), None);
    }

    #[test]
    fn timers_never_go_below_zero() {
        let mut timers = Timers::new();
        timers.delay = 2;
        assert!(!timers.tick());
        assert!(!timers.tick());
        assert!(!timers.tick());
        assert_eq!(timers.delay, 0);
        assert_eq!(timers.sound, 0);
    }

    #[test]
    fn sound_timer_signals_once_on_reaching_zero() {
        let mut timers = Timers::new();
        timers.sound = 2;
        assert!(!timers.tick());
        assert!(timers.tick());
        assert!(!timers.tick());
        assert_eq!(timers.sound, 0);
    }

    #[test]
    fn register_range_is_inclusive() {
        let regs: Vec<Register> = Register::V2.up_to().collect();
        assert_eq!(regs, vec![Register::V0, Register::V1, Register::V2]);
        assert_eq!(Register::VF.up_to().count(), NUM_REGISTERS);
        assert_eq!(Register::from_nibble(0x1A), Register::VA);
    }
}
