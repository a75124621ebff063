use log::{debug, error, trace};

use crate::error::Chip8Error;
use crate::instruction::{Instruction, decode};
use crate::peripherals::{Audio, Renderer};
use crate::state::{Chip8State, NUM_KEYS, Settings};

/// The interpreter: owns every piece of machine state and advances it one
/// instruction per [`Chip8::cycle`].
pub struct Chip8 {
    state: Chip8State,
}

impl Chip8 {
    pub fn new(settings: Settings) -> Self {
        Chip8 {
            state: Chip8State::new(settings),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.state.settings
    }

    pub fn state(&self) -> &Chip8State {
        &self.state
    }

    pub fn load_rom(&mut self, rom: &[u8]) -> Result<(), Chip8Error> {
        self.state.memory.load_rom(rom)?;
        debug!("Loaded {} byte ROM", rom.len());
        Ok(())
    }

    /// Reads the ROM named in the settings and loads it at the program start.
    pub fn load_rom_file(&mut self) -> Result<(), Chip8Error> {
        let path = self.state.settings.rom.clone();
        let rom = std::fs::read(&path).map_err(|source| Chip8Error::RomRead { path, source })?;
        self.load_rom(&rom)
    }

    fn fetch_instruction(&mut self) -> Instruction {
        let raw = self.state.memory.read_word(self.state.pc);
        trace!("{:#05X}: {raw:#06X}", self.state.pc);

        // Move the program counter to next instruction
        self.state.skip();

        decode(raw)
    }

    /// Fetches and executes exactly one instruction.
    pub fn step(&mut self) -> Result<(), Chip8Error> {
        let instruction = self.fetch_instruction();
        trace!("{instruction:?}");
        instruction.execute(&mut self.state).inspect_err(|err| {
            error!("Halting at {:#05X}: {err}", self.state.pc);
        })
    }

    /// Runs one full machine cycle: latch the keypad snapshot, execute one
    /// instruction, tick the timers and hand a changed frame to the renderer.
    pub fn cycle(
        &mut self,
        keys: [bool; NUM_KEYS],
        audio: &mut dyn Audio,
        renderer: &mut dyn Renderer,
    ) -> anyhow::Result<()> {
        self.state.keypad.update(keys);
        self.step()?;

        if self.state.timers.tick() {
            audio.beep()?;
        }

        if self.state.display.take_dirty() {
            renderer.render(&self.state.display)?;
        }
        Ok(())
    }
}
