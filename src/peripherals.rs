//! The outside world as seen by the interpreter: a keypad snapshot coming in,
//! frames and beeps going out.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::Context;
use log::{debug, error};
use rdev::{EventType, Key as PhysicalKey};
use rodio::{OutputStream, Sink, Source, source::SineWave};

use crate::display::FrameBuffer;
use crate::state::NUM_KEYS;

const DEFAULT_FREQUENCY: f32 = 440.0;
const BEEP_DURATION: Duration = Duration::from_millis(120);
const BEEP_VOLUME: f32 = 0.25;

pub struct InputSnapshot {
    pub keys: [bool; NUM_KEYS],
    pub quit: bool,
}

pub trait Input {
    fn poll(&mut self) -> anyhow::Result<InputSnapshot>;
}

pub trait Audio {
    /// Emits one short tone.
    fn beep(&mut self) -> anyhow::Result<()>;
}

pub trait Renderer {
    fn render(&mut self, display: &FrameBuffer) -> anyhow::Result<()>;
}

/// Maps the left-hand block of a QWERTY keyboard onto the hex keypad:
///
/// ```text
/// 1 2 3 4        1 2 3 C
/// Q W E R   ->   4 5 6 D
/// A S D F        7 8 9 E
/// Z X C V        A 0 B F
/// ```
pub fn map_key(key: PhysicalKey) -> Option<u8> {
    let logical = match key {
        PhysicalKey::Num1 => 0x1,
        PhysicalKey::Num2 => 0x2,
        PhysicalKey::Num3 => 0x3,
        PhysicalKey::Num4 => 0xC,
        PhysicalKey::KeyQ => 0x4,
        PhysicalKey::KeyW => 0x5,
        PhysicalKey::KeyE => 0x6,
        PhysicalKey::KeyR => 0xD,
        PhysicalKey::KeyA => 0x7,
        PhysicalKey::KeyS => 0x8,
        PhysicalKey::KeyD => 0x9,
        PhysicalKey::KeyF => 0xE,
        PhysicalKey::KeyZ => 0xA,
        PhysicalKey::KeyX => 0x0,
        PhysicalKey::KeyC => 0xB,
        PhysicalKey::KeyV => 0xF,
        _ => return None,
    };
    Some(logical)
}

#[derive(Default)]
struct KeyState {
    keys: [AtomicBool; NUM_KEYS],
    quit: AtomicBool,
}

impl KeyState {
    fn apply(&self, event: &EventType) {
        let (key, pressed) = match *event {
            EventType::KeyPress(key) => (key, true),
            EventType::KeyRelease(key) => (key, false),
            _ => return,
        };
        if key == PhysicalKey::Escape && pressed {
            self.quit.store(true, Ordering::Relaxed);
        } else if let Some(logical) = map_key(key) {
            self.keys[usize::from(logical)].store(pressed, Ordering::Relaxed);
        }
    }

    fn snapshot(&self) -> InputSnapshot {
        InputSnapshot {
            keys: std::array::from_fn(|i| self.keys[i].load(Ordering::Relaxed)),
            quit: self.quit.load(Ordering::Relaxed),
        }
    }
}

/// Tracks held keys through a global keyboard hook running on its own thread.
pub struct KeyboardInput {
    state: Arc<KeyState>,
}

impl KeyboardInput {
    pub fn new() -> anyhow::Result<Self> {
        let state = Arc::new(KeyState::default());
        let listener_state = Arc::clone(&state);

        std::thread::Builder::new()
            .name("keyboard".into())
            .spawn(move || {
                let result = rdev::listen(move |event| listener_state.apply(&event.event_type));
                if let Err(err) = result {
                    error!("Keyboard listener stopped: {err:?}");
                }
            })
            .context("Unable to spawn keyboard listener")?;
        debug!("Keyboard listener started");

        Ok(KeyboardInput { state })
    }

    pub fn request_quit(&self) {
        self.state.quit.store(true, Ordering::Relaxed);
    }
}

impl Input for KeyboardInput {
    fn poll(&mut self) -> anyhow::Result<InputSnapshot> {
        Ok(self.state.snapshot())
    }
}

pub struct Beeper {
    sink: Sink,
    _stream: OutputStream,
    freq: f32,
}

impl Beeper {
    pub fn new() -> anyhow::Result<Self> {
        let (stream, stream_handle) =
            OutputStream::try_default().context("No audio output device")?;
        let sink = Sink::try_new(&stream_handle)?;
        debug!("Audio output opened");

        Ok(Self {
            sink,
            _stream: stream,
            freq: DEFAULT_FREQUENCY,
        })
    }
}

impl Audio for Beeper {
    fn beep(&mut self) -> anyhow::Result<()> {
        let tone = SineWave::new(self.freq)
            .take_duration(BEEP_DURATION)
            .amplify(BEEP_VOLUME);
        self.sink.append(tone);
        Ok(())
    }
}

pub struct Mute;

impl Audio for Mute {
    fn beep(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}
