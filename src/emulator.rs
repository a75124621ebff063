use std::io::Stdout;
use std::time::{Duration, Instant};

use anyhow::{Context, bail};
use crossterm::event::{self, Event, KeyCode};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use log::{debug, warn};
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout},
    style::{Color, Style},
    widgets::{Block, Borders, Paragraph},
};

use crate::chip8::Chip8;
use crate::display::{DISPLAY_HEIGHT, DISPLAY_WIDTH, FrameBuffer};
use crate::peripherals::{Audio, Beeper, Input, KeyboardInput, Mute, Renderer};
use crate::state::Settings;

const KEY_MAPPING: &str = "Key Mapping:\n\
    1 2 3 4    →    1 2 3 C\n\
    Q W E R    →    4 5 6 D\n\
    A S D F    →    7 8 9 E\n\
    Z X C V    →    A 0 B F";

/// Draws the frame buffer into the terminal, one block character per pixel.
pub struct TerminalRenderer {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    title: String,
}

impl TerminalRenderer {
    pub fn new(title: String) -> anyhow::Result<Self> {
        enable_raw_mode()?;
        let backend = CrosstermBackend::new(std::io::stdout());
        let mut terminal = Terminal::new(backend)?;
        terminal.clear()?;
        Ok(TerminalRenderer { terminal, title })
    }
}

impl Drop for TerminalRenderer {
    fn drop(&mut self) {
        let _ = self.terminal.clear();
        let _ = self.terminal.show_cursor();
        if let Err(err) = disable_raw_mode() {
            warn!("Unable to restore terminal: {err}");
        }
    }
}

pub fn frame_text(display: &FrameBuffer) -> String {
    let mut row_string = String::with_capacity(DISPLAY_WIDTH * DISPLAY_HEIGHT + DISPLAY_HEIGHT);
    for row_idx in 0..DISPLAY_HEIGHT {
        for col_idx in 0..DISPLAY_WIDTH {
            row_string.push(if display.pixel(col_idx, row_idx) {
                '█'
            } else {
                ' '
            });
        }
        row_string.push('\n');
    }
    row_string
}

impl Renderer for TerminalRenderer {
    fn render(&mut self, display: &FrameBuffer) -> anyhow::Result<()> {
        let title = self.title.as_str();
        let screen = frame_text(display);

        self.terminal.draw(|frame| {
            // Exact size of the 64x32 display plus borders
            let game_width = (DISPLAY_WIDTH as u16) + 2;
            let game_height = (DISPLAY_HEIGHT as u16) + 2;

            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints([
                    Constraint::Length(game_height), // Exact size for game area
                    Constraint::Length(7),           // Key mapping area
                    Constraint::Min(0),              // Remaining space
                ])
                .split(frame.area());

            // Center the game horizontally if the terminal is wider than needed
            let game_area = if chunks[0].width > game_width {
                Layout::default()
                    .direction(Direction::Horizontal)
                    .constraints([
                        Constraint::Min(0),
                        Constraint::Length(game_width),
                        Constraint::Min(0),
                    ])
                    .split(chunks[0])[1]
            } else {
                chunks[0]
            };

            // Draw main game screen
            let game_paragraph = Paragraph::new(screen)
                .block(Block::default().borders(Borders::ALL).title(title))
                .style(Style::default().fg(Color::White));
            frame.render_widget(game_paragraph, game_area);

            // Draw key mapping
            let key_paragraph = Paragraph::new(KEY_MAPPING)
                .alignment(Alignment::Center)
                .block(Block::default().borders(Borders::ALL).title("Keypad"))
                .style(Style::default().fg(Color::Yellow));
            frame.render_widget(key_paragraph, chunks[1]);
        })?;
        Ok(())
    }
}

/// Wall-clock length of one machine cycle at `frame_rate` cycles per second.
pub fn frame_duration(frame_rate: u64) -> anyhow::Result<Duration> {
    if frame_rate == 0 {
        bail!("Frame rate must be at least 1 cycle per second");
    }
    Ok(Duration::from_secs_f64(1.0 / frame_rate as f64))
}

pub struct Emulator {
    chip8: Chip8,
}

impl Emulator {
    pub fn new(settings: Settings) -> Self {
        Emulator {
            chip8: Chip8::new(settings),
        }
    }

    fn open_audio(&self) -> Box<dyn Audio> {
        if self.chip8.settings().mute {
            return Box::new(Mute);
        }
        match Beeper::new() {
            Ok(beeper) => Box::new(beeper),
            Err(err) => {
                warn!("Sound disabled: {err:#}");
                Box::new(Mute)
            }
        }
    }

    /// Consumes pending terminal events so keystrokes are not echoed.
    /// Returns `true` if Esc was among them.
    fn drain_terminal_events() -> anyhow::Result<bool> {
        let mut quit = false;
        while event::poll(Duration::ZERO)? {
            if let Event::Key(key) = event::read()? {
                quit |= key.code == KeyCode::Esc;
            }
        }
        Ok(quit)
    }

    pub fn run(&mut self) -> anyhow::Result<()> {
        let settings = self.chip8.settings();
        let frame_duration = frame_duration(settings.frame_rate)?;
        let rom_stem: String = settings
            .rom
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "Unknown ROM".to_string());

        self.chip8.load_rom_file()?;

        let mut audio = self.open_audio();
        let mut input = KeyboardInput::new()?;
        let mut renderer =
            TerminalRenderer::new(rom_stem).context("Unable to initialise the terminal")?;
        renderer.render(&self.chip8.state().display)?;
        debug!("Running at {:?} per cycle", frame_duration);

        loop {
            let frame_start = Instant::now();

            if Self::drain_terminal_events()? {
                input.request_quit();
            }
            let snapshot = input.poll()?;
            if snapshot.quit {
                break;
            }

            self.chip8.cycle(snapshot.keys, audio.as_mut(), &mut renderer)?;

            let elapsed = frame_start.elapsed();
            if elapsed < frame_duration {
                std::thread::sleep(frame_duration - elapsed);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::WrapMode;

    #[test]
    fn frame_duration_follows_frame_rate() {
        assert_eq!(frame_duration(1).unwrap(), Duration::from_secs(1));
        assert_eq!(frame_duration(50).unwrap(), Duration::from_millis(20));
        assert!(frame_duration(0).is_err());
    }

    #[test]
    fn frame_text_has_one_line_per_row() {
        let mut display = FrameBuffer::new();
        display.draw_sprite(0, 0, &[0x80], WrapMode::Flat);
        display.draw_sprite(63, 31, &[0x80], WrapMode::Flat);

        let text = frame_text(&display);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), DISPLAY_HEIGHT);
        assert!(lines.iter().all(|line| line.chars().count() == DISPLAY_WIDTH));
        assert!(lines[0].starts_with('█'));
        assert!(lines[31].ends_with('█'));
        assert_eq!(text.matches('█').count(), 2);
    }
}
