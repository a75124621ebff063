use std::path::PathBuf;

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use octet::display::WrapMode;
use octet::emulator::Emulator;
use octet::state::{DEFAULT_FRAME_RATE, Settings};

/// Run a CHIP-8 program in the terminal.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Path to the ROM image
    rom: PathBuf,

    /// Machine cycles per second
    #[arg(
        long,
        default_value_t = DEFAULT_FRAME_RATE,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    frame_rate: u64,

    /// How sprites that leave the screen wrap around
    #[arg(long, value_enum, default_value_t = WrapMode::Flat)]
    wrap: WrapMode,

    /// Seed for the random number instruction
    #[arg(long)]
    seed: Option<u64>,

    /// Disable the sound timer tone
    #[arg(long)]
    mute: bool,
}

impl From<Cli> for Settings {
    fn from(cli: Cli) -> Self {
        Settings {
            rom: cli.rom,
            frame_rate: cli.frame_rate,
            wrap: cli.wrap,
            seed: cli.seed,
            mute: cli.mute,
        }
    }
}

/// Parses the command line. A missing or extra ROM path yields `None` so the
/// caller can print the usage line and exit cleanly.
fn parse_cli<I, T>(args: I) -> Option<Cli>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    match Cli::try_parse_from(args) {
        Ok(cli) => Some(cli),
        Err(err) => match err.kind() {
            ErrorKind::MissingRequiredArgument | ErrorKind::UnknownArgument => None,
            _ => err.exit(),
        },
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let Some(cli) = parse_cli(std::env::args_os()) else {
        println!("{}", Cli::command().render_usage());
        return Ok(());
    };

    let mut emulator = Emulator::new(cli.into());
    emulator.run()?;

    Ok(())
}
