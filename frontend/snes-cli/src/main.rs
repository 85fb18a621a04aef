use anyhow::Context;
use clap::{Parser, ValueEnum};
use env_logger::Env;
use snes_common::frontend::TimingMode;
use snes_config::{CpuVersion, SnesConfig};
use snes_core::input::SnesJoypadState;
use snes_core::{JoypadPort, Snes};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const SNES_OPTIONS_HEADING: &str = "SNES Options";
const INPUT_OPTIONS_HEADING: &str = "Input Options";
const STATE_OPTIONS_HEADING: &str = "Save State Options";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Button {
    Up,
    Left,
    Right,
    Down,
    A,
    B,
    X,
    Y,
    L,
    R,
    Start,
    Select,
}

fn joypad_state(buttons: &[Button]) -> SnesJoypadState {
    let mut state = SnesJoypadState::default();
    for button in buttons {
        let field = match button {
            Button::Up => &mut state.up,
            Button::Left => &mut state.left,
            Button::Right => &mut state.right,
            Button::Down => &mut state.down,
            Button::A => &mut state.a,
            Button::B => &mut state.b,
            Button::X => &mut state.x,
            Button::Y => &mut state.y,
            Button::L => &mut state.l,
            Button::R => &mut state.r,
            Button::Start => &mut state.start,
            Button::Select => &mut state.select,
        };
        *field = true;
    }
    state
}

/// Headless SNES runner: load a ROM, run a number of frames, and optionally load or save state
#[derive(Parser)]
struct Args {
    /// ROM file path
    #[arg(short = 'f', long)]
    file_path: PathBuf,

    /// Number of frames to run
    #[arg(short = 'n', long, default_value_t = 60)]
    frames: u64,

    /// SRAM file path; defaults to the ROM path with an .srm extension
    #[arg(long)]
    sram_path: Option<PathBuf>,

    /// Force timing mode (Ntsc / Pal)
    #[arg(long, help_heading = SNES_OPTIONS_HEADING)]
    forced_timing_mode: Option<TimingMode>,

    /// 5A22 CPU revision
    #[arg(long, default_value = "two", help_heading = SNES_OPTIONS_HEADING)]
    cpu_version: CpuVersion,

    /// 5C77 PPU1 version reported in $213E
    #[arg(long, default_value_t = 1, help_heading = SNES_OPTIONS_HEADING)]
    ppu1_version: u8,

    /// 5C78 PPU2 version reported in $213F
    #[arg(long, default_value_t = 3, help_heading = SNES_OPTIONS_HEADING)]
    ppu2_version: u8,

    /// Fixed S-RTC start time in seconds since the Unix epoch; defaults to the host clock
    #[arg(long, help_heading = SNES_OPTIONS_HEADING)]
    rtc_epoch: Option<i64>,

    /// Power on with the 239-line display mode selected
    #[arg(long, default_value_t, help_heading = SNES_OPTIONS_HEADING)]
    overscan: bool,

    /// Buttons held on controller 1 for the whole run, comma-separated
    #[arg(long, value_delimiter = ',', help_heading = INPUT_OPTIONS_HEADING)]
    p1_buttons: Vec<Button>,

    /// Buttons held on controller 2 for the whole run, comma-separated
    #[arg(long, value_delimiter = ',', help_heading = INPUT_OPTIONS_HEADING)]
    p2_buttons: Vec<Button>,

    /// Load this state file before running
    #[arg(long, help_heading = STATE_OPTIONS_HEADING)]
    load_state: Option<PathBuf>,

    /// Write a state file after running
    #[arg(long, help_heading = STATE_OPTIONS_HEADING)]
    save_state: Option<PathBuf>,
}

impl Args {
    fn snes_config(&self) -> SnesConfig {
        SnesConfig {
            forced_timing_mode: self.forced_timing_mode,
            cpu_version: self.cpu_version,
            ppu1_version: self.ppu1_version,
            ppu2_version: self.ppu2_version,
            rtc_epoch: self.rtc_epoch,
            overscan: self.overscan,
        }
    }

    fn sram_path(&self) -> PathBuf {
        self.sram_path.clone().unwrap_or_else(|| self.file_path.with_extension("srm"))
    }
}

fn read_sram(path: &Path) -> anyhow::Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(sram) => {
            log::info!("Loaded {} bytes of SRAM from '{}'", sram.len(), path.display());
            Ok(Some(sram))
        }
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err).with_context(|| format!("reading SRAM from '{}'", path.display())),
    }
}

fn load_state(snes: &mut Snes, path: &Path) -> anyhow::Result<()> {
    let compressed =
        fs::read(path).with_context(|| format!("reading state file '{}'", path.display()))?;
    let bytes = zstd::stream::decode_all(compressed.as_slice())
        .with_context(|| format!("decompressing state file '{}'", path.display()))?;
    snes.load_state(&bytes)?;

    log::info!("Loaded state from '{}'", path.display());

    Ok(())
}

fn save_state(snes: &mut Snes, path: &Path) -> anyhow::Result<()> {
    let bytes = snes.save_state()?;
    let compressed = zstd::stream::encode_all(bytes.as_slice(), 0)?;
    fs::write(path, &compressed)
        .with_context(|| format!("writing state file '{}'", path.display()))?;

    log::info!(
        "Saved state to '{}' ({} bytes, {} compressed)",
        path.display(),
        bytes.len(),
        compressed.len()
    );

    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let config = args.snes_config();
    log::info!("Running with config:\n{config}");

    let rom = fs::read(&args.file_path)
        .with_context(|| format!("reading ROM from '{}'", args.file_path.display()))?;
    let sram_path = args.sram_path();
    let initial_sram = read_sram(&sram_path)?;

    let mut snes = Snes::create(rom, initial_sram, config)?;
    snes.set_joypad(JoypadPort::One, joypad_state(&args.p1_buttons));
    snes.set_joypad(JoypadPort::Two, joypad_state(&args.p2_buttons));

    if let Some(path) = &args.load_state {
        load_state(&mut snes, path)?;
    }

    for _ in 0..args.frames {
        snes.run_frame();
    }

    let registers = snes.registers();
    log::info!(
        "Ran {} frames: {} master clocks, PC={:02X}:{:04X}",
        snes.frame_count(),
        snes.cpu_clocks(),
        registers.pbr,
        registers.pc
    );

    if let Some(path) = &args.save_state {
        save_state(&mut snes, path)?;
    }

    if let Some(sram) = snes.sram() {
        fs::write(&sram_path, sram)
            .with_context(|| format!("writing SRAM to '{}'", sram_path.display()))?;
        log::info!("Wrote {} bytes of SRAM to '{}'", sram.len(), sram_path.display());
    }

    Ok(())
}
