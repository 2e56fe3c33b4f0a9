use anyhow::{Context, Result};
use clap::Parser;
use emu_core::logging::{LogConfig, LogLevel};
use emu_core::System;
use emu_vb::VbSystem;
use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;

/// Headless Virtual Boy runner: load a game pak, run frames, dump state.
#[derive(Parser)]
struct Args {
    /// Path to a .vb game pak image
    rom: PathBuf,

    /// Number of frames to run
    #[arg(long, default_value_t = 60)]
    frames: u32,

    /// Dump the final save-state to this file as JSON
    #[arg(long, default_value = "state.json")]
    save: String,

    /// Restore a save-state JSON before running
    #[arg(long)]
    load: Option<PathBuf>,

    /// Print per-frame pixel and audio summaries
    #[arg(long, default_value_t = false)]
    debug: bool,

    /// Suppress all per-frame output (still writes --save)
    #[arg(long, default_value_t = false)]
    quiet: bool,

    /// Button bits held for the whole run (hex, e.g. 0x0204)
    #[arg(long, value_parser = parse_buttons, default_value = "0")]
    buttons: u16,

    /// Make game pad hardware reads latch instantly
    #[arg(long, default_value_t = false)]
    instant_read: bool,

    /// Core log verbosity: off, error, warn, info, debug, trace
    #[arg(long, default_value = "off")]
    core_log: String,

    /// Write core logs to this file instead of stderr
    #[arg(long)]
    core_log_file: Option<PathBuf>,
}

fn parse_buttons(s: &str) -> Result<u16, String> {
    let s = s.trim();
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid button bits '{}': {}", s, e))
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    // Core logging is opt-in; it can be extremely noisy at trace level.
    let config = LogConfig::global();
    match LogLevel::from_str(&args.core_log) {
        Some(level) => config.set_global_level(level),
        None => anyhow::bail!("unknown log level: {}", args.core_log),
    }
    if let Some(path) = args.core_log_file.as_ref() {
        config
            .set_log_file(path.clone())
            .with_context(|| format!("opening core log file {}", path.display()))?;
    }

    let rom = fs::read(&args.rom)
        .with_context(|| format!("reading ROM {}", args.rom.display()))?;

    let mut sys = VbSystem::new();
    sys.mount("Cartridge", &rom)
        .with_context(|| format!("mounting {}", args.rom.display()))?;
    sys.set_instant_read(args.instant_read);
    sys.set_controller(args.buttons);

    if let Some(title) = sys.cart_header().map(|h| h.title.clone()) {
        if !args.quiet && !title.is_empty() {
            log::info!("game pak: {}", title);
            println!("Loaded \"{}\"", title);
        }
    }

    if let Some(path) = args.load.as_ref() {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading save state {}", path.display()))?;
        let state: serde_json::Value = serde_json::from_str(&text)?;
        sys.load_state(&state)
            .with_context(|| format!("restoring {}", path.display()))?;
    }

    for fnum in 1..=args.frames {
        let frame = sys.step_frame()?;
        let [left, right] = sys.take_audio();

        if args.quiet || !args.debug {
            continue;
        }
        println!(
            "Frame {}: {}x{}, {} samples/ch",
            fnum,
            frame.width,
            frame.height,
            left.len()
        );
        let lit = frame.pixels.iter().filter(|&&p| p != 0).count();
        let peak = left
            .iter()
            .chain(right.iter())
            .map(|s| s.unsigned_abs())
            .max()
            .unwrap_or(0);
        println!("  lit pixels: {}, audio peak: {}", lit, peak);
    }

    if !args.quiet {
        println!(
            "Ran {} frames ({} cycles)",
            args.frames,
            sys.total_cycles()
        );
    }

    let state = sys.save_state();
    let mut f = File::create(&args.save)?;
    write!(f, "{}", serde_json::to_string_pretty(&state)?)?;

    Ok(())
}
