use std::{
    fs::File,
    path::{Path, PathBuf},
};

use anyhow::Context;
use clap::{Parser, Subcommand};

use crate::{
    character::{CharacterSource, DirectorySource},
    config::{SETTINGS_FILE, Settings},
    data::{data_path, load_data, open_data, save_data},
    matcher::Leniency,
    mode::{Mode, ModeController, TestHint},
};

mod animation;
mod character;
mod config;
mod data;
mod geometry;
mod matcher;
mod mode;
mod pinyin;
mod quiz;
mod scheduler;
mod ui;

#[derive(Debug, Parser)]
#[command(version, about = "Stroke-order drills for Chinese characters")]
struct Cli {
    /// Directory holding one `<character>.json` stroke file per character
    #[arg(long, global = true, default_value = "chars")]
    chars_dir: PathBuf,
    /// Write logs here (the drill screen owns the terminal)
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Drill characters until each is written cleanly in consecutive rounds
    Drill {
        #[arg(required = true)]
        characters: Vec<String>,
        #[arg(long, value_enum, default_value_t)]
        mode: Mode,
        /// Overrides the saved setting
        #[arg(long, value_enum)]
        leniency: Option<Leniency>,
        /// Animation speed multiplier, overrides the saved setting
        #[arg(long)]
        speed: Option<f64>,
        /// What test mode shows besides the blank canvas
        #[arg(long, value_enum, default_value_t)]
        test_hint: TestHint,
    },
    /// Check that stroke data loads for each character
    Check {
        #[arg(required = true)]
        characters: Vec<String>,
    },
}

/// Splits arguments like `十人 大` into single characters, dropping repeats.
pub fn split_characters(args: &[String]) -> Vec<String> {
    let mut out: Vec<String> = vec![];
    for c in args.iter().flat_map(|a| a.chars()).filter(|c| !c.is_whitespace()) {
        let c = c.to_string();
        if !out.contains(&c) {
            out.push(c);
        }
    }
    out
}

fn init_logging(log_file: Option<&Path>, interactive: bool) -> anyhow::Result<()> {
    match log_file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("creating log file {}", path.display()))?;
            env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
                .target(env_logger::Target::Pipe(Box::new(file)))
                .init();
        }
        // logging to stderr would scribble over the drill screen
        None if interactive => {}
        None => env_logger::init(),
    }
    Ok(())
}

fn check(chars_dir: &Path, characters: &[String]) -> anyhow::Result<()> {
    let source = DirectorySource::new(chars_dir);
    let mut missing = 0;
    for c in characters {
        match source.load(c) {
            Ok(reference) => {
                let reading = reference
                    .pinyin
                    .as_deref()
                    .map(|p| format!(" ({p})"))
                    .unwrap_or_default();
                println!("{c}{reading}: {} strokes", reference.stroke_count());
            }
            Err(e) => {
                missing += 1;
                println!("{c}: {e}");
            }
        }
    }
    if missing > 0 {
        anyhow::bail!("{missing} of {} characters unavailable", characters.len());
    }
    Ok(())
}

fn drill(
    chars_dir: &Path,
    characters: &[String],
    mode: Mode,
    leniency: Option<Leniency>,
    speed: Option<f64>,
    test_hint: TestHint,
) -> anyhow::Result<()> {
    let dir = data_path()?;
    let mut settings = Settings::load(&dir);
    if !dir.join(SETTINGS_FILE).exists() {
        settings
            .save(&dir)
            .context("writing default settings")?;
    }
    if let Some(leniency) = leniency {
        settings.leniency = leniency;
    }
    if let Some(speed) = speed {
        settings.animation_speed = speed;
    }

    let source = DirectorySource::new(chars_dir);
    let mut controller = ModeController::new(
        mode,
        settings.sanitized(),
        characters,
        Box::new(source),
        rand::rng(),
    )
    .with_test_hint(test_hint);
    controller
        .preload()
        .with_context(|| format!("loading stroke data from {}", chars_dir.display()))?;

    let mut file = open_data(&dir)?;
    let mut data = load_data(&mut file);
    let result = ui::run_drill(&mut controller, &mut data);
    save_data(&mut file, &data)?;
    result
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Drill {
            characters,
            mode,
            leniency,
            speed,
            test_hint,
        } => {
            init_logging(cli.log_file.as_deref(), true)?;
            log::info!("drilling {characters:?} in {mode:?} mode");
            drill(
                &cli.chars_dir,
                &split_characters(&characters),
                mode,
                leniency,
                speed,
                test_hint,
            )
        }
        Command::Check { characters } => {
            init_logging(cli.log_file.as_deref(), false)?;
            check(&cli.chars_dir, &split_characters(&characters))
        }
    }
}
