mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;

use beatmap::config::{self, Config};
use beatmap::{AudioFile, LoadOutcome, MapGenerator, MapStore};
use cli::Cli;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    // Explicit --config path, or auto-detect beatmap.toml / global config
    let config_path = cli.config.clone().or_else(|| {
        let local = PathBuf::from("beatmap.toml");
        if local.exists() {
            return Some(local);
        }
        if let Some(home) = dirs::home_dir() {
            let xdg = home.join(".config").join("beatmap").join("config.toml");
            if xdg.exists() {
                return Some(xdg);
            }
        }
        if let Some(config_dir) = dirs::config_dir() {
            let platform = config_dir.join("beatmap").join("config.toml");
            if platform.exists() {
                return Some(platform);
            }
        }
        None
    });

    let mut file_config = Config::default();
    if let Some(ref path) = config_path {
        match config::load_config(path) {
            Ok(cfg) => {
                log::info!("Loaded config from {}", path.display());
                file_config = cfg;
            }
            Err(err) => {
                if cli.config.is_some() {
                    return Err(err).context("Failed to load the requested config");
                }
                log::warn!("Failed to load config from {}: {}", path.display(), err);
            }
        }
    }

    let mut generator_config = file_config.generator;
    cli.apply(&mut generator_config);

    let store = match cli.out_dir.clone().or(file_config.output.dir) {
        Some(dir) => MapStore::new(dir),
        None => MapStore::default_location(),
    };

    if !cli.input.exists() {
        anyhow::bail!("Input file not found: {}", cli.input.display());
    }

    log::info!("beatmap - rhythm map generator");
    log::info!("Input: {}", cli.input.display());
    log::info!("Maps: {}", store.dir().display());
    log::info!(
        "Lanes: {}, subdivisions: {}, strategy: {:?}",
        generator_config.lanes,
        generator_config.subdivisions_per_beat,
        generator_config.lane_strategy
    );

    let source = AudioFile::open(&cli.input)?;
    let mut generator = MapGenerator::new(generator_config)
        .context("Invalid generator configuration")?
        .with_store(store);

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} windows ({eta} remaining)")
            .context("Invalid progress bar template")?
            .progress_chars("=>-"),
    );

    let outcome = generator
        .check_and_load(&source, cli.force, |processed, total| {
            pb.set_length(total as u64);
            pb.set_position(processed as u64);
        })
        .with_context(|| format!("Failed to build a map for {}", source.path().display()))?;

    let map = match outcome {
        LoadOutcome::Busy => anyhow::bail!("A generation is already in progress"),
        LoadOutcome::Loaded(map) => {
            pb.finish_and_clear();
            log::info!("Using saved map ({} notes)", map.len());
            map
        }
        LoadOutcome::Generated(map) => {
            pb.finish_with_message("Analysis complete");
            if let Some(bpm) = generator.bpm() {
                log::info!("Tempo: {:.2} BPM", bpm);
            }
            map
        }
    };

    let summary = map.summary(generator.config().lanes);
    summary.log();

    if cli.print {
        let json = serde_json::to_string_pretty(&*map).context("Failed to serialize map")?;
        println!("{}", json);
    }

    log::info!("Done! {} notes for '{}'", summary.total(), map.clip_name);
    Ok(())
}
