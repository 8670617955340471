//! Decode a BBP capture and print one JSON object per shot.
//!
//! Input lines are `<timestamp_ms> <hex bytes>`; blank lines and lines
//! starting with `#` are skipped.
//!
//! Usage: beyscope-decode [capture.txt] [--config cfg.json] [--band-step 1]

use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::Parser;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use beyscope::analysis::aggregate::{TimeGrid, aggregate_profiles};
use beyscope::codec::parse_hex;
use beyscope::{
    AnalysisConfig, PacketLog, ParserConfig, ProtocolState, ShotAnalysis, ShotProfile,
    ShotSnapshot, analyze,
};

#[derive(Parser)]
#[command(author, version, about = "Decode BBP launcher captures into shot records")]
struct Args {
    /// Capture file; stdin when omitted
    input: Option<PathBuf>,
    /// JSON file with `parser` and `analysis` sections
    #[arg(long)]
    config: Option<PathBuf>,
    /// Print the cross-shot speed band at this grid step (ms)
    #[arg(long)]
    band_step: Option<f64>,
    /// End of the band grid (ms); longest profile when omitted
    #[arg(long)]
    band_end: Option<f64>,
    /// Raw notifications kept for error dumps
    #[arg(long, default_value_t = beyscope::packet_log::DEFAULT_CAPACITY)]
    history: usize,
    /// Debug logging
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DecoderConfig {
    parser: ParserConfig,
    analysis: AnalysisConfig,
}

#[derive(Serialize)]
struct ShotRecord<'a> {
    line: usize,
    snapshot: &'a ShotSnapshot,
    analysis: &'a ShotAnalysis,
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<DecoderConfig> {
    let Some(path) = path else {
        return Ok(DecoderConfig::default());
    };
    let file = File::open(path).with_context(|| format!("opening config {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("parsing config {}", path.display()))
}

fn open_input(path: Option<&PathBuf>) -> anyhow::Result<Box<dyn BufRead>> {
    Ok(match path {
        Some(p) => {
            let file = File::open(p).with_context(|| format!("opening {}", p.display()))?;
            Box::new(BufReader::new(file))
        }
        None => Box::new(BufReader::new(io::stdin())),
    })
}

/// Split `"<timestamp_ms> <hex>"` into its parts.
fn parse_line(line: &str) -> anyhow::Result<(u64, Vec<u8>)> {
    let Some((ts, hex)) = line.split_once(char::is_whitespace) else {
        bail!("expected `<timestamp_ms> <hex>`");
    };
    let ts: u64 = ts.parse().with_context(|| format!("bad timestamp {ts:?}"))?;
    let Some(bytes) = parse_hex(hex) else {
        bail!("bad hex payload");
    };
    Ok((ts, bytes))
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let cfg = load_config(args.config.as_ref())?;
    let mut state = ProtocolState::with_config(cfg.parser);
    let mut history = PacketLog::new(args.history);
    let mut profiles: Vec<ShotProfile> = Vec::new();
    let mut errors = 0usize;

    let stdout = io::stdout();
    let mut out = stdout.lock();

    for (idx, line) in open_input(args.input.as_ref())?.lines().enumerate() {
        let line_no = idx + 1;
        let line = line.context("reading input")?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (ts, bytes) = match parse_line(line) {
            Ok(v) => v,
            Err(e) => {
                warn!("line {line_no}: {e:#}");
                continue;
            }
        };
        history.push(ts, &bytes);

        match state.feed(&bytes, ts) {
            Ok(Some(snapshot)) => {
                let analysis = analyze(&snapshot.profile, &cfg.analysis);
                let record = ShotRecord {
                    line: line_no,
                    snapshot: &snapshot,
                    analysis: &analysis,
                };
                serde_json::to_writer(&mut out, &record)?;
                writeln!(out)?;
                profiles.push(snapshot.profile);
            }
            Ok(None) => {}
            Err(e) => {
                errors += 1;
                warn!("line {line_no}: {e}");
                debug!("recent notifications:\n{}", history.dump());
            }
        }
    }

    if let Some(step) = args.band_step {
        let end = args
            .band_end
            .unwrap_or_else(|| profiles.iter().map(ShotProfile::duration_ms).fold(0.0, f64::max));
        let grid = TimeGrid::new(0.0, end, step);
        if grid.point_count().is_none() {
            warn!("band grid 0..{end} step {step} is empty or too large");
        }
        let band = aggregate_profiles(&profiles, &grid);
        serde_json::to_writer(&mut out, &serde_json::json!({ "band": band }))?;
        writeln!(out)?;
    }

    info!(
        "{} shots, {} protocol errors, status {:?}",
        profiles.len(),
        errors,
        state.status()
    );
    Ok(())
}
