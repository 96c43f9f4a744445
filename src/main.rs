//! liveguard CLI
//!
//! Usage:
//!   liveguard --demo                          # Scripted subject through the full pipeline
//!   liveguard --trace frames.jsonl            # Replay recorded measurements
//!   liveguard --trace frames.jsonl --json     # JSON event output
//!   liveguard --serve                         # HTTP API server
//!   liveguard --preset strict --print-config  # Dump effective configuration

use clap::{Parser, ValueEnum};
use colored::Colorize;
use std::process::ExitCode;
use tracing::error;

use liveguard::core::{
    run_server, FormatFallbackAdapter, LivenessOrchestrator, LivenessSession, ManualCamera,
    ScriptedDetector,
};
use liveguard::logging::{init_logging, LogFormat};
use liveguard::replay::{load_trace, replay, ScriptedSubject, SUBJECT_FRAME};
use liveguard::types::{ChallengeType, LivenessResult, Plane, RawFrame, StampedEvent};
use liveguard::{LivenessConfig, LivenessError, VERSION};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Preset {
    Default,
    Strict,
    Lenient,
}

#[derive(Parser, Debug)]
#[command(
    name = "liveguard",
    version = VERSION,
    about = "liveguard - challenge/response liveness detection engine",
    long_about = "liveguard decides whether the face in front of a camera is a live person.\n\n\
                  It fuses anti-spoofing heuristics (motion, depth, timing), framing\n\
                  stability and a sequence of gesture challenges into one event stream.\n\n\
                  Modes:\n  \
                  --demo     Scripted subject through camera, gate, adapter and detector\n  \
                  --trace    Replay recorded per-frame measurements (JSON lines)\n  \
                  --serve    HTTP API server mode\n\n\
                  Exit status: 0 verified, 1 not verified, 2 error"
)]
struct Args {
    /// Replay a JSON-lines trace of per-frame measurements
    #[arg(short, long)]
    trace: Option<String>,

    /// Run a scripted live subject through the full pipeline
    #[arg(long, conflicts_with = "trace")]
    demo: bool,

    /// TOML configuration file (overrides --preset)
    #[arg(short, long)]
    config: Option<String>,

    /// Built-in configuration preset
    #[arg(long, value_enum, default_value_t = Preset::Default)]
    preset: Preset,

    /// Run as HTTP API server
    #[arg(short, long)]
    serve: bool,

    /// Server address (default: 127.0.0.1:3000)
    #[arg(long, default_value = "127.0.0.1:3000")]
    addr: String,

    /// Output events as JSON lines
    #[arg(long)]
    json: bool,

    /// Disable colors in output
    #[arg(long)]
    no_color: bool,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Human)]
    log_format: LogFormat,

    /// Log level (RUST_LOG takes precedence)
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Seed for deterministic challenge shuffling
    #[arg(long)]
    seed: Option<u64>,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.log_format, &args.log_level);
    if args.no_color {
        colored::control::set_override(false);
    }

    match run(&args).await {
        Ok(code) => code,
        Err(err) => {
            error!(code = err.code(), %err, "liveguard failed");
            eprintln!("{} {} ({})", "error:".red().bold(), err, err.code());
            ExitCode::from(2)
        }
    }
}

async fn run(args: &Args) -> Result<ExitCode, LivenessError> {
    let config = load_config(args)?;

    if args.print_config {
        print!("{}", config.to_toml_string()?);
        return Ok(ExitCode::SUCCESS);
    }
    if args.serve {
        run_server(&args.addr, config).await?;
        return Ok(ExitCode::SUCCESS);
    }
    // demo is also the default when no mode is given
    match (&args.trace, args.demo) {
        (Some(path), false) => run_trace(path, config, args),
        _ => run_demo(config, args).await,
    }
}

fn load_config(args: &Args) -> Result<LivenessConfig, LivenessError> {
    if let Some(path) = &args.config {
        return LivenessConfig::from_toml_file(path);
    }
    let config = match args.preset {
        Preset::Default => LivenessConfig::default(),
        Preset::Strict => LivenessConfig::strict(),
        Preset::Lenient => LivenessConfig::lenient(),
    };
    config.validate()?;
    Ok(config)
}

fn new_session(config: LivenessConfig, seed: Option<u64>) -> Result<LivenessSession, LivenessError> {
    match seed {
        Some(seed) => LivenessSession::with_seed(config, seed),
        None => LivenessSession::new(config),
    }
}

/// Replay a recorded trace
fn run_trace(path: &str, config: LivenessConfig, args: &Args) -> Result<ExitCode, LivenessError> {
    let records = load_trace(path)?;
    let mut session = new_session(config, args.seed)?;

    print_header("Trace Replay", session.challenges(), args);
    for event in replay(&mut session, &records) {
        print_event(&event, args);
    }
    Ok(finish(session.result(), records.len(), args))
}

/// Scripted subject through camera → gate → adapter → detector → session
async fn run_demo(config: LivenessConfig, args: &Args) -> Result<ExitCode, LivenessError> {
    let session = new_session(config, args.seed)?;
    let skip = session.config().frame_skip;
    let records = ScriptedSubject::performing(session.challenges());
    print_header("Demo", session.challenges(), args);

    let detector = ScriptedDetector::new(records.iter().map(|r| Ok(r.faces.clone())));
    let camera = ManualCamera::new();
    let mut orchestrator = LivenessOrchestrator::new(
        detector,
        Box::new(FormatFallbackAdapter::default()),
        Box::new(camera.clone()),
        session,
    );
    let mut events = orchestrator.subscribe();
    orchestrator.initialize().await?;

    let blank = blank_nv21_frame();
    for record in &records {
        if orchestrator.session().is_terminal() {
            break;
        }
        // the first of every `skip` frames is analysed, the rest are skipped
        camera.push(RawFrame { timestamp_ms: record.timestamp_ms, ..blank.clone() });
        orchestrator.step().await;
        for _ in 1..skip {
            camera.push(RawFrame { timestamp_ms: record.timestamp_ms, ..blank.clone() });
        }
        while let Ok(event) = events.try_recv() {
            print_event(&event, args);
        }
    }

    let stats = orchestrator.gate_stats();
    let session = orchestrator.dispose().await;
    if !args.json {
        println!(
            "frames offered={} analysed={} skipped={} dropped={}",
            stats.offered, stats.dispatched, stats.skipped, stats.dropped
        );
    }
    Ok(finish(session.result(), records.len(), args))
}

fn blank_nv21_frame() -> RawFrame {
    let (w, h) = (SUBJECT_FRAME.width as u32, SUBJECT_FRAME.height as u32);
    let luma = (w * h) as usize;
    RawFrame {
        width: w,
        height: h,
        planes: vec![
            Plane::new(vec![0; luma], w as usize, 1),
            Plane::new(vec![128; luma / 2], w as usize, 2),
        ],
        rotation_degrees: 270,
        timestamp_ms: 0,
    }
}

fn print_header(mode: &str, challenges: &[ChallengeType], args: &Args) {
    if args.json {
        return;
    }
    let names: Vec<String> = challenges.iter().map(|c| c.to_string()).collect();
    println!("{}", "========================================".bold());
    println!("  {} v{} - {}", "liveguard".bold(), VERSION, mode);
    println!("  challenges: {}", names.join(" → "));
    println!("{}", "========================================".bold());
    println!();
}

fn print_event(event: &StampedEvent, args: &Args) {
    if args.json {
        match serde_json::to_string(event) {
            Ok(line) => println!("{}", line),
            Err(err) => error!(%err, "event serialization failed"),
        }
    } else if args.no_color {
        println!("{}", event.to_parseable_string());
    } else {
        println!("{}", event.to_terminal_string());
    }
}

/// Print the verdict and pick the exit status
fn finish(result: Option<&LivenessResult>, frames: usize, args: &Args) -> ExitCode {
    let verified = result.is_some_and(|r| r.verified);
    if !args.json {
        println!();
        match result {
            Some(result) if result.verified => println!(
                "{} confidence={:.2} challenges={} duration={:.1}s",
                "VERIFIED".green().bold(),
                result.confidence,
                result.completed_challenges.len(),
                result.total_duration_ms as f64 / 1000.0
            ),
            Some(result) => println!(
                "{} {}",
                "NOT VERIFIED".red().bold(),
                result
                    .failure_reason
                    .as_ref()
                    .map(|e| e.to_string())
                    .unwrap_or_default()
            ),
            None => println!(
                "{} session unfinished after {} frames",
                "NOT VERIFIED".yellow().bold(),
                frames
            ),
        }
    }
    if verified {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    }
}
