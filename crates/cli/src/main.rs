// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info};

use nucleo_config::{
    EventAction, RtcClockSource, RtcSettings, ScenarioKind, ScenarioManifest, ScheduledEvent,
};
use nucleo_core::snapshot::{RunOutcome, RunReport};
use nucleo_core::World;

const EXIT_PASS: u8 = 0;
const EXIT_DEMO_FAULT: u8 = 1;
const EXIT_CONFIG_ERROR: u8 = 2;
const EXIT_RUNTIME_ERROR: u8 = 3;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "NUCLEO-L152RE demo simulator",
    long_about = None
)]
struct Cli {
    /// Log driver and register activity (DEBUG level)
    #[arg(short, long, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Two boards exchanging a payload over USART2, interrupt driven.
    Pingpong(PingPongArgs),

    /// RTC calendar set once and displayed while running.
    RtcCalendar(RtcArgs),

    /// RTC alarm A lighting the LED 30 s after the calendar is set.
    RtcAlarm(RtcArgs),

    /// Run a scenario manifest (YAML).
    Run(RunArgs),
}

#[derive(Parser, Debug)]
struct OutputArgs {
    /// Print the run report as JSON instead of a summary
    #[arg(long)]
    json: bool,

    /// Write the run report (JSON) to this file
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct PingPongArgs {
    /// When the transmitter's user button is pressed
    #[arg(long, default_value = "500")]
    press_at: u64,

    /// Simulated milliseconds before giving up
    #[arg(long, default_value = "10000")]
    max_ticks: u64,

    /// Invert character N on its way to the receiver
    #[arg(long)]
    corrupt_byte: Option<usize>,

    #[command(flatten)]
    out: OutputArgs,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ClockSourceArg {
    Lse,
    Lsi,
}

impl From<ClockSourceArg> for RtcClockSource {
    fn from(arg: ClockSourceArg) -> Self {
        match arg {
            ClockSourceArg::Lse => RtcClockSource::Lse,
            ClockSourceArg::Lsi => RtcClockSource::Lsi,
        }
    }
}

#[derive(Parser, Debug)]
struct RtcArgs {
    /// RTC clock
    #[arg(long, value_enum, default_value = "lse")]
    clock_source: ClockSourceArg,

    /// Fail instead of hanging when an oscillator or RTC flag never comes up
    #[arg(long)]
    use_timeout: bool,

    /// Simulated milliseconds to run
    #[arg(long, default_value = "35000")]
    run_ms: u64,

    /// System resets spread evenly over the run
    #[arg(long, default_value = "0")]
    resets: u32,

    #[command(flatten)]
    out: OutputArgs,
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Path to the scenario manifest
    #[arg(short, long)]
    scenario: PathBuf,

    #[command(flatten)]
    out: OutputArgs,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.trace {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_writer(std::io::stderr)
            .init();
    }

    let (manifest, out) = match cli.command {
        Commands::Pingpong(args) => (pingpong_manifest(&args), args.out),
        Commands::RtcCalendar(args) => (rtc_manifest(ScenarioKind::RtcCalendar, &args), args.out),
        Commands::RtcAlarm(args) => (rtc_manifest(ScenarioKind::RtcAlarm, &args), args.out),
        Commands::Run(args) => match ScenarioManifest::from_file(&args.scenario) {
            Ok(manifest) => (manifest, args.out),
            Err(e) => {
                error!("{:#}", e);
                return ExitCode::from(EXIT_CONFIG_ERROR);
            }
        },
    };

    let mut world = match World::from_manifest(&manifest) {
        Ok(world) => world,
        Err(e) => {
            error!("{:#}", e);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    let report = match simulate(&mut world, &manifest) {
        Ok(report) => report,
        Err(e) => {
            error!("Simulation error: {:#}", e);
            return ExitCode::from(EXIT_RUNTIME_ERROR);
        }
    };

    if let Err(e) = emit(&report, &out) {
        error!("{:#}", e);
        return ExitCode::from(EXIT_RUNTIME_ERROR);
    }

    ExitCode::from(exit_code(manifest.scenario, report.outcome))
}

fn pingpong_manifest(args: &PingPongArgs) -> ScenarioManifest {
    let mut manifest = ScenarioManifest::uart_pingpong(args.press_at);
    manifest.limits.max_ms = args.max_ticks;
    manifest.faults.corrupt_byte = args.corrupt_byte;
    manifest
}

fn rtc_manifest(kind: ScenarioKind, args: &RtcArgs) -> ScenarioManifest {
    let rtc = RtcSettings {
        clock_source: args.clock_source.into(),
        use_timeout: args.use_timeout,
    };
    let mut manifest = ScenarioManifest::rtc(kind, rtc, args.run_ms);
    // A board running its calendar never reaches a pass state.
    manifest.limits.stop_on_terminal = false;
    let board = manifest.boards[0].name.clone();
    let spacing = args.run_ms / (args.resets as u64 + 1);
    manifest.events = (1..=args.resets as u64)
        .map(|i| ScheduledEvent {
            at_ms: i * spacing,
            board: board.clone(),
            action: EventAction::Reset,
        })
        .collect();
    manifest
}

fn simulate(world: &mut World, manifest: &ScenarioManifest) -> anyhow::Result<RunReport> {
    info!(
        "Running '{}' for up to {} ms",
        manifest.name, manifest.limits.max_ms
    );
    if manifest.limits.stop_on_terminal {
        world.run_to_completion(manifest.limits.max_ms)?;
    } else {
        // Still stop on a fault; there is nothing left to observe.
        world.run_until(manifest.limits.max_ms, |w| {
            w.outcome() == RunOutcome::Fault
        })?;
    }
    let report = world.report();
    info!(
        "'{}' finished after {} ms: {:?}",
        report.scenario, report.elapsed_ms, report.outcome
    );
    Ok(report)
}

fn emit(report: &RunReport, out: &OutputArgs) -> anyhow::Result<()> {
    if let Some(path) = &out.output {
        write_report(report, path)?;
    }
    if out.json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        print_summary(report);
    }
    Ok(())
}

fn write_report(report: &RunReport, path: &Path) -> anyhow::Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create report file {:?}", path))?;
    serde_json::to_writer_pretty(file, report)
        .with_context(|| format!("Failed to write report to {:?}", path))?;
    info!("Report written to {:?}", path);
    Ok(())
}

fn print_summary(report: &RunReport) {
    println!(
        "{}: {:?} after {} ms",
        report.scenario, report.outcome, report.elapsed_ms
    );
    for board in &report.boards {
        let phase = serde_json::to_string(&board.status.phase).unwrap_or_default();
        println!(
            "  {:<8} phase={} led={:?} resets={} led_transitions={}",
            board.name,
            phase,
            board.led,
            board.resets,
            board.led_transitions.len()
        );
        if let Some(calendar) = &board.status.calendar {
            println!("           time={} date={}", calendar.time, calendar.date);
        }
        if board.status.alarm_fired {
            println!("           alarm A fired");
        }
    }
}

/// The UART demo has to pass; the RTC demos only have to stay out of the
/// fault state.
fn exit_code(kind: ScenarioKind, outcome: RunOutcome) -> u8 {
    match (kind, outcome) {
        (_, RunOutcome::Pass) => EXIT_PASS,
        (_, RunOutcome::Fault) => EXIT_DEMO_FAULT,
        (ScenarioKind::UartPingpong, RunOutcome::Running) => EXIT_DEMO_FAULT,
        (_, RunOutcome::Running) => EXIT_PASS,
    }
}
