//! rollcall - face-recognition attendance from the terminal.
//!
//! Subcommands cover the whole attendance workflow: `register` enrolls an
//! employee from a photo, `start` runs the kiosk session against the
//! camera and recognizer service, and `report`, `day`, and `employees`
//! read the stored records back out.

mod output;
mod session;

use std::collections::HashMap;
use std::fs;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::{Datelike, Local, NaiveDate};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use rollcall_capture::camera::{FrameSource, V4l2Camera};
use rollcall_capture::recognizer::{Recognizer, SocketRecognizer};
use rollcall_core::config::UiConfig;
use rollcall_core::report;
use rollcall_core::store::StoreError;
use rollcall_core::types::EventKind;
use rollcall_core::{Config, RecordStore, Roster};

use output::OutputFormat;
use session::{Control, Session, SessionUpdate};

#[derive(Parser)]
#[command(name = "rollcall", version, about = "Face-recognition attendance kiosk")]
struct Cli {
    /// Config file (falls back to $ROLLCALL_CONFIG, then ./rollcall.toml).
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register an employee from a face photo.
    Register {
        /// Unique employee id (letters, digits, `-`, `_`).
        #[arg(long)]
        id: String,
        /// Display name shown in sessions and reports.
        #[arg(long)]
        name: String,
        /// Photo containing exactly one face.
        #[arg(long, value_name = "PATH")]
        image: PathBuf,
    },
    /// Run the interactive kiosk session.
    Start {
        /// Initial mode; switch live by typing `m`.
        #[arg(long, value_enum, default_value_t = ModeArg::CheckIn)]
        mode: ModeArg,
    },
    /// Aggregate one month of records into a per-employee report.
    Report {
        /// Year to report on (default: current year).
        #[arg(long)]
        year: Option<i32>,
        /// Month to report on, 1-12 (default: current month).
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..=12))]
        month: Option<u32>,
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
        /// Also write the rendered report to this file.
        #[arg(long, value_name = "PATH")]
        out: Option<PathBuf>,
        /// Count distinct days with a check-in instead of check-in events.
        #[arg(long)]
        distinct_days: bool,
    },
    /// List the raw events recorded on one day.
    Day {
        /// Date to list, YYYY-MM-DD (default: today).
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// List registered employees.
    Employees,
    /// List V4L2 capture devices.
    Cameras {
        /// Open each device and grab one frame.
        #[arg(long)]
        probe: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ModeArg {
    CheckIn,
    CheckOut,
}

impl From<ModeArg> for EventKind {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::CheckIn => EventKind::CheckIn,
            ModeArg::CheckOut => EventKind::CheckOut,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Register { id, name, image } => cmd_register(&config, &id, &name, &image),
        Commands::Start { mode } => cmd_start(&config, mode.into()),
        Commands::Report {
            year,
            month,
            format,
            out,
            distinct_days,
        } => cmd_report(&config, year, month, format, out.as_deref(), distinct_days),
        Commands::Day { date } => cmd_day(&config, date),
        Commands::Employees => cmd_employees(&config),
        Commands::Cameras { probe } => cmd_cameras(&config, probe),
    }
}

fn cmd_register(config: &Config, id: &str, name: &str, photo: &Path) -> Result<()> {
    // Reject bad input before the recognizer service gets involved.
    rollcall_core::roster::validate_id(id)?;
    let roster = Roster::new(&config.storage.employees_dir);
    if roster.get(id).is_ok() {
        bail!("employee {id} is already registered");
    }

    let bytes =
        fs::read(photo).with_context(|| format!("failed to read {}", photo.display()))?;
    let reader = image::ImageReader::new(std::io::Cursor::new(&bytes))
        .with_guessed_format()
        .context("failed to sniff image format")?;
    let Some(format) = reader.format() else {
        bail!("{} is not a recognized image format", photo.display());
    };
    let (width, height) = reader
        .into_dimensions()
        .context("failed to decode image header")?;
    tracing::debug!(?format, width, height, "read registration photo");

    let mut recognizer = SocketRecognizer::new(
        &config.recognition.socket,
        config.recognition.min_confidence,
        config.recognition.require_liveness,
    );
    let inspection = recognizer
        .inspect(&bytes)
        .context("recognizer service could not inspect the photo")?;
    match inspection.faces {
        0 => bail!("no detectable face in {}", photo.display()),
        1 => {}
        n => bail!(
            "found {n} faces in {}; provide a photo with exactly one",
            photo.display()
        ),
    }
    if inspection.confidence < config.recognition.min_confidence {
        tracing::warn!(
            confidence = inspection.confidence,
            "face detection confidence is low; consider a clearer photo"
        );
    }

    let ext = format.extensions_str().first().copied().unwrap_or("img");
    let employee = roster.register(id, name, &bytes, ext)?;
    println!("registered {} ({})", employee.name, employee.id);
    Ok(())
}

fn cmd_start(config: &Config, mode: EventKind) -> Result<()> {
    let schedule = config.schedule.schedule()?;
    let store = RecordStore::new(&config.storage.records_dir);
    let roster = Roster::new(&config.storage.employees_dir);
    let names: HashMap<_, _> = roster.list()?.into_iter().map(|e| (e.id, e.name)).collect();
    if names.is_empty() {
        tracing::warn!("roster is empty; no frame will ever match");
    }

    let mut frames = V4l2Camera::open_index(
        config.camera.index,
        config.camera.width,
        config.camera.height,
    )?;
    let mut recognizer = SocketRecognizer::new(
        &config.recognition.socket,
        config.recognition.min_confidence,
        config.recognition.require_liveness,
    );

    println!(
        "rollcall kiosk, {} mode",
        output::mode_label(mode, &config.ui)
    );
    println!(
        "work hours {} to {}, grace {} min",
        config.schedule.work_start, config.schedule.work_end, schedule.grace_minutes
    );
    println!("commands: m = switch mode, q = quit");

    let controls = spawn_stdin_controls();
    let mut session = Session::new(
        &store,
        schedule,
        names,
        mode,
        Duration::from_secs(config.session.cooldown_secs),
    );
    let ui = config.ui.clone();
    let stats = session.run(&mut frames, &mut recognizer, &controls, |update| {
        announce(&update, &ui)
    })?;
    println!(
        "session ended: {} recorded, {} ignored",
        stats.recorded, stats.misses
    );
    Ok(())
}

fn announce(update: &SessionUpdate, ui: &UiConfig) {
    match update {
        SessionUpdate::Mode(mode) => println!("mode: {}", output::mode_label(*mode, ui)),
        SessionUpdate::Recorded {
            event,
            display_name,
        } => {
            let line = format!(
                "{} {} at {} ({})",
                output::mode_label(event.kind, ui),
                display_name,
                event.time.format("%H:%M:%S"),
                event.status,
            );
            println!("{}", output::paint_status(&line, event.status, ui.color));
            if ui.bell {
                print!("{}", output::BELL);
                let _ = std::io::stdout().flush();
            }
        }
        SessionUpdate::Miss(reason) => {
            tracing::debug!(?reason, "frame produced no attendance event");
        }
    }
}

/// Reads operator commands from stdin on its own thread. EOF quits.
fn spawn_stdin_controls() -> mpsc::Receiver<Control> {
    let (tx, rx) = mpsc::channel();
    std::thread::Builder::new()
        .name("rollcall-stdin".to_string())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                match line.trim() {
                    "m" | "mode" => {
                        if tx.send(Control::Toggle).is_err() {
                            return;
                        }
                    }
                    "q" | "quit" => {
                        let _ = tx.send(Control::Quit);
                        return;
                    }
                    "" => {}
                    other => {
                        eprintln!("unknown command {other:?} (m = switch mode, q = quit)");
                    }
                }
            }
            let _ = tx.send(Control::Quit);
        })
        .expect("failed to spawn stdin reader");
    rx
}

fn cmd_report(
    config: &Config,
    year: Option<i32>,
    month: Option<u32>,
    format: OutputFormat,
    out: Option<&Path>,
    distinct_days: bool,
) -> Result<()> {
    let today = Local::now().date_naive();
    let year = year.unwrap_or_else(|| today.year());
    let month = month.unwrap_or_else(|| today.month());

    let store = RecordStore::new(&config.storage.records_dir);
    let roster = Roster::new(&config.storage.employees_dir);
    let monthly = report::generate(&store, &roster, year, month, distinct_days)?;
    if monthly.days_with_records == 0 {
        bail!("no attendance records for {year}-{month:02}");
    }

    let rendered = output::render_report(&monthly, format)?;
    print!("{rendered}");
    if let Some(path) = out {
        fs::write(path, rendered.as_bytes())
            .with_context(|| format!("failed to write {}", path.display()))?;
        tracing::info!(path = %path.display(), "wrote report file");
    }
    Ok(())
}

fn cmd_day(config: &Config, date: Option<NaiveDate>) -> Result<()> {
    let date = date.unwrap_or_else(|| Local::now().date_naive());
    let store = RecordStore::new(&config.storage.records_dir);
    let events = match store.read(date) {
        Ok(events) => events,
        Err(StoreError::NotFound(_)) => {
            println!("no records for {date}");
            return Ok(());
        }
        Err(other) => return Err(other.into()),
    };

    let roster = Roster::new(&config.storage.employees_dir);
    let names: HashMap<_, _> = roster.list()?.into_iter().map(|e| (e.id, e.name)).collect();
    print!("{}", output::render_day(date, &events, &names));
    Ok(())
}

fn cmd_employees(config: &Config) -> Result<()> {
    let roster = Roster::new(&config.storage.employees_dir);
    let employees = roster.list()?;
    if employees.is_empty() {
        println!("no employees registered");
        return Ok(());
    }
    print!("{}", output::render_employees(&employees));
    Ok(())
}

fn cmd_cameras(config: &Config, probe: bool) -> Result<()> {
    let devices = V4l2Camera::list_devices();
    if devices.is_empty() {
        println!("no capture devices found");
        return Ok(());
    }
    for device in devices {
        if probe {
            match probe_device(&device.path, config) {
                Ok(summary) => println!("{}  {}  {summary}", device.path, device.name),
                Err(err) => println!("{}  {}  error: {err:#}", device.path, device.name),
            }
        } else {
            println!("{}  {} ({})", device.path, device.name, device.driver);
        }
    }
    Ok(())
}

fn probe_device(path: &str, config: &Config) -> Result<String> {
    let mut camera = V4l2Camera::open_path(path, config.camera.width, config.camera.height)?;
    let frame = camera.grab()?;
    Ok(format!(
        "{}x{}, avg brightness {:.1}",
        frame.width,
        frame.height,
        frame.avg_brightness()
    ))
}
