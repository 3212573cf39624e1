//! Kickr Racer - ghost racing on a smart trainer
//!
//! Main entry point for the application.

use anyhow::{bail, Context, Result};
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use kickr_racer::racing::engine::{RaceConfig, RaceEngine};
use kickr_racer::racing::session::{
    PowerSource, RaceSession, SessionCommand, SessionOptions, SessionResult,
};
use kickr_racer::sensors::simulator::PowerSimulator;
use kickr_racer::sensors::trainer::{connect_trainer, BleControlPoint};
use kickr_racer::storage::config::{load_config, AppConfig};
use kickr_racer::storage::database::{CourseStore, Database};
use kickr_racer::world::course::Course;
use kickr_racer::world::import::import_gpx_file;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Kickr Racer v{}", env!("CARGO_PKG_VERSION"));

    let mut config = load_config().context("Failed to load configuration")?;
    if let Some(arg) = std::env::args().nth(1) {
        config.race.gpx_path = Some(PathBuf::from(arg));
    }

    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("Failed to create {}", config.data_dir.display()))?;
    let db = Database::open(&config.data_dir.join("courses.db"))
        .context("Failed to open course database")?;

    let course = select_course(&db, &config)?;
    let record = db
        .load_record_run(&course.id)
        .context("Failed to load course record")?;
    match &record {
        Some(r) => tracing::info!("Racing {}'s ghost ({:.1}s)", r.runner_name, r.total_time),
        None => tracing::info!("No record on {} yet; riding solo", course.name),
    }

    let engine = RaceEngine::from_course(&course, record, RaceConfig::from(&config))?;
    let options = SessionOptions {
        tick_interval: Duration::from_millis(config.race.tick_interval_ms),
        erg_watts: config.race.erg_watts,
    };

    let result = if config.trainer.use_simulator {
        let (tx, rx) = crossbeam::channel::unbounded();
        spawn_keyboard(tx);
        tracing::info!("Simulated power: type + or - and Enter to adjust");

        let session = RaceSession::<BleControlPoint, _>::new(
            course.id.clone(),
            engine,
            db,
            None,
            PowerSource::Simulator(PowerSimulator::new(config.trainer.simulator_power)),
            options,
        )
        .with_commands(rx);
        session.run_until(shutdown_signal()).await?
    } else {
        let (link, events) = connect_trainer(&config.trainer)
            .await
            .context("Failed to connect to trainer")?;
        tracing::info!("Connected to {} ({})", link.name, link.device_id);

        let session = RaceSession::new(
            course.id.clone(),
            engine,
            db,
            link.controller.clone(),
            PowerSource::Trainer(events),
            options,
        );
        let result = session.run_until(shutdown_signal()).await?;

        if let Err(e) = link.disconnect().await {
            tracing::warn!("Disconnect failed: {}", e);
        }
        result
    };

    report(&result);
    Ok(())
}

/// Import the configured GPX as a course if needed, else load the configured course.
fn select_course(db: &Database, config: &AppConfig) -> Result<Course> {
    if let Some(path) = &config.race.gpx_path {
        let id = config
            .race
            .course_id
            .clone()
            .unwrap_or_else(|| course_id_for(path));

        if let Some(course) = db.load_course(&id)? {
            return Ok(course);
        }

        let imported = import_gpx_file(path)
            .with_context(|| format!("Failed to import {}", path.display()))?;
        let name = imported.name.unwrap_or_else(|| id.clone());
        let course =
            Course::with_checkpoint_count(id, name, imported.route, config.race.checkpoint_count);
        db.insert_course(&course)?;
        tracing::info!(
            "Imported course {} ({:.2} miles)",
            course.name,
            course.total_distance()
        );
        return Ok(course);
    }

    if let Some(id) = &config.race.course_id {
        return match db.load_course(id)? {
            Some(course) => Ok(course),
            None => bail!("No course with id {}", id),
        };
    }

    let courses = db.list_courses()?;
    if courses.is_empty() {
        bail!("No courses stored. Pass a GPX file to import one.");
    }
    for summary in &courses {
        tracing::info!(
            "Course {}: {} ({:.2} miles)",
            summary.id,
            summary.name,
            summary.total_distance
        );
    }
    bail!("Set race.course_id in the config to pick a course")
}

fn course_id_for(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "course".to_string())
}

/// Map `+` and `-` lines on stdin to simulator power changes.
fn spawn_keyboard(tx: crossbeam::channel::Sender<SessionCommand>) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines().map_while(|line| line.ok()) {
            let line = line.trim();
            let command = match line {
                "+" => SessionCommand::IncreasePower,
                "-" => SessionCommand::DecreasePower,
                other => match other.parse::<u16>() {
                    Ok(watts) => SessionCommand::SetPower(watts),
                    Err(_) => continue,
                },
            };
            if tx.send(command).is_err() {
                break;
            }
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}

fn report(result: &SessionResult) {
    if !result.state.rider_finished {
        tracing::info!(
            "Race abandoned after {:.1}s and {:.2} miles",
            result.state.elapsed_time,
            result.state.total_distance_ridden
        );
        return;
    }

    tracing::info!(
        "Finished in {:.1}s over {:.2} miles",
        result.submission.total_time,
        result.state.total_distance_ridden
    );
    match result.new_record {
        Some(true) => tracing::info!("New course record!"),
        Some(false) => tracing::info!("Record stands"),
        None => tracing::warn!("Run was not saved"),
    }
    if let Some(score) = &result.high_score {
        tracing::info!("Pace score: {} points", score.points);
    }
}
