//! URL Sync Host - interactive driver for the URL sync engine.
//!
//! Runs the demo stores against an in-memory address bar. Commands arrive on
//! stdin, replies leave on stdout as JSON lines, logs go to stderr. The
//! engine's debounce timers are driven by the tokio timer.

mod app;
mod clock;
mod command;
mod config;
mod error;

use std::rc::Rc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::{sleep_until, Duration, Instant};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::app::{App, Flow};
use crate::clock::TokioClock;
use crate::command::{Command, Reply, HELP};
use crate::config::Config;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "urlsync_host=debug,urlsync_engine=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    tracing::info!(
        debounce_ms = config.debounce_ms,
        cascade_debounce_ms = config.cascade_debounce_ms,
        ready_delay_ms = config.ready_delay_ms,
        "Starting URL sync host"
    );

    let start = Instant::now();
    let clock = TokioClock::new(start);
    let app = App::build(&config, Rc::new(clock))?;

    // Store loading is simulated by a delay before the ready signal.
    let ready_at = clock.instant_at(config.ready_delay_ms);
    let idle = start + Duration::from_secs(24 * 60 * 60);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let waiting_for_ready = app.controller.gate_phase() == urlsync_engine::GatePhase::Buffering;
        let deadline = app.controller.next_deadline().map(|ts| clock.instant_at(ts));

        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    tracing::info!("stdin closed, shutting down");
                    break;
                };
                if !handle_line(&app, &line) {
                    break;
                }
            }
            _ = sleep_until(ready_at), if waiting_for_ready => {
                app.ready()?;
            }
            _ = sleep_until(deadline.unwrap_or(idle)), if deadline.is_some() => {
                app.controller.tick();
            }
        }
    }

    app.controller.dispose();
    Ok(())
}

/// Run one input line. Returns false when the host should exit.
fn handle_line(app: &App, line: &str) -> bool {
    let outcome = Command::parse(line).and_then(|command| match command {
        Some(command) => app.execute(command).map(Some),
        None => Ok(None),
    });

    match outcome {
        Ok(Some(Flow::Continue(reply))) => print_reply(&reply),
        Ok(Some(Flow::Help)) => println!("{}", HELP),
        Ok(Some(Flow::Quit)) => return false,
        Ok(None) => {}
        Err(e) => {
            tracing::warn!(error = %e, "command failed");
            print_reply(&Reply::Error {
                message: e.to_string(),
            });
        }
    }
    true
}

fn print_reply(reply: &Reply) {
    match serde_json::to_string(reply) {
        Ok(json) => println!("{}", json),
        Err(e) => tracing::error!("Failed to serialize reply: {}", e),
    }
}
