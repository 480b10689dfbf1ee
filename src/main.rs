mod catalog;
mod clock;
mod config;
mod context;
mod db;
mod enrollment;
mod error;
mod grading;
mod integrity;
mod ipc;
mod logging;
mod model;
mod stats;

use std::io::{self, BufRead, Write};

use clap::Parser;
use serde_json::json;

fn main() -> anyhow::Result<()> {
    let cfg = config::Config::parse();
    logging::init_tracing(&cfg.log_level);

    let mut state = ipc::AppState::new(cfg.clock(), cfg.unenroll_grades);
    if let Some(path) = cfg.workspace.as_deref() {
        state.open_workspace(path)?;
    }
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        unenroll_policy = ?cfg.unenroll_grades,
        fixed_now = ?cfg.fixed_now,
        "gradebookd ready"
    );

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(e) => {
                tracing::error!("stdin read failed: {e}");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let resp = match serde_json::from_str::<ipc::Request>(&line) {
            Ok(req) => ipc::handle_request(&mut state, req),
            Err(e) => {
                // No id to echo back.
                tracing::warn!("malformed request line: {e}");
                json!({
                    "id": null,
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() },
                })
            }
        };

        writeln!(stdout, "{}", resp)?;
        stdout.flush()?;
    }

    tracing::info!("stdin closed, shutting down");
    Ok(())
}
