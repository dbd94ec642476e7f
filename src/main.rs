use prepkitd::config::DaemonConfig;
use prepkitd::ipc;
use std::io::{self, BufRead, Write};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn init_tracing(default_filter: &str) {
    // stdout carries the protocol; logs go to stderr.
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(true)
        .init();
}

fn main() -> anyhow::Result<()> {
    let config = DaemonConfig::load()?;
    init_tracing(&config.log_filter);
    info!(version = env!("CARGO_PKG_VERSION"), "prepkitd starting");

    let mut state = ipc::AppState::default();
    if let Some(workspace) = config.workspace.as_deref() {
        // Serve without a workspace; workspace.select can still open one.
        if let Err(e) = state.open_workspace(workspace) {
            error!(workspace = %workspace.display(), "failed to open configured workspace: {e:?}");
        }
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let resp = match serde_json::from_str::<ipc::Request>(&line) {
            Ok(req) => ipc::handle_request(&mut state, req),
            // No id to reply with.
            Err(e) => ipc::bad_json(e.to_string()),
        };
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }

    info!("stdin closed; exiting");
    Ok(())
}
