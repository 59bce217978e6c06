//! Shared plumbing for the coral binaries.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

use std::path::PathBuf;
use std::thread::JoinHandle;
use std::time::Duration;

use coral_engine::EngineError;
use coral_stream::contact::read_connection_string;
use coral_stream::StreamConfig;

/// Install the tracing subscriber, honouring `RUST_LOG` and defaulting to
/// `info`.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// The default stream configuration with an overridden open timeout.
pub fn stream_config(open_timeout_secs: u64) -> StreamConfig {
    StreamConfig {
        open_timeout: Duration::from_secs(open_timeout_secs),
        ..StreamConfig::default()
    }
}

/// Partition the per-participant results of a group run into values and
/// rank-prefixed failure lines.
///
/// # Errors
///
/// Returns `Err` with one line per failed participant, ready for stderr.
pub fn collect_group_results<T>(
    results: Vec<Result<T, EngineError>>,
) -> Result<Vec<T>, String> {
    let mut values = Vec::with_capacity(results.len());
    let mut failures = Vec::new();
    for (rank, result) in results.into_iter().enumerate() {
        match result {
            Ok(value) => values.push(value),
            Err(e) => failures.push(format!("rank {rank}: {e}")),
        }
    }
    if failures.is_empty() {
        Ok(values)
    } else {
        Err(failures.join("\n"))
    }
}

/// Watch for the contact file and print its connection string once.
///
/// The writer's open blocks on rendezvous, so a helper thread does the
/// watching; it gives up quietly after a few seconds and is joined before
/// the first streaming step closes.
pub fn spawn_contact_monitor(path: PathBuf) -> JoinHandle<()> {
    std::thread::spawn(move || {
        for _ in 0..30 {
            std::thread::sleep(Duration::from_millis(200));
            if let Ok(connection) = read_connection_string(&path) {
                println!("connection string: {connection}");
                println!("on the receiving machine run: coral-recv \"{connection}\"");
                return;
            }
        }
    })
}
