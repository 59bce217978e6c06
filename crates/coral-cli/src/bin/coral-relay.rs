//! Relay: re-emit a recorded volume archive over the socket stream.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::info;

use coral_cli::{collect_group_results, init_tracing, spawn_contact_monitor, stream_config};
use coral_comm::Group;
use coral_engine::{run_relay, EngineError};
use coral_stream::contact::contact_path;
use coral_stream::{
    ArchiveReader, CollectiveReader, CollectiveWriter, SstOut, StepSink, StepSource,
};

/// Archive relay: replay a recorded volume stream to a remote consumer.
#[derive(Parser, Debug)]
#[command(name = "coral-relay", version)]
struct Args {
    /// Input volume archive.
    input: PathBuf,

    /// Rendezvous contact name; the writer advertises `<name>.sst`.
    #[arg(default_value = "data-transfer")]
    contact: String,

    /// Participants in this process.
    #[arg(long, default_value_t = 1)]
    ranks: u32,

    /// Rendezvous timeout in seconds.
    #[arg(long, default_value_t = 300)]
    open_timeout_secs: u64,
}

fn main() -> ExitCode {
    init_tracing();
    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("{message}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<(), String> {
    let fatal = |e: coral_stream::StreamError| format!("rank 0: {e}");

    info!(
        input = %args.input.display(),
        contact = %args.contact,
        ranks = args.ranks,
        "starting relay"
    );

    let source = CollectiveReader::new(
        ArchiveReader::open_path(&args.input).map_err(fatal)?,
        args.ranks,
    );

    // The writer's open gates on the consumer attaching; no interactive
    // confirmation is needed before the relay loop starts.
    let contact = contact_path(&args.contact);
    let monitor = spawn_contact_monitor(contact.clone());
    let out = SstOut::open(&contact, &stream_config(args.open_timeout_secs)).map_err(fatal)?;
    let _ = monitor.join();
    let writer = CollectiveWriter::new(out, args.ranks);

    let results = Group::run(args.ranks, |comm| {
        let summary = run_relay(&comm, &source, &writer)?;
        source.close()?;
        writer.close()?;
        Ok::<_, EngineError>(summary)
    });
    let summaries = collect_group_results(results)?;

    info!(steps = summaries[0].steps, "relay complete");
    Ok(())
}
