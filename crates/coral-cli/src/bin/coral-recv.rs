//! Consumer: receive streamed volumes, persist them, and report metrics.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use tracing::info;

use coral_cli::{collect_group_results, init_tracing, stream_config};
use coral_comm::Group;
use coral_engine::{run_consumer, EngineError};
use coral_stream::contact::{contact_path, looks_like_connection_string, write_contact_file};
use coral_stream::{
    ArchiveWriter, CollectiveReader, CollectiveWriter, SstIn, StepSink, StepSource,
};

/// Streamed-volume receiver with a persistent archive and transfer metrics.
#[derive(Parser, Debug)]
#[command(name = "coral-recv", version)]
struct Args {
    /// Rendezvous contact name, or an inline connection string (anything
    /// containing `0x` or `:`).
    #[arg(default_value = "data-transfer")]
    contact: String,

    /// Output archive path.
    #[arg(default_value = "received_data.bp")]
    output: PathBuf,

    /// Participants in this process.
    #[arg(long, default_value_t = 1)]
    ranks: u32,

    /// Contact discovery and connect timeout in seconds.
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

    // An inline connection string is materialized into a local contact
    // file before opening.
    let contact = if looks_like_connection_string(&args.contact) {
        let path = contact_path("receiver-connection");
        write_contact_file(&path, &args.contact).map_err(fatal)?;
        info!(contact = %path.display(), "materialized inline connection string");
        path
    } else {
        contact_path(&args.contact)
    };

    info!(
        contact = %contact.display(),
        output = %args.output.display(),
        ranks = args.ranks,
        "starting consumer"
    );

    let begin = Instant::now();
    let source = CollectiveReader::new(
        SstIn::open(&contact, &stream_config(args.open_timeout_secs)).map_err(fatal)?,
        args.ranks,
    );
    let sink = CollectiveWriter::new(
        ArchiveWriter::create(&args.output).map_err(fatal)?,
        args.ranks,
    );

    let results = Group::run(args.ranks, |comm| {
        let summary = run_consumer(&comm, &source, &sink)?;
        source.close()?;
        sink.close()?;
        Ok::<_, EngineError>(summary)
    });
    let mut summaries = collect_group_results(results)?;
    let root = summaries.remove(0);

    info!(steps = root.steps, "reception complete");
    if let Some(metrics) = root.metrics {
        let csv = PathBuf::from("transfer_metrics.csv");
        metrics
            .save(&csv)
            .map_err(|e| format!("rank 0: {e}"))?;
        if let Some(s) = metrics.summary(begin.elapsed().as_secs_f64()) {
            println!("steps received:      {}", s.steps);
            println!("total data:          {:.2} MB", s.total_megabytes);
            println!(
                "average throughput:  {:.2} MB/s ({:.2} Mbps)",
                s.average_throughput,
                s.average_throughput * 8.0
            );
            println!(
                "step throughput:     {:.2} .. {:.2} MB/s",
                s.min_throughput, s.max_throughput
            );
            println!(
                "step time:           {:.3} .. {:.3} s",
                s.min_seconds, s.max_seconds
            );
            println!("metrics written to:  {}", csv.display());
            println!("archive written to:  {}", args.output.display());
        }
    }
    Ok(())
}
