//! Simulation producer: integrate Gray–Scott and stream volumes.

use std::process::ExitCode;

use clap::Parser;
use tracing::info;

use coral_cli::{collect_group_results, init_tracing, spawn_contact_monitor, stream_config};
use coral_comm::Group;
use coral_engine::{run_simulation, EngineError, SimConfig};
use coral_stream::contact::contact_path;
use coral_stream::{CollectiveWriter, SstOut, StepSink};

/// Distributed Gray–Scott simulation streaming each output step.
#[derive(Parser, Debug)]
#[command(name = "coral-sim", version)]
struct Args {
    /// Cubic grid extent along each axis.
    #[arg(default_value_t = 128)]
    grid_size: usize,

    /// Integrator steps to run.
    #[arg(default_value_t = 10_000)]
    total_steps: u64,

    /// Emit a streaming step every this many integrator steps.
    #[arg(default_value_t = 100)]
    output_interval: u64,

    /// Rendezvous contact name; the writer advertises `<name>.sst`.
    #[arg(default_value = "gs-simulation")]
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
    let config = SimConfig::cubic(args.grid_size, args.total_steps, args.output_interval);
    let fatal = |e: EngineError| format!("rank 0: {e}");
    config.validate().map_err(fatal)?;
    // Fail before rendezvous when the decomposition cannot work at all.
    validate_decomposition(&config, args.ranks).map_err(fatal)?;

    info!(
        grid = args.grid_size,
        total_steps = args.total_steps,
        output_interval = args.output_interval,
        ranks = args.ranks,
        contact = %args.contact,
        "starting producer"
    );

    let contact = contact_path(&args.contact);
    let monitor = spawn_contact_monitor(contact.clone());
    let out = SstOut::open(&contact, &stream_config(args.open_timeout_secs))
        .map_err(|e| format!("rank 0: {e}"))?;
    let _ = monitor.join();

    let writer = CollectiveWriter::new(out, args.ranks);
    let results = Group::run(args.ranks, |comm| {
        let summary = run_simulation(&comm, &config, &writer)?;
        writer.close()?;
        Ok::<_, EngineError>(summary)
    });
    let summaries = collect_group_results(results)?;

    info!(
        outputs = summaries[0].outputs,
        steps = summaries[0].steps,
        "simulation complete"
    );
    Ok(())
}

/// Validate the decomposition on rank 0 before opening the transport.
fn validate_decomposition(config: &SimConfig, ranks: u32) -> Result<(), EngineError> {
    use coral_core::Rank;
    coral_grid::GridLayout::new(Rank(0), ranks, config.nz, config.ny, config.nx)?;
    Ok(())
}
