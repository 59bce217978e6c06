//! Producer and consumer drivers over the file archive engine.

use std::path::Path;
use std::sync::{Arc, Mutex};

use coral_comm::Group;
use coral_engine::{run_consumer, run_simulation, EngineError, SimConfig};
use coral_stream::{
    ArchiveReader, ArchiveWriter, CollectiveReader, CollectiveWriter, RawSink, RawSource,
    StepRecord, StepSink, StepSource, StreamError, VarData,
};
use coral_test_utils::temp_path;

/// Records every committed step in memory.
#[derive(Clone, Default)]
struct MemorySink {
    steps: Arc<Mutex<Vec<StepRecord>>>,
}

impl RawSink for MemorySink {
    fn write_step(&mut self, step: StepRecord) -> Result<(), StreamError> {
        self.steps.lock().unwrap().push(step);
        Ok(())
    }
    fn finish(&mut self) -> Result<(), StreamError> {
        Ok(())
    }
}

fn read_archive(path: &Path) -> Vec<StepRecord> {
    let mut reader = ArchiveReader::open_path(path).unwrap();
    let mut steps = Vec::new();
    while let Some(step) = reader.next_step().unwrap() {
        steps.push(step);
    }
    steps
}

fn f64_data(step: &StepRecord, name: &str) -> Vec<f64> {
    match &step.vars[name].data {
        VarData::F64(values) => values.clone(),
        other => panic!("{name} is not f64 data: {other:?}"),
    }
}

fn i32_scalar(step: &StepRecord, name: &str) -> i32 {
    match &step.vars[name].data {
        VarData::I32(values) => values[0],
        other => panic!("{name} is not an i32 scalar: {other:?}"),
    }
}

/// Run a producer group into a memory sink and return the emitted steps.
fn produce_in_memory(ranks: u32, config: SimConfig) -> Vec<StepRecord> {
    let sink = MemorySink::default();
    let steps = Arc::clone(&sink.steps);
    let writer = CollectiveWriter::new(sink, ranks);
    let results = Group::run(ranks, |comm| {
        let summary = run_simulation(&comm, &config, &writer)?;
        writer.close()?;
        Ok::<_, EngineError>(summary)
    });
    for r in &results {
        r.as_ref().unwrap();
    }
    drop(writer);
    Arc::try_unwrap(steps).unwrap().into_inner().unwrap()
}

/// Run a producer group into an archive file.
fn produce_archive(path: &Path, ranks: u32, config: SimConfig) {
    let writer = CollectiveWriter::new(ArchiveWriter::create(path).unwrap(), ranks);
    let results = Group::run(ranks, |comm| {
        run_simulation(&comm, &config, &writer)?;
        writer.close()?;
        Ok::<_, EngineError>(())
    });
    for r in results {
        r.unwrap();
    }
}

#[test]
fn initial_state_smoke() {
    // totalSteps = 0, interval = 1: exactly one step carrying the seeded
    // initial condition.
    let steps = produce_in_memory(1, SimConfig::cubic(16, 0, 1));
    assert_eq!(steps.len(), 1);
    assert_eq!(i32_scalar(&steps[0], "step"), 0);

    let u = f64_data(&steps[0], "U");
    let v = f64_data(&steps[0], "V");
    assert_eq!(u.len(), 16 * 16 * 16);

    // radius = 16/10 = 1, so the perturbed cube is 3x3x3.
    let perturbed = u.iter().filter(|&&x| x == 0.5).count();
    assert_eq!(perturbed, 27);
    assert!(u.iter().all(|&x| x == 1.0 || x == 0.5));
    assert!(v.iter().all(|&x| x == 0.0 || x == 0.25));
    for (a, b) in u.iter().zip(&v) {
        assert_eq!(*a == 0.5, *b == 0.25, "seed cubes of U and V must agree");
    }
}

#[test]
fn emission_cadence_and_counters() {
    // Step 0 and the final step are both emitted; counters advance by the
    // output interval.
    let steps = produce_in_memory(4, SimConfig::cubic(32, 100, 50));
    assert_eq!(steps.len(), 3);
    let counters: Vec<i32> = steps.iter().map(|s| i32_scalar(s, "step")).collect();
    assert_eq!(counters, vec![0, 50, 100]);
    let indices: Vec<u64> = steps.iter().map(|s| s.index).collect();
    assert_eq!(indices, vec![0, 1, 2]);
}

#[test]
fn uneven_interval_still_emits_initial_step() {
    // 100 steps at interval 30 emits 0, 30, 60, 90: the count is
    // total/interval + 1 even when the final step is off-cadence.
    let steps = produce_in_memory(2, SimConfig::cubic(16, 100, 30));
    let counters: Vec<i32> = steps.iter().map(|s| i32_scalar(s, "step")).collect();
    assert_eq!(counters, vec![0, 30, 60, 90]);
}

#[test]
fn group_size_does_not_change_the_physics() {
    // The same simulation on 1 and on 4 participants must produce
    // bit-identical volumes: ghosts carry exactly the neighbour values the
    // single-participant run reads directly.
    let config = SimConfig::cubic(24, 60, 20);
    let serial = produce_in_memory(1, config);
    let parallel = produce_in_memory(4, config);

    assert_eq!(serial.len(), parallel.len());
    for (a, b) in serial.iter().zip(&parallel) {
        assert_eq!(f64_data(a, "U"), f64_data(b, "U"));
        assert_eq!(f64_data(a, "V"), f64_data(b, "V"));
        assert_eq!(i32_scalar(a, "step"), i32_scalar(b, "step"));
    }
}

#[test]
fn independent_runs_are_bit_identical() {
    // Two runs with identical configuration write byte-identical archives.
    let paths = [temp_path("det-a"), temp_path("det-b")];
    for path in &paths {
        produce_archive(path, 2, SimConfig::cubic(16, 0, 1));
    }
    let a = std::fs::read(&paths[0]).unwrap();
    let b = std::fs::read(&paths[1]).unwrap();
    assert_eq!(a, b);
    for path in &paths {
        std::fs::remove_file(path).unwrap();
    }
}

#[test]
fn consumer_retiles_across_a_different_group_size() {
    // Produce with 4 participants, consume with 3: the consumer's archive
    // must reproduce the producer's steps exactly.
    let produced = temp_path("retile-src");
    let received = temp_path("retile-dst");

    produce_archive(&produced, 4, SimConfig::cubic(32, 100, 50));

    {
        let source = CollectiveReader::new(ArchiveReader::open_path(&produced).unwrap(), 3);
        let sink = CollectiveWriter::new(ArchiveWriter::create(&received).unwrap(), 3);
        let results = Group::run(3, |comm| {
            let summary = run_consumer(&comm, &source, &sink)?;
            source.close()?;
            sink.close()?;
            Ok::<_, EngineError>(summary)
        });
        let summaries: Vec<_> = results.into_iter().map(|r| r.unwrap()).collect();
        assert!(summaries.iter().all(|s| s.steps == 3));
        let metrics = summaries[0].metrics.as_ref().unwrap();
        assert_eq!(metrics.rows().len(), 3);
        assert!(summaries[1].metrics.is_none());
    }

    assert_eq!(read_archive(&produced), read_archive(&received));
    std::fs::remove_file(&produced).unwrap();
    std::fs::remove_file(&received).unwrap();
}
