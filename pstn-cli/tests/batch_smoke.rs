//! End-to-end smoke test: load a small PSTN document from disk, drive it
//! through the batch runner, and confirm the CSV output gets a header plus
//! one row per named instance.

use std::fs;

use pstn_cli::config::{DispatchStrategy, SimulationConfigBuilder};
use pstn_cli::driver;
use pstn_core::ExecutionStrategy;

const DOCUMENT: &str = r#"{
    "instances": [
        {
            "two_agent_sync": [
                {"type": "controllable", "start_event_name": "Z", "end_event_name": "A_start",
                 "properties": {"lb": 0.0, "ub": 0.0}},
                {"type": "uncontrollable_probabilistic", "start_event_name": "A_start", "end_event_name": "A_end",
                 "properties": {"distribution": {"type": "gaussian", "mean": 5.0, "variance": 1.0}}},
                {"type": "controllable", "start_event_name": "Z", "end_event_name": "B_start",
                 "properties": {"lb": 0.0, "ub": 0.0}},
                {"type": "uncontrollable_probabilistic", "start_event_name": "B_start", "end_event_name": "B_end",
                 "properties": {"distribution": {"type": "gaussian", "mean": 5.0, "variance": 1.0}}},
                {"type": "controllable", "start_event_name": "A_end", "end_event_name": "B_end",
                 "properties": {"lb": -0.5, "ub": 0.5}}
            ]
        }
    ]
}"#;

#[test]
fn driver_run_writes_one_csv_row_per_named_instance() {
    let dir = tempfile::tempdir().expect("tempdir creation succeeds");
    let input_path = dir.path().join("two_agent_sync.json");
    fs::write(&input_path, DOCUMENT).expect("writing the fixture succeeds");
    let output_path = dir.path().join("results.csv");

    let config = SimulationConfigBuilder::new()
        .with_threads(2)
        .with_samples(5)
        .with_strategy(DispatchStrategy::Single(ExecutionStrategy::Early))
        .with_seed(Some(42))
        .with_output(Some(output_path.clone()))
        .with_live_progress(false)
        .with_inputs(vec![input_path])
        .build()
        .expect("configuration is valid");

    let summaries = driver::run(&config).expect("batch runs to completion");
    assert_eq!(summaries.len(), 1);
    assert!(summaries[0].stn_path().ends_with("two_agent_sync"));
    assert!((0.0..=1.0).contains(&summaries[0].robustness()));

    let contents = fs::read_to_string(&output_path).expect("reading the csv succeeds");
    let mut lines = contents.lines();
    let header = lines.next().expect("header line is present");
    assert!(header.starts_with("execution,robustness,threads"));
    assert_eq!(lines.count(), 1, "exactly one data row is written");
}

#[test]
fn driver_run_appends_without_rewriting_the_header() {
    let dir = tempfile::tempdir().expect("tempdir creation succeeds");
    let input_path = dir.path().join("two_agent_sync.json");
    fs::write(&input_path, DOCUMENT).expect("writing the fixture succeeds");
    let output_path = dir.path().join("results.csv");

    let build = || {
        SimulationConfigBuilder::new()
            .with_threads(1)
            .with_samples(3)
            .with_strategy(DispatchStrategy::Single(ExecutionStrategy::Early))
            .with_seed(Some(1))
            .with_output(Some(output_path.clone()))
            .with_live_progress(false)
            .with_inputs(vec![input_path.clone()])
            .build()
            .expect("configuration is valid")
    };

    driver::run(&build()).expect("first batch runs");
    driver::run(&build()).expect("second batch runs");

    let contents = fs::read_to_string(&output_path).expect("reading the csv succeeds");
    let header_count = contents
        .lines()
        .filter(|line| line.starts_with("execution,robustness,threads"))
        .count();
    assert_eq!(header_count, 1, "the header is written only once");
    assert_eq!(contents.lines().count(), 3, "one header row plus two data rows");
}
