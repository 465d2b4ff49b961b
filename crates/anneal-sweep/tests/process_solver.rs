//! `ProcessSolver` against real executables.
//!
//! Scripts are written once and run from a single test so no script is
//! executed while another test still holds it open for writing.
#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anneal_sweep::error::SolverInvocationError;
use anneal_sweep::instance::CoolingStrategy;
use anneal_sweep::parser::OutputParser;
use anneal_sweep::solver::{ProcessSolver, Solver};
use anneal_sweep::sweep::SweepDriver;
use anneal_sweep::SweepConfig;

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    let mut perms = fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).unwrap();
    path
}

#[tokio::test]
async fn test_process_solver_outcomes() {
    let dir = tempfile::tempdir().unwrap();
    let instance = dir.path().join("input.csv");
    fs::write(&instance, "2,1,Cauchy,2,20\n5,7\n").unwrap();

    // Echoes its arguments so the invocation shape is visible in stdout
    let echo = write_script(
        dir.path(),
        "echo_solver.sh",
        r#"echo "args: $*"
echo "Best solution found (time 0.5 s):"
echo "Schedule (M=1, N=2): (K1)=12""#,
    );
    let sleeper = write_script(dir.path(), "slow_solver.sh", "sleep 5");
    let failing = write_script(dir.path(), "failing_solver.sh", "echo broken >&2\nexit 3");

    // Success, with and without a processor override
    let solver = ProcessSolver::new(&echo).with_timeout(Some(Duration::from_secs(10)));
    let output = solver.run(&instance, None).await.unwrap();
    assert!(output
        .stdout
        .contains(&format!("args: file {}", instance.display())));
    let record = OutputParser::default().parse(&output.stdout).unwrap();
    assert_eq!(record.final_cost, 12.0);
    assert_eq!(record.reported_time, 0.5);

    let output = solver.run(&instance, Some(6)).await.unwrap();
    assert!(output
        .stdout
        .contains(&format!("args: file {} 6", instance.display())));

    // Non-zero exit carries the status and stderr
    let err = ProcessSolver::new(&failing)
        .run(&instance, None)
        .await
        .unwrap_err();
    match err {
        SolverInvocationError::NonZeroExit { code, stderr } => {
            assert_eq!(code, Some(3));
            assert_eq!(stderr, "broken");
        }
        other => panic!("expected non-zero exit, got {:?}", other),
    }

    // Missing executable
    let err = ProcessSolver::new(dir.path().join("no_such_solver"))
        .run(&instance, None)
        .await
        .unwrap_err();
    assert!(matches!(err, SolverInvocationError::NotFound { .. }));

    // Timeout
    let err = ProcessSolver::new(&sleeper)
        .with_timeout(Some(Duration::from_millis(200)))
        .run(&instance, None)
        .await
        .unwrap_err();
    assert!(matches!(err, SolverInvocationError::Timeout { .. }));

    // Full sweep through the real process boundary
    let config = SweepConfig {
        solver: echo.clone(),
        instance_path: dir.path().join("sweep_input.csv"),
        job_counts: vec![4],
        processor_counts: vec![1],
        cooling_strategies: vec![CoolingStrategy::Mixed],
        repeat_count: 2,
        seed: Some(1),
        ..Default::default()
    };
    let solver = config.process_solver();
    let report = SweepDriver::new(config, &solver)
        .run()
        .await
        .unwrap();
    let row = report.table.cell_rows().next().unwrap();
    assert_eq!(row.cost, 12.0);
    assert_eq!(row.time, 0.5);
}
