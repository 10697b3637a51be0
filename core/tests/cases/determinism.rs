use tokenflow_core::{run_once, RunOptions, RunReport, Runner};

const MODEL: &str = "# Branching flow\n\
    1 Start(E,[1.0],-40.0)\n\
    2 Task(U,[0.5,1.5])\n\
    3 XorGate()\n\
    4 End()\n\
    5 End()\n\
    1->2;2->3;3->4;3->5\n";

fn routes(r: &RunReport) -> Vec<(u64, u32)> {
    r.completed.iter().map(|t| (t.token, t.sink)).collect()
}

#[test]
fn one_seed_one_history() {
    let a = run_once(MODEL, 11).expect("model should compile");
    let b = run_once(MODEL, 11).expect("model should compile");
    let ja = serde_json::to_string(&a).expect("report should serialize");
    let jb = serde_json::to_string(&b).expect("report should serialize");
    assert_eq!(ja, jb);
}

#[test]
fn different_seeds_branch_differently() {
    let a = run_once(MODEL, 1).expect("model should compile");
    let b = run_once(MODEL, 2).expect("model should compile");
    assert_eq!(a.completed.len(), 40);
    assert_ne!(routes(&a), routes(&b));
}

#[test]
fn repetitions_share_one_stream_but_start_fresh() {
    let batch = Runner::new(MODEL)
        .with_options(RunOptions::default().with_repetitions(3).with_seed(5))
        .run()
        .expect("model should compile");
    assert_eq!(batch.runs.len(), 3);
    for (i, run) in batch.runs.iter().enumerate() {
        assert_eq!(run.run, i);
        assert_eq!(run.completed.len(), 40);
    }
    // the stream moves on, so repetitions are not verbatim replays
    assert_ne!(routes(&batch.runs[0]), routes(&batch.runs[1]));
    assert!(batch.min_elapsed() <= batch.mean_elapsed());
    assert!(batch.mean_elapsed() <= batch.max_elapsed());
}
