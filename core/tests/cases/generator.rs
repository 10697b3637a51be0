use crate::common::ModelHarness;

#[test]
fn negative_horizon_emits_an_exact_count() {
    let mut h = ModelHarness::new("1 Start(U,[4.0],-10.0)\n2 End()\n1->2\n");
    h.start_and_run();
    assert_eq!(h.processed(1), 10.0);
    assert_eq!(h.processed(2), 10.0);
    assert_eq!(h.ctx.token_count(), 10);
    // degenerate uniform interarrival: the k-th token appears at 4(k-1)
    assert_eq!(h.visit(1, 1).arrived, Some(0.0));
    assert_eq!(h.visit(10, 1).arrived, Some(36.0));
}

#[test]
fn positive_horizon_is_a_deadline_on_the_next_activation() {
    let mut h = ModelHarness::new("1 Start(U,[4.0],9.0)\n2 End()\n1->2\n");
    h.start_and_run();
    // activations at 0, 4 and 8; the next slot (12) is past the deadline
    assert_eq!(h.processed(2), 3.0);
    assert_eq!(h.sim.time, 8.0);
}

#[test]
fn zero_horizon_fires_once() {
    let mut h = ModelHarness::new("1 Start(U,[4.0],0.0)\n2 End()\n1->2\n");
    h.start_and_run();
    assert_eq!(h.processed(2), 1.0);
    assert_eq!(h.sim.time, 0.0);
}

#[test]
fn construction_script_runs_before_the_first_token() {
    let mut h = ModelHarness::new(
        "1 Start(U,[1.0],0.0,\"S.ceiling=7\")\n\
         2 Task(U,[S.ceiling,S.ceiling])\n\
         3 End()\n\
         1->2;2->3\n",
    );
    h.start_and_run();
    assert_eq!(h.scenario_num("S.ceiling"), Some(7.0));
    // the task's delay was sampled against the primed scenario
    assert_eq!(h.visit(1, 2).ended, Some(7.0));
}

#[test]
fn source_stamps_all_three_times_at_emission() {
    let mut h = ModelHarness::new("1 Start(U,[1.0],0.0)\n2 End()\n1->2\n");
    h.start_and_run();
    let v = h.visit(1, 1);
    assert_eq!(v.arrived, Some(0.0));
    assert_eq!(v.begun, Some(0.0));
    assert_eq!(v.ended, Some(0.0));
}
