use crate::common::ModelHarness;

#[test]
fn terminal_stop_purges_the_source() {
    let mut h = ModelHarness::new(
        "1 Start(U,[1.0],-100.0)\n2 Task(U,[0.5])\n3 Terminate()\n1->2;2->3\n",
    );
    h.start_and_run();
    assert_eq!(h.ctx.token_count(), 1);
    assert_eq!(h.processed(3), 1.0);
    assert_eq!(h.sim.time, 0.5);
    assert_eq!(h.sim.pending(), 0);

    // the same flow with a plain end drains all hundred
    let mut h = ModelHarness::new(
        "1 Start(U,[1.0],-100.0)\n2 Task(U,[0.5])\n3 End()\n1->2;2->3\n",
    );
    h.start_and_run();
    assert_eq!(h.processed(3), 100.0);
}

#[test]
fn termination_spares_work_already_in_a_lane() {
    let mut h = ModelHarness::new(
        "1 Start(U,[1.0],-100.0)\n2 Task(U,[10.0])\n3 Terminate()\n1->2;2->3\n",
    );
    h.start_and_run();
    // the first completion at t=10 purged the source, so ten tokens exist;
    // the lane then drained its own backlog, one more stop each time
    assert_eq!(h.ctx.token_count(), 10);
    assert_eq!(h.processed(3), 10.0);
    assert_eq!(h.sim.time, 100.0);
}

#[test]
fn terminal_stop_runs_its_script_first() {
    let mut h =
        ModelHarness::new("1 Start(U,[1.0],0.0)\n2 Terminate(\"S.stopped=1\")\n1->2\n");
    h.start_and_run();
    assert_eq!(h.scenario_num("S.stopped"), Some(1.0));
    assert_eq!(h.processed(2), 1.0);
    assert_eq!(h.sink_queue(2), vec![1]);
}

#[test]
fn sinks_park_tokens_with_final_stamps() {
    let mut h = ModelHarness::new("1 Start(U,[2.0],-3.0)\n2 End()\n1->2\n");
    h.start_and_run();
    assert_eq!(h.sink_queue(2), vec![1, 2, 3]);
    let v = h.visit(2, 2);
    assert_eq!(v.arrived, Some(2.0));
    assert_eq!(v.begun, Some(2.0));
    assert_eq!(v.ended, Some(2.0));
}
