use crate::common::ModelHarness;

#[test]
fn cycle_list_fires_on_the_next_boundary() {
    // the token lands at t=4, before the cycle's origin at 10; the first
    // boundary is the origin itself
    let mut h = ModelHarness::new(
        "1 Start(U,[1.0],0.0)\n\
         2 Task(U,[4.0])\n\
         3 Timer([3.0,10.0])\n\
         4 End()\n\
         1->2;2->3;3->4\n",
    );
    h.start_and_run();
    let v = h.visit(1, 3);
    assert_eq!(v.arrived, Some(4.0));
    assert_eq!(v.ended, Some(10.0));
    assert_eq!(h.visit(1, 4).arrived, Some(10.0));
}

#[test]
fn cycle_without_origin_starts_at_zero() {
    // boundaries at 0, 5, 10, ...: an arrival at t=4 waits for 5
    let mut h = ModelHarness::new(
        "1 Start(U,[1.0],0.0)\n\
         2 Task(U,[4.0])\n\
         3 Timer([5.0])\n\
         4 End()\n\
         1->2;2->3;3->4\n",
    );
    h.start_and_run();
    assert_eq!(h.visit(1, 3).ended, Some(5.0));
}

#[test]
fn arrival_on_a_boundary_passes_immediately() {
    let mut h = ModelHarness::new(
        "1 Start(U,[1.0],0.0)\n\
         2 Task(U,[5.0])\n\
         3 Timer([5.0])\n\
         4 End()\n\
         1->2;2->3;3->4\n",
    );
    h.start_and_run();
    assert_eq!(h.visit(1, 3).ended, Some(5.0));
    assert_eq!(h.sim.time, 5.0);
}

#[test]
fn fixed_delay_counts_from_arrival_not_from_service() {
    // one lane: the second token queues behind the first, but its six units
    // run from its own arrival, so it leaves one unit after the first
    let mut h =
        ModelHarness::new("1 Start(U,[1.0],-2.0)\n2 Timer(U,[6.0])\n3 End()\n1->2;2->3\n");
    h.start_and_run();
    assert_eq!(h.visit(1, 2).ended, Some(6.0));
    let v = h.visit(2, 2);
    assert_eq!(v.arrived, Some(1.0));
    assert_eq!(v.begun, Some(1.0));
    assert_eq!(v.ended, Some(7.0));
}

#[test]
fn expression_delay_reads_the_scenario() {
    let mut h = ModelHarness::new(
        "1 Start(U,[1.0],0.0,\"S.wait=2.5\")\n\
         2 Timer(S.wait+S.wait)\n\
         3 End()\n\
         1->2;2->3\n",
    );
    h.start_and_run();
    assert_eq!(h.visit(1, 2).ended, Some(5.0));
}

#[test]
fn bare_timer_waits_one_unit() {
    let mut h = ModelHarness::new("1 Start(U,[1.0],0.0)\n2 Timer()\n3 End()\n1->2;2->3\n");
    h.start_and_run();
    assert_eq!(h.visit(1, 2).ended, Some(1.0));
}
