use crate::common::ModelHarness;

#[test]
fn exclusive_gate_defaults_to_a_fair_coin() {
    let mut h = ModelHarness::with_seed(
        "1 Start(U,[1.0],-200.0)\n2 XorGate()\n3 End()\n4 End()\n1->2;2->3;2->4\n",
        7,
    );
    h.start_and_run();
    let (a, b) = (h.processed(3), h.processed(4));
    assert_eq!(a + b, 200.0);
    assert!(a >= 60.0 && b >= 60.0, "skewed split: {a} vs {b}");
    // gates add no service time
    assert_eq!(h.sim.time, 199.0);
}

#[test]
fn truthy_verdict_takes_the_first_branch() {
    let mut h = ModelHarness::new(
        "1 Start(U,[1.0],-5.0)\n2 XorGate(\"=5>2\")\n3 End()\n4 End()\n1->2;2->3;2->4\n",
    );
    h.start_and_run();
    assert_eq!(h.processed(3), 5.0);
    assert_eq!(h.processed(4), 0.0);
}

#[test]
fn falsy_verdict_takes_the_second_of_two() {
    let mut h = ModelHarness::new(
        "1 Start(U,[1.0],-5.0)\n2 XorGate(\"=1>2\")\n3 End()\n4 End()\n1->2;2->3;2->4\n",
    );
    h.start_and_run();
    assert_eq!(h.processed(3), 0.0);
    assert_eq!(h.processed(4), 5.0);
}

#[test]
fn wide_gates_route_by_index() {
    let mut h = ModelHarness::new(
        "1 Start(U,[1.0],-6.0)\n\
         2 Task(U,[0.0],\"pick=A.n-1\")\n\
         3 XorGate(\"=pick%3\")\n\
         4 End()\n\
         5 End()\n\
         6 End()\n\
         1->2;2->3;3->4;3->5;3->6\n",
    );
    h.start_and_run();
    assert_eq!(h.processed(4), 2.0);
    assert_eq!(h.processed(5), 2.0);
    assert_eq!(h.processed(6), 2.0);
}

#[test]
fn out_of_range_indices_clamp_into_the_fan() {
    let mut h = ModelHarness::new(
        "1 Start(U,[1.0],0.0)\n2 XorGate(\"=9\")\n3 End()\n4 End()\n5 End()\n\
         1->2;2->3;2->4;2->5\n",
    );
    h.start_and_run();
    assert_eq!(h.processed(5), 1.0);

    let mut h = ModelHarness::new(
        "1 Start(U,[1.0],0.0)\n2 XorGate(\"=-9\")\n3 End()\n4 End()\n5 End()\n\
         1->2;2->3;2->4;2->5\n",
    );
    h.start_and_run();
    assert_eq!(h.processed(3), 1.0);
}

#[test]
fn plain_fan_out_broadcasts_one_token_everywhere() {
    let mut h = ModelHarness::new(
        "1 Start(U,[1.0],0.0)\n2 Task(U,[0.0])\n3 End()\n4 End()\n1->2;2->3;2->4\n",
    );
    h.start_and_run();
    assert_eq!(h.ctx.token_count(), 1);
    assert_eq!(h.processed(3), 1.0);
    assert_eq!(h.processed(4), 1.0);
    assert_eq!(h.sink_queue(3), vec![1]);
    assert_eq!(h.sink_queue(4), vec![1]);
}
