use crate::common::ModelHarness;

#[test]
fn parallel_join_waits_for_every_branch() {
    let mut h = ModelHarness::new(
        "1 Start(U,[1.0],0.0)\n\
         2 Task(U,[0.0])\n\
         3 Task(U,[5.0])\n\
         4 AndGate()\n\
         5 End()\n\
         1->2;1->3;2->4;3->4;4->5\n",
    );
    h.start_and_run();
    // the fast branch reached the join at 0, the slow one at 5
    assert_eq!(h.processed(5), 1.0);
    assert_eq!(h.visit(1, 5).arrived, Some(5.0));
    assert_eq!(h.visit(1, 4).completions, 2);
    // the join counts completions, not releases
    assert_eq!(h.processed(4), 2.0);
}

#[test]
fn single_input_join_is_a_pass_through() {
    let mut h =
        ModelHarness::new("1 Start(U,[1.0],0.0)\n2 AndGate()\n3 End()\n1->2;2->3\n");
    h.start_and_run();
    assert_eq!(h.processed(3), 1.0);
    assert_eq!(h.visit(1, 3).arrived, Some(0.0));
}

#[test]
fn join_quota_recycles_for_later_waves() {
    let mut h = ModelHarness::new(
        "1 Start(U,[10.0],-2.0)\n\
         2 Task(U,[0.0])\n\
         3 Task(U,[5.0])\n\
         4 AndGate()\n\
         5 End()\n\
         1->2;1->3;2->4;3->4;4->5\n",
    );
    h.start_and_run();
    assert_eq!(h.processed(5), 2.0);
    assert_eq!(h.visit(1, 5).arrived, Some(5.0));
    assert_eq!(h.visit(2, 5).arrived, Some(15.0));
    assert_eq!(h.visit(1, 4).completions, 2);
    assert_eq!(h.visit(2, 4).completions, 2);
}
