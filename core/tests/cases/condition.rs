use crate::common::ModelHarness;

#[test]
fn gate_opens_when_the_flag_flips() {
    let mut h = ModelHarness::new(
        "1 Start(U,[1.0],0.0,\"S.go=0\")\n\
         2 Condition(\"S.go>0\")\n\
         3 End()\n\
         4 Start(U,[1.0],0.0)\n\
         5 Task(U,[5.0],\"S.go=1\")\n\
         6 End()\n\
         1->2;2->3;4->5;5->6\n",
    );
    h.start_and_run();
    assert_eq!(h.processed(3), 1.0);
    let v = h.visit(1, 2);
    assert_eq!(v.arrived, Some(0.0));
    assert_eq!(v.ended, Some(5.0));
    assert_eq!(h.visit(1, 3).arrived, Some(5.0));
}

#[test]
fn later_arrivals_wait_behind_the_slot_holder() {
    let mut h = ModelHarness::new(
        "1 Start(U,[1.0],-3.0,\"S.go=0\")\n\
         2 Condition(\"S.go>0\")\n\
         3 End()\n\
         4 Start(U,[1.0],0.0)\n\
         5 Task(U,[5.0],\"S.go=1\")\n\
         6 End()\n\
         1->2;2->3;4->5;5->6\n",
    );
    h.start_and_run();
    // the slot holder got out; its successor took the slot just as the
    // events ran dry, and nothing was left to poll it
    assert_eq!(h.processed(3), 1.0);
    assert_eq!(h.busy(2), 1);
    assert_eq!(h.queued(2), 1);
}

#[test]
fn tail_clauses_run_only_on_release() {
    let mut h = ModelHarness::new(
        "1 Start(U,[1.0],0.0,\"S.go=0;S.opened=0\")\n\
         2 Condition(\"S.go>0;S.opened=S.opened+1\")\n\
         3 End()\n\
         4 Start(U,[2.0],-3.0)\n\
         5 Task(U,[0.0],\"S.go=A.n>2\")\n\
         6 End()\n\
         1->2;2->3;4->5;5->6\n",
    );
    h.start_and_run();
    // the readiness clause ran on every poll, the tail exactly once
    assert_eq!(h.scenario_num("S.opened"), Some(1.0));
    assert_eq!(h.processed(3), 1.0);
    assert_eq!(h.visit(1, 2).ended, Some(4.0));
}

#[test]
fn scriptless_condition_never_releases() {
    let mut h = ModelHarness::new(
        "1 Start(U,[1.0],0.0)\n2 Condition()\n3 End()\n1->2;2->3\n",
    );
    h.start_and_run();
    assert_eq!(h.processed(3), 0.0);
    assert_eq!(h.busy(2), 1);
}
