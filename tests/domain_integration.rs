//! Domain planning integration tests

use std::rc::Rc;

use stratagem::context::{Context, ContextState};
use stratagem::core::error::HtnError;
use stratagem::core::types::PropertyId;
use stratagem::decomposition::DecompositionStatus;
use stratagem::domain::{Domain, DomainBuilder};
use stratagem::task::{ActionEffect, EffectScope, FuncCondition, Plan, Task, TaskRef, TaskStatus};
use stratagem::world::FixedWorldState;

const DONE: PropertyId = PropertyId(0);
const HAS_A: PropertyId = PropertyId(1);
const HAS_B: PropertyId = PropertyId(2);
const HAS_C: PropertyId = PropertyId(3);

fn init_context() -> Context {
    let mut ctx = Context::new(Box::new(FixedWorldState::new(4)));
    ctx.init();
    ctx
}

fn add_condition(task: &TaskRef, name: &str, func: impl Fn(&mut Context) -> bool + 'static) {
    task.borrow_mut()
        .add_condition(Rc::new(FuncCondition::new(name, func)))
        .unwrap();
}

fn add_effect(task: &TaskRef, name: &str, scope: EffectScope, id: PropertyId, value: u8) {
    task.borrow_mut()
        .add_effect(Rc::new(ActionEffect::new(name, scope, move |ctx, s| {
            ctx.set_state(id, value, true, s)
        })))
        .unwrap();
}

fn plan_names(plan: &Plan) -> Vec<String> {
    plan.iter().map(|t| t.borrow().name.clone()).collect()
}

#[test]
fn test_domain_root_carries_domain_name() {
    let domain = Domain::new("Test");
    assert_eq!(domain.name(), "Test");
    assert!(domain.root().borrow().children().unwrap().is_empty());
}

#[test]
fn test_add_sets_parent_back_edge() {
    let mut domain = Domain::new("Test");
    let selector = Task::selector("Choose");
    domain.add_to_root(&selector).unwrap();

    let parent = selector.borrow().parent().unwrap();
    assert!(Rc::ptr_eq(&parent, domain.root()));
}

#[test]
fn test_add_rejects_self_parenting_and_cycles() {
    let mut domain = Domain::new("Test");
    let outer = Task::selector("Outer");
    let inner = Task::selector("Inner");
    domain.add_to_root(&outer).unwrap();
    domain.add(&outer, &inner).unwrap();

    assert!(domain.add(&outer, &outer).is_err());
    assert!(domain.add(&inner, &outer).is_err());
}

#[test]
fn test_find_plan_requires_initialized_context() {
    let domain = Domain::new("Test");
    let mut ctx = Context::new(Box::new(FixedWorldState::new(4)));
    assert!(matches!(
        domain.find_plan(&mut ctx),
        Err(HtnError::ContextUninitialized)
    ));
}

#[test]
fn test_find_plan_with_no_tasks_is_rejected() {
    let domain = Domain::new("Test");
    let mut ctx = init_context();

    let (status, plan) = domain.find_plan(&mut ctx).unwrap();
    assert_eq!(status, DecompositionStatus::Rejected);
    assert!(plan.is_empty());
}

#[test]
fn test_find_plan_leaves_context_in_executing_state() {
    let domain = Domain::new("Test");
    let mut ctx = init_context();
    domain.find_plan(&mut ctx).unwrap();
    assert_eq!(ctx.context_state(), ContextState::Executing);
}

#[test]
fn test_find_plan_produces_primitive_plan() {
    let mut domain = Domain::new("Test");
    let mut ctx = init_context();

    let selector = Task::selector("Choose");
    let action = Task::primitive("Walk");
    domain.add_to_root(&selector).unwrap();
    domain.add(&selector, &action).unwrap();

    let (status, plan) = domain.find_plan(&mut ctx).unwrap();
    assert_eq!(status, DecompositionStatus::Succeeded);
    assert_eq!(plan_names(&plan), vec!["Walk"]);
    assert_eq!(ctx.mtr(), &[0]);
}

#[test]
fn test_consecutive_find_plan_calls_agree() {
    let mut domain = Domain::new("Test");
    let mut ctx = init_context();

    let selector = Task::selector("Choose");
    let action = Task::primitive("Walk");
    domain.add_to_root(&selector).unwrap();
    domain.add(&selector, &action).unwrap();

    let (first_status, first_plan) = domain.find_plan(&mut ctx).unwrap();
    let (second_status, second_plan) = domain.find_plan(&mut ctx).unwrap();
    assert_eq!(first_status, second_status);
    assert_eq!(plan_names(&first_plan), plan_names(&second_plan));
}

// ------------------------------------------------------------ effect scopes

#[test]
fn test_find_plan_commits_only_permanent_changes() {
    let mut domain = Domain::new("Test");
    let mut ctx = init_context();

    let sequence = Task::sequence("Steps");
    let one = Task::primitive("One");
    add_effect(&one, "SetA", EffectScope::PlanOnly, HAS_A, 1);
    let two = Task::primitive("Two");
    add_effect(&two, "SetB", EffectScope::PlanAndExecute, HAS_B, 1);
    let three = Task::primitive("Three");
    add_effect(&three, "SetC", EffectScope::Permanent, HAS_C, 1);

    domain.add_to_root(&sequence).unwrap();
    domain.add(&sequence, &one).unwrap();
    domain.add(&sequence, &two).unwrap();
    domain.add(&sequence, &three).unwrap();

    let (status, plan) = domain.find_plan(&mut ctx).unwrap();
    assert_eq!(status, DecompositionStatus::Succeeded);
    assert_eq!(plan.len(), 3);
    assert_eq!(ctx.change_depth().unwrap(), vec![0, 0, 0, 0]);
    assert_eq!(ctx.world_state().get(HAS_A), 0);
    assert_eq!(ctx.world_state().get(HAS_B), 0);
    assert_eq!(ctx.world_state().get(HAS_C), 1);
}

#[test]
fn test_failed_plan_discards_all_tentative_changes() {
    let mut domain = Domain::new("Test");
    let mut ctx = init_context();

    let sequence = Task::sequence("Steps");
    let one = Task::primitive("One");
    add_effect(&one, "DropA", EffectScope::Permanent, HAS_A, 0);
    let gate = Task::selector("Gate");
    let blocked = Task::primitive("Blocked");
    add_condition(&blocked, "NeedsDone", |ctx| ctx.has_state(DONE, 1));

    domain.add_to_root(&sequence).unwrap();
    domain.add(&sequence, &one).unwrap();
    domain.add(&sequence, &gate).unwrap();
    domain.add(&gate, &blocked).unwrap();

    ctx.set_state(HAS_A, 1, false, EffectScope::Permanent);

    let (status, plan) = domain.find_plan(&mut ctx).unwrap();
    assert_eq!(status, DecompositionStatus::Rejected);
    assert!(plan.is_empty());
    assert_eq!(ctx.change_depth().unwrap(), vec![0, 0, 0, 0]);
    assert_eq!(ctx.world_state().get(HAS_A), 1);
}

// ------------------------------------------------------------ MTR equality

#[test]
fn test_find_plan_matching_running_plan_is_rejected() {
    let mut domain = Domain::new("Test");
    let mut ctx = init_context();
    ctx.last_mtr_mut().push(1);

    let blocked = Task::sequence("Blocked");
    let step = Task::primitive("Step");
    add_condition(&step, "NeedsDone", |ctx| ctx.has_state(DONE, 1));
    let open = Task::sequence("Open");
    let walk = Task::primitive("Walk");

    domain.add_to_root(&blocked).unwrap();
    domain.add(&blocked, &step).unwrap();
    domain.add_to_root(&open).unwrap();
    domain.add(&open, &walk).unwrap();

    // The only decomposable branch is the one already running.
    let (status, plan) = domain.find_plan(&mut ctx).unwrap();
    assert_eq!(status, DecompositionStatus::Rejected);
    assert!(plan.is_empty());
    assert_eq!(ctx.mtr(), &[1]);
}

#[test]
fn test_find_plan_better_branch_beats_running_plan() {
    let mut domain = Domain::new("Test");
    let mut ctx = init_context();
    ctx.last_mtr_mut().push(1);
    ctx.set_state(DONE, 1, false, EffectScope::Permanent);

    let preferred = Task::sequence("Preferred");
    let step = Task::primitive("Step");
    add_condition(&step, "NeedsDone", |ctx| ctx.has_state(DONE, 1));
    let fallback = Task::sequence("Fallback");
    let walk = Task::primitive("Walk");

    domain.add_to_root(&preferred).unwrap();
    domain.add(&preferred, &step).unwrap();
    domain.add_to_root(&fallback).unwrap();
    domain.add(&fallback, &walk).unwrap();

    let (status, plan) = domain.find_plan(&mut ctx).unwrap();
    assert_eq!(status, DecompositionStatus::Succeeded);
    assert_eq!(plan_names(&plan), vec!["Step"]);
    assert_eq!(ctx.mtr(), &[0]);
}

// ------------------------------------------------------------ pause & resume

fn pause_domain() -> (Domain, TaskRef) {
    let mut domain = Domain::new("Test");
    let sequence = Task::sequence("Steps");
    let a = Task::primitive("A");
    let pause = Task::pause_plan();
    let b = Task::primitive("B");
    domain.add_to_root(&sequence).unwrap();
    domain.add(&sequence, &a).unwrap();
    domain.add(&sequence, &pause).unwrap();
    domain.add(&sequence, &b).unwrap();
    (domain, sequence)
}

#[test]
fn test_pause_plan_returns_partial_with_continuation() {
    let (domain, sequence) = pause_domain();
    let mut ctx = init_context();

    let (status, plan) = domain.find_plan(&mut ctx).unwrap();
    assert_eq!(status, DecompositionStatus::Partial);
    assert_eq!(plan_names(&plan), vec!["A"]);
    assert!(ctx.has_paused_partial_plan());
    assert_eq!(ctx.partial_plan_queue().len(), 1);

    let entry = ctx.partial_plan_queue().front().unwrap();
    assert!(Rc::ptr_eq(&entry.task, &sequence));
    assert_eq!(entry.next_index, 2);
}

#[test]
fn test_second_find_plan_continues_paused_plan() {
    let (domain, _) = pause_domain();
    let mut ctx = init_context();

    domain.find_plan(&mut ctx).unwrap();
    let (status, plan) = domain.find_plan(&mut ctx).unwrap();
    assert_eq!(status, DecompositionStatus::Succeeded);
    assert_eq!(plan_names(&plan), vec!["B"]);
    assert!(!ctx.has_paused_partial_plan());
}

fn nested_pause_domain() -> (Domain, TaskRef, TaskRef) {
    // Outer sequence -> (selector -> (inner sequence with pause | Three)), Four
    let mut domain = Domain::new("Test");
    let outer = Task::sequence("Outer");
    let choose = Task::selector("Choose");
    let inner = Task::sequence("Inner");
    let one = Task::primitive("One");
    let pause = Task::pause_plan();
    let two = Task::primitive("Two");
    let three = Task::primitive("Three");
    let four = Task::primitive("Four");

    domain.add_to_root(&outer).unwrap();
    domain.add(&outer, &choose).unwrap();
    domain.add(&outer, &four).unwrap();
    domain.add(&choose, &inner).unwrap();
    domain.add(&choose, &three).unwrap();
    domain.add(&inner, &one).unwrap();
    domain.add(&inner, &pause).unwrap();
    domain.add(&inner, &two).unwrap();

    (domain, outer, inner)
}

#[test]
fn test_nested_pause_saves_inner_then_outer_frames() {
    let (domain, outer, inner) = nested_pause_domain();
    let mut ctx = init_context();

    let (status, plan) = domain.find_plan(&mut ctx).unwrap();
    assert_eq!(status, DecompositionStatus::Partial);
    assert_eq!(plan_names(&plan), vec!["One"]);
    assert_eq!(ctx.partial_plan_queue().len(), 2);

    let first = &ctx.partial_plan_queue()[0];
    assert!(Rc::ptr_eq(&first.task, &inner));
    assert_eq!(first.next_index, 2);

    let second = &ctx.partial_plan_queue()[1];
    assert!(Rc::ptr_eq(&second.task, &outer));
    assert_eq!(second.next_index, 1);
}

#[test]
fn test_resume_replays_inner_frame_then_outer_frame() {
    let (domain, _, _) = nested_pause_domain();
    let mut ctx = init_context();

    domain.find_plan(&mut ctx).unwrap();
    let (status, plan) = domain.find_plan(&mut ctx).unwrap();
    assert_eq!(status, DecompositionStatus::Succeeded);
    assert_eq!(plan_names(&plan), vec!["Two", "Four"]);
}

#[test]
fn test_multiple_nested_pauses_resume_in_order() {
    // Outer sequence: (selector -> inner1 with pause | Three), Four,
    // inner2 with pause, Seven.
    let mut domain = Domain::new("Test");
    let outer = Task::sequence("Outer");
    let choose = Task::selector("Choose");
    let inner1 = Task::sequence("Inner1");
    let inner2 = Task::sequence("Inner2");

    let one = Task::primitive("One");
    let two = Task::primitive("Two");
    let three = Task::primitive("Three");
    let four = Task::primitive("Four");
    let five = Task::primitive("Five");
    let six = Task::primitive("Six");
    let seven = Task::primitive("Seven");

    domain.add_to_root(&outer).unwrap();
    domain.add(&outer, &choose).unwrap();
    domain.add(&outer, &four).unwrap();
    domain.add(&outer, &inner2).unwrap();
    domain.add(&outer, &seven).unwrap();

    domain.add(&choose, &inner1).unwrap();
    domain.add(&choose, &three).unwrap();

    domain.add(&inner1, &one).unwrap();
    domain.add(&inner1, &Task::pause_plan()).unwrap();
    domain.add(&inner1, &two).unwrap();

    domain.add(&inner2, &five).unwrap();
    domain.add(&inner2, &Task::pause_plan()).unwrap();
    domain.add(&inner2, &six).unwrap();

    let mut ctx = init_context();

    let (status, plan) = domain.find_plan(&mut ctx).unwrap();
    assert_eq!(status, DecompositionStatus::Partial);
    assert_eq!(plan_names(&plan), vec!["One"]);

    let (status, plan) = domain.find_plan(&mut ctx).unwrap();
    assert_eq!(status, DecompositionStatus::Partial);
    assert_eq!(plan_names(&plan), vec!["Two", "Four", "Five"]);

    let (status, plan) = domain.find_plan(&mut ctx).unwrap();
    assert_eq!(status, DecompositionStatus::Succeeded);
    assert_eq!(plan_names(&plan), vec!["Six", "Seven"]);
}

#[test]
fn test_resumed_partial_plan_commits_its_effects() {
    let mut domain = Domain::new("Test");
    let sequence = Task::sequence("Steps");
    let a = Task::primitive("A");
    let pause = Task::pause_plan();
    let b = Task::primitive("B");
    add_effect(&b, "SetA", EffectScope::Permanent, HAS_A, 1);
    domain.add_to_root(&sequence).unwrap();
    domain.add(&sequence, &a).unwrap();
    domain.add(&sequence, &pause).unwrap();
    domain.add(&sequence, &b).unwrap();

    let mut ctx = init_context();
    domain.find_plan(&mut ctx).unwrap();
    let (status, _) = domain.find_plan(&mut ctx).unwrap();
    assert_eq!(status, DecompositionStatus::Succeeded);
    assert_eq!(ctx.world_state().get(HAS_A), 1);
    assert_eq!(ctx.change_depth().unwrap(), vec![0, 0, 0, 0]);
}

// ------------------------------------------------------------ slots

#[test]
fn test_slot_binds_and_clears_a_sub_domain() {
    let mut main = DomainBuilder::new("Main");
    main.sequence("Jobs")
        .unwrap()
        .slot(11)
        .unwrap()
        .end()
        .unwrap();
    let mut main = main.build().unwrap();

    let mut sub = DomainBuilder::new("Sub");
    sub.action("Fetch")
        .unwrap()
        .operator(|_| TaskStatus::Success)
        .unwrap()
        .end()
        .unwrap();
    let sub = sub.build().unwrap();

    let mut ctx = init_context();

    // Empty slot: nothing to decompose.
    let (status, _) = main.find_plan(&mut ctx).unwrap();
    assert_eq!(status, DecompositionStatus::Rejected);

    assert!(main.try_set_slot_domain(11, &sub));
    let (status, plan) = main.find_plan(&mut ctx).unwrap();
    assert_eq!(status, DecompositionStatus::Succeeded);
    assert_eq!(plan_names(&plan), vec!["Fetch"]);

    // Occupied slots refuse a second binding.
    assert!(!main.try_set_slot_domain(11, &sub));

    main.clear_slot(11);
    let (status, _) = main.find_plan(&mut ctx).unwrap();
    assert_eq!(status, DecompositionStatus::Rejected);
}

#[test]
fn test_unknown_slot_id_cannot_be_bound() {
    let mut main = Domain::new("Main");
    let sub = Domain::new("Sub");
    assert!(!main.try_set_slot_domain(99, &sub));
}

#[test]
fn test_duplicate_slot_id_in_domain_fails() {
    let mut domain = Domain::new("Test");
    let selector = Task::selector("Choose");
    domain.add_to_root(&selector).unwrap();

    let first = Task::slot("Slot 3", 3);
    let second = Task::slot("Slot 3 again", 3);
    domain.add(&selector, &first).unwrap();
    assert!(matches!(
        domain.add(&selector, &second),
        Err(HtnError::DuplicateSlot(3))
    ));
}

// ------------------------------------------------------------ splice

#[test]
fn test_spliced_sub_domain_decomposes_in_place() {
    let mut sub = DomainBuilder::new("Sub");
    sub.sequence("Deliver")
        .unwrap()
        .action("Handoff")
        .unwrap()
        .operator(|_| TaskStatus::Success)
        .unwrap()
        .end()
        .unwrap()
        .end()
        .unwrap();
    let sub = sub.build().unwrap();

    let mut main = DomainBuilder::new("Main");
    main.sequence("Jobs")
        .unwrap()
        .action("Pickup")
        .unwrap()
        .operator(|_| TaskStatus::Success)
        .unwrap()
        .end()
        .unwrap()
        .splice(&sub)
        .unwrap()
        .end()
        .unwrap();
    let main = main.build().unwrap();

    let mut ctx = init_context();
    let (status, plan) = main.find_plan(&mut ctx).unwrap();
    assert_eq!(status, DecompositionStatus::Succeeded);
    assert_eq!(plan_names(&plan), vec!["Pickup", "Handoff"]);
}

// ------------------------------------------------------------ debug traces

#[test]
fn test_debug_mtr_traces_selector_choices() {
    let mut domain = Domain::new("Test");
    let mut ctx = init_context();
    ctx.set_debug_mtr(true);
    ctx.last_mtr_mut().push(0);

    let blocked = Task::sequence("Blocked");
    let step = Task::primitive("Step");
    add_condition(&step, "NeedsDone", |ctx| ctx.has_state(DONE, 1));
    let open = Task::sequence("Open");
    let walk = Task::primitive("Walk");

    domain.add_to_root(&blocked).unwrap();
    domain.add(&blocked, &step).unwrap();
    domain.add_to_root(&open).unwrap();
    domain.add(&open, &walk).unwrap();

    let (status, _) = domain.find_plan(&mut ctx).unwrap();
    assert_eq!(status, DecompositionStatus::Rejected);
    assert!(ctx
        .mtr_debug()
        .iter()
        .any(|entry| entry.starts_with("REPLAN FAIL")));
}
