//! Selector decomposition - the first decomposable sub-task wins

use rand::Rng;

use super::{child_list, classify, decompose, ChildClass, Decomposition, DecompositionStatus};
use crate::context::Context;
use crate::core::error::Result;
use crate::task::{Plan, TaskRef};

/// Whether selector choices are recorded in the traversal record.
/// Random selection is not a branching point for replay and skips the
/// bookkeeping entirely.
#[derive(Clone, Copy, PartialEq)]
enum MtrTracking {
    Record,
    Skip,
}

pub(super) fn decompose_selector(
    task: &TaskRef,
    ctx: &mut Context,
    start_index: usize,
) -> Result<Decomposition> {
    let children = child_list(task);
    let mut plan = Plan::new();

    for index in start_index..children.len() {
        if ctx.log_decomposition() {
            let name = task.borrow().name.clone();
            let child = children[index].borrow().name.clone();
            ctx.log(&name, format!("candidate {}: {}", index, child));
        }

        // While a plan is still running, check whether a decomposition
        // through this index can possibly beat it. The running plan's
        // record holding a smaller index at this depth means it cannot.
        if !ctx.last_mtr().is_empty() && ctx.mtr().len() < ctx.last_mtr().len() {
            let depth = ctx.mtr().len();
            if ctx.last_mtr()[depth] < index as i32 {
                ctx.mtr_mut().push(-1);
                if ctx.debug_mtr() {
                    let child = children[index].borrow().name.clone();
                    ctx.mtr_debug.push(format!("REPLAN FAIL {}", child));
                }
                if ctx.log_decomposition() {
                    let name = task.borrow().name.clone();
                    ctx.log(&name, format!("rejected: depth {} loses to the running plan", depth));
                }
                return Ok(Decomposition::empty(DecompositionStatus::Rejected));
            }
        }

        let status = decompose_child(&children[index], index, ctx, &mut plan, MtrTracking::Record)?;
        match status {
            DecompositionStatus::Rejected
            | DecompositionStatus::Succeeded
            | DecompositionStatus::Partial => return Ok(Decomposition::new(status, plan)),
            DecompositionStatus::Failed => continue,
        }
    }

    Ok(Decomposition::from_plan(plan))
}

/// Commit to one uniformly drawn sub-task and stand or fall with it.
pub(super) fn decompose_random(
    task: &TaskRef,
    ctx: &mut Context,
    start_index: usize,
) -> Result<Decomposition> {
    let children = child_list(task);
    if start_index >= children.len() {
        return Ok(Decomposition::empty(DecompositionStatus::Failed));
    }

    let index = ctx.rng.gen_range(start_index..children.len());
    if ctx.log_decomposition() {
        let name = task.borrow().name.clone();
        let child = children[index].borrow().name.clone();
        ctx.log(&name, format!("random pick {}: {}", index, child));
    }

    let mut plan = Plan::new();
    let status = decompose_child(&children[index], index, ctx, &mut plan, MtrTracking::Skip)?;
    Ok(Decomposition::new(status, plan))
}

fn decompose_child(
    child: &TaskRef,
    index: usize,
    ctx: &mut Context,
    plan: &mut Plan,
    tracking: MtrTracking,
) -> Result<DecompositionStatus> {
    if !child.borrow().is_valid(ctx) {
        return Ok(DecompositionStatus::Failed);
    }

    match classify(child) {
        ChildClass::Composite => {
            // Record the choice before recursing so the traversal
            // record is built in selection order.
            if tracking == MtrTracking::Record {
                ctx.mtr_mut().push(index as i32);
                if ctx.debug_mtr() {
                    let name = child.borrow().name.clone();
                    ctx.mtr_debug.push(name);
                }
            }

            let sub = decompose(child, ctx, 0)?;
            match sub.status {
                DecompositionStatus::Rejected => {
                    plan.clear();
                    Ok(DecompositionStatus::Rejected)
                }
                DecompositionStatus::Failed => {
                    if tracking == MtrTracking::Record {
                        ctx.mtr_mut().pop();
                        if ctx.debug_mtr() {
                            ctx.mtr_debug.pop();
                        }
                    }
                    Ok(DecompositionStatus::Failed)
                }
                DecompositionStatus::Succeeded | DecompositionStatus::Partial => {
                    plan.extend(sub.plan);
                    if ctx.has_paused_partial_plan() {
                        Ok(DecompositionStatus::Partial)
                    } else if plan.is_empty() {
                        Ok(DecompositionStatus::Failed)
                    } else {
                        Ok(DecompositionStatus::Succeeded)
                    }
                }
            }
        }
        ChildClass::Primitive => {
            child.borrow().apply_effects(ctx);
            plan.push_back(child.clone());
            Ok(DecompositionStatus::Succeeded)
        }
        ChildClass::Marker => {
            if plan.is_empty() {
                Ok(DecompositionStatus::Failed)
            } else {
                Ok(DecompositionStatus::Succeeded)
            }
        }
    }
}
