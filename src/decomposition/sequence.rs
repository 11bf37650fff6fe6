//! Sequence decomposition - every sub-task must decompose in order
//!
//! Snapshots the change-stack depths on entry and trims back to that
//! snapshot when any child fails, so effects applied by earlier
//! children never leak out of a failed sequence.

use super::{child_list, classify, decompose, ChildClass, Decomposition, DecompositionStatus};
use crate::context::{Context, PartialPlanEntry};
use crate::core::error::Result;
use crate::task::{Plan, TaskRef};

pub(super) fn decompose_sequence(
    task: &TaskRef,
    ctx: &mut Context,
    start_index: usize,
) -> Result<Decomposition> {
    let children = child_list(task);
    let snapshot = ctx.change_depth()?;
    let mut plan = Plan::new();

    for index in start_index..children.len() {
        if ctx.log_decomposition() {
            let name = task.borrow().name.clone();
            let child = children[index].borrow().name.clone();
            ctx.log(&name, format!("step {}: {}", index, child));
        }

        let status = decompose_child(
            task,
            &children[index],
            index,
            children.len(),
            ctx,
            &snapshot,
            &mut plan,
        )?;
        match status {
            DecompositionStatus::Rejected
            | DecompositionStatus::Failed
            | DecompositionStatus::Partial => return Ok(Decomposition::new(status, plan)),
            DecompositionStatus::Succeeded => continue,
        }
    }

    Ok(Decomposition::from_plan(plan))
}

#[allow(clippy::too_many_arguments)]
fn decompose_child(
    parent: &TaskRef,
    child: &TaskRef,
    index: usize,
    child_count: usize,
    ctx: &mut Context,
    snapshot: &[usize],
    plan: &mut Plan,
) -> Result<DecompositionStatus> {
    if !child.borrow().is_valid(ctx) {
        plan.clear();
        ctx.trim_to_depth(snapshot)?;
        return Ok(DecompositionStatus::Failed);
    }

    match classify(child) {
        ChildClass::Composite => {
            let sub = decompose(child, ctx, 0)?;
            match sub.status {
                DecompositionStatus::Rejected => {
                    plan.clear();
                    ctx.trim_to_depth(snapshot)?;
                    Ok(DecompositionStatus::Rejected)
                }
                DecompositionStatus::Failed => {
                    plan.clear();
                    ctx.trim_to_depth(snapshot)?;
                    Ok(DecompositionStatus::Failed)
                }
                DecompositionStatus::Succeeded | DecompositionStatus::Partial => {
                    plan.extend(sub.plan);
                    if ctx.has_paused_partial_plan() {
                        // The nested pause saved its own continuation;
                        // also save ours when there are steps left so the
                        // sequence resumes after the nested frames.
                        if index < child_count - 1 {
                            ctx.partial_plan_queue.push_back(PartialPlanEntry {
                                task: parent.clone(),
                                next_index: index + 1,
                            });
                        }
                        Ok(DecompositionStatus::Partial)
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
            if ctx.log_decomposition() {
                let name = parent.borrow().name.clone();
                ctx.log(&name, format!("paused at step {}", index));
            }
            ctx.has_paused_partial_plan = true;
            ctx.partial_plan_queue.push_back(PartialPlanEntry {
                task: parent.clone(),
                next_index: index + 1,
            });
            Ok(DecompositionStatus::Partial)
        }
    }
}
