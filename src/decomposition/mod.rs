//! Decomposition engine - recursive expansion of compound tasks
//!
//! Expands a compound task against the context into a linear queue of
//! primitive tasks, applying effects tentatively as it goes and rolling
//! them back when a branch fails. Selector choices are recorded in the
//! context's method traversal record so a later pass can be compared
//! against the running plan.

mod selector;
mod sequence;

use serde::{Deserialize, Serialize};

use crate::context::Context;
use crate::core::error::{HtnError, Result};
use crate::task::{Plan, TaskKind, TaskRef};

/// Outcome of decomposing one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecompositionStatus {
    /// A complete plan was produced.
    Succeeded,
    /// A pause-plan marker was hit; the plan is a valid prefix and
    /// continuation frames were queued on the context.
    Partial,
    /// No branch decomposed; the caller may try siblings.
    Failed,
    /// The traversal-record comparison eliminated this pass in favor of
    /// the running plan.
    Rejected,
}

/// A status paired with the plan queue it produced.
pub struct Decomposition {
    pub status: DecompositionStatus,
    pub plan: Plan,
}

impl Decomposition {
    pub fn new(status: DecompositionStatus, plan: Plan) -> Self {
        Self { status, plan }
    }

    pub fn empty(status: DecompositionStatus) -> Self {
        Self {
            status,
            plan: Plan::new(),
        }
    }

    /// Succeeded iff the plan is non-empty.
    fn from_plan(plan: Plan) -> Self {
        let status = if plan.is_empty() {
            DecompositionStatus::Failed
        } else {
            DecompositionStatus::Succeeded
        };
        Self { status, plan }
    }
}

/// How a compound task treats one of its children during expansion.
enum ChildClass {
    /// Compound or slot: recurse through `decompose`.
    Composite,
    Primitive,
    /// Pause-plan marker.
    Marker,
}

fn classify(child: &TaskRef) -> ChildClass {
    match &child.borrow().kind {
        TaskKind::Primitive(_) => ChildClass::Primitive,
        TaskKind::PausePlan => ChildClass::Marker,
        _ => ChildClass::Composite,
    }
}

fn child_list(task: &TaskRef) -> Vec<TaskRef> {
    task.borrow().children().cloned().unwrap_or_default()
}

/// Decompose a compound task (or a slot delegating to its bound
/// sub-domain) starting from the given child index.
pub fn decompose(task: &TaskRef, ctx: &mut Context, start_index: usize) -> Result<Decomposition> {
    enum Dispatch {
        Selector,
        Random,
        Sequence,
        Slot(Option<TaskRef>),
        Leaf,
    }

    let dispatch = match &task.borrow().kind {
        TaskKind::Selector { .. } | TaskKind::Root { .. } => Dispatch::Selector,
        TaskKind::RandomSelector { .. } => Dispatch::Random,
        TaskKind::Sequence { .. } => Dispatch::Sequence,
        TaskKind::Slot { subtask, .. } => Dispatch::Slot(subtask.clone()),
        _ => Dispatch::Leaf,
    };

    match dispatch {
        Dispatch::Slot(Some(subtask)) => return decompose(&subtask, ctx, start_index),
        Dispatch::Slot(None) => return Ok(Decomposition::empty(DecompositionStatus::Failed)),
        Dispatch::Leaf => {
            return Err(HtnError::InvalidStructure(
                "decompose requires a compound task or slot".into(),
            ))
        }
        _ => {}
    }

    if ctx.log_decomposition() {
        ctx.bump_decomposition_depth(1);
    }
    let result = match dispatch {
        Dispatch::Selector => selector::decompose_selector(task, ctx, start_index),
        Dispatch::Random => selector::decompose_random(task, ctx, start_index),
        Dispatch::Sequence => sequence::decompose_sequence(task, ctx, start_index),
        _ => unreachable!(),
    };
    if ctx.log_decomposition() {
        ctx.bump_decomposition_depth(-1);
    }

    result
}
