//! Task tree - the tagged task variants a domain is built from
//!
//! Ownership flows root -> children through `Rc` handles; parent links
//! are `Weak` back-edges and never participate in drop.

pub mod condition;
pub mod effect;
pub mod operator;

pub use condition::{Condition, FuncCondition};
pub use effect::{ActionEffect, Effect, EffectScope};
pub use operator::{FuncOperator, Operator};

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

use serde::{Deserialize, Serialize};

use crate::context::Context;
use crate::core::error::{HtnError, Result};

/// Result of one operator update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    Continue,
    Success,
    Failure,
}

/// Shared handle to a task node.
pub type TaskRef = Rc<RefCell<Task>>;

/// FIFO queue of primitive tasks produced by decomposition and
/// consumed by the planner.
pub type Plan = VecDeque<TaskRef>;

/// Payload of a primitive task: the executable leaf of the tree.
#[derive(Default)]
pub struct PrimitiveData {
    pub executing_conditions: Vec<Rc<dyn Condition>>,
    pub operator: Option<Rc<dyn Operator>>,
    pub effects: Vec<Rc<dyn Effect>>,
}

/// Variant-specific payload of a task node.
pub enum TaskKind {
    /// Executable leaf carrying an operator, effects and executing-conditions.
    Primitive(PrimitiveData),
    /// Succeeds with the first sub-task that decomposes.
    Selector { children: Vec<TaskRef> },
    /// Succeeds only when every sub-task decomposes in order.
    Sequence { children: Vec<TaskRef> },
    /// Commits to one uniformly drawn sub-task.
    RandomSelector { children: Vec<TaskRef> },
    /// Entry point of a domain; decomposes like a selector.
    Root { children: Vec<TaskRef> },
    /// Marker leaf that suspends decomposition inside a sequence.
    PausePlan,
    /// Named hole that may hold a sub-domain root at runtime.
    Slot {
        slot_id: i32,
        subtask: Option<TaskRef>,
    },
}

pub struct Task {
    pub name: String,
    pub(crate) parent: Weak<RefCell<Task>>,
    pub(crate) conditions: Vec<Rc<dyn Condition>>,
    pub kind: TaskKind,
}

impl Task {
    fn new_ref(name: impl Into<String>, kind: TaskKind) -> TaskRef {
        Rc::new(RefCell::new(Task {
            name: name.into(),
            parent: Weak::new(),
            conditions: Vec::new(),
            kind,
        }))
    }

    pub fn root(name: impl Into<String>) -> TaskRef {
        Self::new_ref(name, TaskKind::Root { children: Vec::new() })
    }

    pub fn selector(name: impl Into<String>) -> TaskRef {
        Self::new_ref(name, TaskKind::Selector { children: Vec::new() })
    }

    pub fn sequence(name: impl Into<String>) -> TaskRef {
        Self::new_ref(name, TaskKind::Sequence { children: Vec::new() })
    }

    pub fn random_selector(name: impl Into<String>) -> TaskRef {
        Self::new_ref(name, TaskKind::RandomSelector { children: Vec::new() })
    }

    pub fn primitive(name: impl Into<String>) -> TaskRef {
        Self::new_ref(name, TaskKind::Primitive(PrimitiveData::default()))
    }

    pub fn pause_plan() -> TaskRef {
        Self::new_ref("Pause Plan", TaskKind::PausePlan)
    }

    pub fn slot(name: impl Into<String>, slot_id: i32) -> TaskRef {
        Self::new_ref(
            name,
            TaskKind::Slot {
                slot_id,
                subtask: None,
            },
        )
    }

    pub fn is_compound(&self) -> bool {
        matches!(
            self.kind,
            TaskKind::Selector { .. }
                | TaskKind::Sequence { .. }
                | TaskKind::RandomSelector { .. }
                | TaskKind::Root { .. }
        )
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self.kind, TaskKind::Primitive(_))
    }

    pub fn children(&self) -> Option<&Vec<TaskRef>> {
        match &self.kind {
            TaskKind::Selector { children }
            | TaskKind::Sequence { children }
            | TaskKind::RandomSelector { children }
            | TaskKind::Root { children } => Some(children),
            _ => None,
        }
    }

    pub(crate) fn children_mut(&mut self) -> Option<&mut Vec<TaskRef>> {
        match &mut self.kind {
            TaskKind::Selector { children }
            | TaskKind::Sequence { children }
            | TaskKind::RandomSelector { children }
            | TaskKind::Root { children } => Some(children),
            _ => None,
        }
    }

    pub fn parent(&self) -> Option<TaskRef> {
        self.parent.upgrade()
    }

    pub fn conditions(&self) -> &[Rc<dyn Condition>] {
        &self.conditions
    }

    /// Attach a condition. Pause-plan markers and slots do not support
    /// conditions; attaching one is a structural error.
    pub fn add_condition(&mut self, condition: Rc<dyn Condition>) -> Result<()> {
        match self.kind {
            TaskKind::PausePlan => Err(HtnError::InvalidStructure(
                "pause-plan tasks do not support conditions".into(),
            )),
            TaskKind::Slot { .. } => Err(HtnError::InvalidStructure(
                "slot tasks do not support conditions".into(),
            )),
            _ => {
                self.conditions.push(condition);
                Ok(())
            }
        }
    }

    pub fn add_executing_condition(&mut self, condition: Rc<dyn Condition>) -> Result<()> {
        match &mut self.kind {
            TaskKind::Primitive(data) => {
                data.executing_conditions.push(condition);
                Ok(())
            }
            _ => Err(HtnError::InvalidStructure(
                "executing conditions require a primitive task".into(),
            )),
        }
    }

    pub fn add_effect(&mut self, effect: Rc<dyn Effect>) -> Result<()> {
        match &mut self.kind {
            TaskKind::Primitive(data) => {
                data.effects.push(effect);
                Ok(())
            }
            _ => Err(HtnError::InvalidStructure(
                "effects require a primitive task".into(),
            )),
        }
    }

    pub fn set_operator(&mut self, operator: Rc<dyn Operator>) -> Result<()> {
        match &mut self.kind {
            TaskKind::Primitive(data) => {
                if data.operator.is_some() {
                    return Err(HtnError::OperatorAlreadySet);
                }
                data.operator = Some(operator);
                Ok(())
            }
            _ => Err(HtnError::InvalidStructure(
                "operators require a primitive task".into(),
            )),
        }
    }

    pub(crate) fn primitive_data(&self) -> Option<&PrimitiveData> {
        match &self.kind {
            TaskKind::Primitive(data) => Some(data),
            _ => None,
        }
    }

    /// The decomposition validity gate: every attached condition must
    /// hold, compounds additionally need at least one child, and a slot
    /// needs a bound sub-domain.
    pub fn is_valid(&self, ctx: &mut Context) -> bool {
        match &self.kind {
            TaskKind::PausePlan => true,
            TaskKind::Slot { subtask, .. } => subtask.is_some(),
            _ => {
                for condition in &self.conditions {
                    if !condition.is_valid(ctx) {
                        if ctx.log_decomposition() {
                            let depth = ctx.current_decomposition_depth();
                            ctx.log_at_depth(
                                &self.name,
                                format!("not valid: condition {} failed", condition.name()),
                                depth,
                            );
                        }
                        return false;
                    }
                }
                if self.is_compound() && self.children().map_or(true, |c| c.is_empty()) {
                    return false;
                }
                true
            }
        }
    }

    /// Apply every effect of a primitive task to the context.
    pub fn apply_effects(&self, ctx: &mut Context) {
        if let TaskKind::Primitive(data) = &self.kind {
            if ctx.log_decomposition() {
                ctx.bump_decomposition_depth(1);
            }
            for effect in &data.effects {
                effect.apply(ctx);
            }
            if ctx.log_decomposition() {
                ctx.bump_decomposition_depth(-1);
            }
        }
    }

    /// Stop a primitive task's operator, if any.
    pub fn stop(&self, ctx: &mut Context) {
        if let TaskKind::Primitive(data) = &self.kind {
            if let Some(operator) = &data.operator {
                operator.stop(ctx);
            }
        }
    }
}
