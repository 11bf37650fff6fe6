//! Domain - owns the task tree and drives planning
//!
//! A domain is a root selector, the hierarchy beneath it, and a
//! registry of runtime slots. `find_plan` runs one full planning pass:
//! resume a paused partial plan when possible, otherwise decompose from
//! the root, then commit or discard the tentative world-state changes.

pub mod builder;

pub use builder::DomainBuilder;

use std::rc::Rc;

use ahash::AHashMap;

use crate::context::{Context, ContextState};
use crate::core::error::{HtnError, Result};
use crate::decomposition::{decompose, DecompositionStatus};
use crate::task::{Plan, Task, TaskKind, TaskRef};

pub struct Domain {
    root: TaskRef,
    slots: AHashMap<i32, TaskRef>,
}

impl Domain {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            root: Task::root(name),
            slots: AHashMap::new(),
        }
    }

    pub fn root(&self) -> &TaskRef {
        &self.root
    }

    pub fn name(&self) -> String {
        self.root.borrow().name.clone()
    }

    /// Attach a child under a compound parent and set the parent
    /// back-edge. Slots are registered in the domain's slot table.
    ///
    /// Fails loudly on self-parenting, on an edge that would make a
    /// task its own ancestor, on a non-compound parent, and on a
    /// duplicate slot id.
    pub fn add(&mut self, parent: &TaskRef, child: &TaskRef) -> Result<()> {
        if Rc::ptr_eq(parent, child) {
            return Err(HtnError::InvalidStructure(
                "parent and sub-task cannot be the same task".into(),
            ));
        }

        let mut cursor = parent.borrow().parent();
        while let Some(ancestor) = cursor {
            if Rc::ptr_eq(&ancestor, child) {
                return Err(HtnError::InvalidStructure(
                    "a task cannot become its own ancestor".into(),
                ));
            }
            cursor = ancestor.borrow().parent();
        }

        if !parent.borrow().is_compound() {
            return Err(HtnError::InvalidStructure(
                "sub-tasks require a compound parent".into(),
            ));
        }

        let slot_id = match &child.borrow().kind {
            TaskKind::Slot { slot_id, .. } => Some(*slot_id),
            _ => None,
        };
        if let Some(slot_id) = slot_id {
            if self.slots.contains_key(&slot_id) {
                return Err(HtnError::DuplicateSlot(slot_id));
            }
            self.slots.insert(slot_id, child.clone());
        }

        parent
            .borrow_mut()
            .children_mut()
            .expect("compound task has a child list")
            .push(child.clone());
        child.borrow_mut().parent = Rc::downgrade(parent);
        Ok(())
    }

    /// Attach a child directly under the domain root.
    pub fn add_to_root(&mut self, child: &TaskRef) -> Result<()> {
        let root = self.root.clone();
        self.add(&root, child)
    }

    // ------------------------------------------------------- slots

    /// Bind a sub-domain to an empty slot at runtime. Returns false
    /// when the slot is unknown or already occupied.
    pub fn try_set_slot_domain(&mut self, slot_id: i32, sub_domain: &Domain) -> bool {
        if let Some(slot) = self.slots.get(&slot_id) {
            let mut task = slot.borrow_mut();
            if let TaskKind::Slot { subtask, .. } = &mut task.kind {
                if subtask.is_none() {
                    *subtask = Some(sub_domain.root.clone());
                    return true;
                }
            }
        }
        false
    }

    pub fn clear_slot(&mut self, slot_id: i32) {
        if let Some(slot) = self.slots.get(&slot_id) {
            if let TaskKind::Slot { subtask, .. } = &mut slot.borrow_mut().kind {
                *subtask = None;
            }
        }
    }

    // ------------------------------------------------------- planning

    /// Run one planning pass and return the status with the produced
    /// plan queue. On success the tentative change stacks are trimmed
    /// and committed into world state; on failure they are discarded.
    /// The context leaves in `Executing` state either way.
    pub fn find_plan(&self, ctx: &mut Context) -> Result<(DecompositionStatus, Plan)> {
        if !ctx.is_initialized() {
            return Err(HtnError::ContextUninitialized);
        }

        ctx.set_context_state(ContextState::Planning);

        let mut status = DecompositionStatus::Rejected;
        let mut plan = Plan::new();
        let mut try_root = true;

        // A paused partial plan is continued where it left off, unless a
        // replan was requested: a non-empty last MTR means the paused
        // plan is the one to beat, so planning must restart at the root.
        if ctx.has_paused_partial_plan() && ctx.last_mtr().is_empty() {
            ctx.has_paused_partial_plan = false;
            while let Some(entry) = ctx.partial_plan_queue.pop_front() {
                let resumed = decompose(&entry.task, ctx, entry.next_index)?;
                status = resumed.status;
                plan.extend(resumed.plan);
                if matches!(
                    status,
                    DecompositionStatus::Failed | DecompositionStatus::Rejected
                ) {
                    break;
                }
                // Continuing may run into a fresh pause.
                if ctx.has_paused_partial_plan() {
                    break;
                }
            }

            // A continuation that failed starts over from the root.
            try_root = matches!(
                status,
                DecompositionStatus::Failed | DecompositionStatus::Rejected
            );
        }

        if try_root {
            // Park any paused frames so they can be restored when this
            // pass fails to produce a replacement.
            let saved_queue = if ctx.has_paused_partial_plan() || !ctx.partial_plan_queue.is_empty()
            {
                ctx.has_paused_partial_plan = false;
                Some(std::mem::take(&mut ctx.partial_plan_queue))
            } else {
                None
            };

            // The MTR is only erased when planning starts from the root.
            ctx.mtr_mut().clear();
            if ctx.debug_mtr() {
                ctx.mtr_debug.clear();
            }

            let rooted = decompose(&self.root, ctx, 0)?;
            status = rooted.status;
            plan = rooted.plan;

            if let Some(saved) = saved_queue {
                if matches!(
                    status,
                    DecompositionStatus::Failed | DecompositionStatus::Rejected
                ) {
                    ctx.partial_plan_queue = saved;
                    ctx.has_paused_partial_plan = true;
                }
            }

            // During decomposition a selector can only establish that a
            // choice is strictly better than the running plan's. A pass
            // whose record matches the running plan's at every depth
            // found the same plan again; reject it so an equal-priority
            // candidate never replaces a running plan.
            let mtrs_equal = ctx.mtr().len() == ctx.last_mtr().len()
                && !ctx.mtr().iter().zip(ctx.last_mtr()).any(|(m, l)| m < l);
            if mtrs_equal {
                plan = Plan::new();
                status = DecompositionStatus::Rejected;
            }
        }

        if matches!(
            status,
            DecompositionStatus::Succeeded | DecompositionStatus::Partial
        ) {
            // Drop the planning-only scaffolding, then commit what is
            // left on the stacks into world state.
            ctx.trim_for_execution()?;
            ctx.commit_change_stacks();
        } else {
            // No plan: nothing from this pass may leak into world state.
            ctx.clear_change_stacks();
        }
        ctx.set_context_state(ContextState::Executing);

        Ok((status, plan))
    }
}
