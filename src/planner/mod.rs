//! Planner - drives plan execution tick by tick
//!
//! Each tick: replan when idle or the world changed, pop the next
//! primitive off the plan, re-check its conditions and update its
//! operator. Observer callbacks report every lifecycle event; missing
//! callbacks are no-ops.

use std::rc::Rc;

use crate::context::Context;
use crate::core::error::{HtnError, Result};
use crate::decomposition::DecompositionStatus;
use crate::domain::Domain;
use crate::task::{Condition, Effect, EffectScope, Plan, TaskRef, TaskStatus};

pub struct Planner {
    current_task: Option<TaskRef>,
    plan: Plan,
    last_status: TaskStatus,

    /// A plan was found and nothing was running.
    pub on_new_plan: Option<Box<dyn FnMut(&Plan)>>,
    /// A plan is about to replace the running one: (old plan, current
    /// task, new plan).
    pub on_replace_plan: Option<Box<dyn FnMut(&Plan, Option<&TaskRef>, &Plan)>>,
    /// A task was popped off the plan.
    pub on_new_task: Option<Box<dyn FnMut(&TaskRef)>>,
    /// A freshly popped task failed one of its conditions.
    pub on_new_task_condition_failed: Option<Box<dyn FnMut(&TaskRef, &Rc<dyn Condition>)>>,
    /// The running task was stopped forcefully.
    pub on_stop_current_task: Option<Box<dyn FnMut(&TaskRef)>>,
    /// The running task completed, before its effects are applied.
    pub on_current_task_completed_successfully: Option<Box<dyn FnMut(&TaskRef)>>,
    /// A plan-and-execute effect of a completed task is applied.
    pub on_apply_effect: Option<Box<dyn FnMut(&Rc<dyn Effect>)>>,
    /// The running task's operator reported failure.
    pub on_current_task_failed: Option<Box<dyn FnMut(&TaskRef)>>,
    /// The running task's operator needs more ticks.
    pub on_current_task_continues: Option<Box<dyn FnMut(&TaskRef)>>,
    /// An executing-condition failed before the operator update.
    pub on_current_task_executing_condition_failed:
        Option<Box<dyn FnMut(&TaskRef, &Rc<dyn Condition>)>>,
}

impl Planner {
    pub fn new() -> Self {
        Self {
            current_task: None,
            plan: Plan::new(),
            last_status: TaskStatus::Failure,
            on_new_plan: None,
            on_replace_plan: None,
            on_new_task: None,
            on_new_task_condition_failed: None,
            on_stop_current_task: None,
            on_current_task_completed_successfully: None,
            on_apply_effect: None,
            on_current_task_failed: None,
            on_current_task_continues: None,
            on_current_task_executing_condition_failed: None,
        }
    }

    pub fn plan(&self) -> &Plan {
        &self.plan
    }

    pub fn current_task(&self) -> Option<&TaskRef> {
        self.current_task.as_ref()
    }

    pub fn last_status(&self) -> TaskStatus {
        self.last_status
    }

    /// Stop the running operator and drop the plan.
    pub fn reset(&mut self, ctx: &mut Context) {
        self.plan.clear();
        if let Some(current) = self.current_task.take() {
            current.borrow().stop(ctx);
        }
    }

    /// Advance execution by one tick.
    pub fn tick(&mut self, domain: &Domain, ctx: &mut Context) -> Result<()> {
        self.tick_internal(domain, ctx, true)
    }

    fn tick_internal(
        &mut self,
        domain: &Domain,
        ctx: &mut Context,
        allow_immediate_replan: bool,
    ) -> Result<()> {
        if !ctx.is_initialized() {
            return Err(HtnError::ContextUninitialized);
        }

        let mut decomposition_status = DecompositionStatus::Failed;
        let mut is_trying_to_replace_plan = false;

        // Replan when the current plan has finished or the world changed.
        if (self.current_task.is_none() && self.plan.is_empty()) || ctx.is_dirty() {
            let mut saved_partial_queue = None;

            if ctx.is_dirty() && ctx.has_paused_partial_plan() {
                // This pass evaluates a replacement, not a continuation:
                // park the paused frames and promote the paused plan's
                // traversal record to the one a new plan must beat.
                ctx.has_paused_partial_plan = false;
                saved_partial_queue = Some(std::mem::take(&mut ctx.partial_plan_queue));

                let record = ctx.mtr().to_vec();
                *ctx.last_mtr_mut() = record;
                if ctx.debug_mtr() {
                    ctx.last_mtr_debug = ctx.mtr_debug.clone();
                }
            }

            let (status, new_plan) = domain.find_plan(ctx)?;
            decomposition_status = status;
            is_trying_to_replace_plan = !self.plan.is_empty();

            if matches!(
                status,
                DecompositionStatus::Succeeded | DecompositionStatus::Partial
            ) {
                if !self.plan.is_empty() || self.current_task.is_some() {
                    if let Some(cb) = self.on_replace_plan.as_mut() {
                        cb(&self.plan, self.current_task.as_ref(), &new_plan);
                    }
                } else if let Some(cb) = self.on_new_plan.as_mut() {
                    cb(&new_plan);
                }

                self.plan = new_plan;

                if let Some(current) = self.current_task.take() {
                    if current.borrow().is_primitive() {
                        if let Some(cb) = self.on_stop_current_task.as_mut() {
                            cb(&current);
                        }
                        current.borrow().stop(ctx);
                    }
                }

                // The new plan's record becomes the one to beat.
                if !ctx.mtr().is_empty() {
                    let record = ctx.mtr().to_vec();
                    *ctx.last_mtr_mut() = record;
                    if ctx.debug_mtr() {
                        ctx.last_mtr_debug = ctx.mtr_debug.clone();
                    }
                }
            } else if let Some(saved) = saved_partial_queue.take() {
                // No better plan; put the paused plan back in place.
                ctx.partial_plan_queue = saved;
                ctx.has_paused_partial_plan = true;
                if !ctx.last_mtr().is_empty() {
                    let record = ctx.last_mtr().to_vec();
                    *ctx.mtr_mut() = record;
                    ctx.last_mtr_mut().clear();
                    if ctx.debug_mtr() {
                        ctx.mtr_debug = ctx.last_mtr_debug.clone();
                        ctx.last_mtr_debug.clear();
                    }
                }
            }
        }

        // Pop the next task off the plan.
        if self.current_task.is_none() && !self.plan.is_empty() {
            self.current_task = self.plan.pop_front();

            if let Some(current) = self.current_task.clone() {
                if let Some(cb) = self.on_new_task.as_mut() {
                    cb(&current);
                }
                let conditions: Vec<Rc<dyn Condition>> = current.borrow().conditions().to_vec();
                for condition in &conditions {
                    // A failed condition means the plan can no longer
                    // progress; a replan is required.
                    if !condition.is_valid(ctx) {
                        if let Some(cb) = self.on_new_task_condition_failed.as_mut() {
                            cb(&current, condition);
                        }
                        self.abort_plan(ctx);
                        return Ok(());
                    }
                }
            }
        }

        // Execute the current task.
        if let Some(current) = self.current_task.clone() {
            let (operator, executing_conditions, effects) = {
                let task = current.borrow();
                match task.primitive_data() {
                    Some(data) => (
                        data.operator.clone(),
                        data.executing_conditions.clone(),
                        data.effects.clone(),
                    ),
                    None => (None, Vec::new(), Vec::new()),
                }
            };

            if let Some(operator) = operator {
                for condition in &executing_conditions {
                    // Checked before every operator update; a failure
                    // aborts the plan and forces a replan next tick.
                    if !condition.is_valid(ctx) {
                        if let Some(cb) = self.on_current_task_executing_condition_failed.as_mut()
                        {
                            cb(&current, condition);
                        }
                        self.abort_plan(ctx);
                        return Ok(());
                    }
                }

                self.last_status = operator.update(ctx);
                match self.last_status {
                    TaskStatus::Success => {
                        if let Some(cb) = self.on_current_task_completed_successfully.as_mut() {
                            cb(&current);
                        }
                        // Plan-and-execute effects land now that the
                        // task actually ran.
                        for effect in &effects {
                            if effect.scope() == EffectScope::PlanAndExecute {
                                if let Some(cb) = self.on_apply_effect.as_mut() {
                                    cb(effect);
                                }
                                effect.apply(ctx);
                            }
                        }
                        self.current_task = None;
                        if self.plan.is_empty() {
                            ctx.last_mtr_mut().clear();
                            if ctx.debug_mtr() {
                                ctx.last_mtr_debug.clear();
                            }
                            ctx.set_dirty(false);
                            if allow_immediate_replan {
                                self.tick_internal(domain, ctx, false)?;
                            }
                        }
                    }
                    TaskStatus::Failure => {
                        if let Some(cb) = self.on_current_task_failed.as_mut() {
                            cb(&current);
                        }
                        self.abort_plan(ctx);
                    }
                    TaskStatus::Continue => {
                        if let Some(cb) = self.on_current_task_continues.as_mut() {
                            cb(&current);
                        }
                    }
                }
            } else {
                // A well-formed domain gives every primitive an operator.
                self.current_task = None;
                self.last_status = TaskStatus::Failure;
            }
        }

        if self.current_task.is_none()
            && self.plan.is_empty()
            && !is_trying_to_replace_plan
            && matches!(
                decomposition_status,
                DecompositionStatus::Failed | DecompositionStatus::Rejected
            )
        {
            self.last_status = TaskStatus::Failure;
        }

        Ok(())
    }

    /// Drop the current task and plan and clear every replan input, so
    /// the next tick plans from a clean slate.
    fn abort_plan(&mut self, ctx: &mut Context) {
        self.current_task = None;
        self.plan.clear();
        ctx.last_mtr_mut().clear();
        if ctx.debug_mtr() {
            ctx.last_mtr_debug.clear();
        }
        ctx.has_paused_partial_plan = false;
        ctx.partial_plan_queue.clear();
        ctx.set_dirty(false);
    }
}

impl Default for Planner {
    fn default() -> Self {
        Self::new()
    }
}
