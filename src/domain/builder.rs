//! Fluent domain builder
//!
//! Keeps a pointer stack into the tree under construction: compound
//! tasks and actions push a pointer, `end` pops one, and `build`
//! demands the stack is balanced back down to the root.

use std::rc::Rc;

use crate::context::Context;
use crate::core::error::{HtnError, Result};
use crate::domain::Domain;
use crate::task::{
    ActionEffect, EffectScope, FuncCondition, FuncOperator, Task, TaskKind, TaskRef, TaskStatus,
};

pub struct DomainBuilder {
    domain: Domain,
    pointers: Vec<TaskRef>,
}

impl DomainBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        let domain = Domain::new(name);
        let root = domain.root().clone();
        Self {
            domain,
            pointers: vec![root],
        }
    }

    fn pointer(&self) -> TaskRef {
        self.pointers
            .last()
            .cloned()
            .expect("builder pointer stack is never empty")
    }

    fn attach(&mut self, task: TaskRef, push_pointer: bool) -> Result<&mut Self> {
        let parent = self.pointer();
        self.domain.add(&parent, &task)?;
        if push_pointer {
            self.pointers.push(task);
        }
        Ok(self)
    }

    // ------------------------------------------------------- hierarchy

    /// Open a selector: succeeds with its first decomposable sub-task.
    pub fn selector(&mut self, name: impl Into<String>) -> Result<&mut Self> {
        self.attach(Task::selector(name), true)
    }

    /// Open a sequence: succeeds only when all sub-tasks decompose.
    pub fn sequence(&mut self, name: impl Into<String>) -> Result<&mut Self> {
        self.attach(Task::sequence(name), true)
    }

    /// Open a random selector: commits to one uniformly drawn sub-task.
    pub fn random_selector(&mut self, name: impl Into<String>) -> Result<&mut Self> {
        self.attach(Task::random_selector(name), true)
    }

    /// Open a primitive action, the executable leaf of a plan.
    pub fn action(&mut self, name: impl Into<String>) -> Result<&mut Self> {
        self.attach(Task::primitive(name), true)
    }

    /// Drop a pause-plan marker into the current sequence.
    pub fn pause_plan(&mut self) -> Result<&mut Self> {
        if !matches!(self.pointer().borrow().kind, TaskKind::Sequence { .. }) {
            return Err(HtnError::Builder(
                "pause_plan requires a sequence; check for a missing end()".into(),
            ));
        }
        self.attach(Task::pause_plan(), false)
    }

    /// Declare a runtime slot with a domain-unique id.
    pub fn slot(&mut self, slot_id: i32) -> Result<&mut Self> {
        self.attach(Task::slot(format!("Slot {}", slot_id), slot_id), false)
    }

    /// Graft another domain's root under the current pointer.
    pub fn splice(&mut self, sub_domain: &Domain) -> Result<&mut Self> {
        self.attach(sub_domain.root().clone(), false)
    }

    /// Close the task opened most recently.
    pub fn end(&mut self) -> Result<&mut Self> {
        if self.pointers.len() <= 1 {
            return Err(HtnError::Builder("unbalanced end()".into()));
        }
        self.pointers.pop();
        Ok(self)
    }

    // ------------------------------------------------------- leaf payload

    pub fn condition(
        &mut self,
        name: impl Into<String>,
        func: impl Fn(&mut Context) -> bool + 'static,
    ) -> Result<&mut Self> {
        self.pointer()
            .borrow_mut()
            .add_condition(Rc::new(FuncCondition::new(name, func)))?;
        Ok(self)
    }

    pub fn executing_condition(
        &mut self,
        name: impl Into<String>,
        func: impl Fn(&mut Context) -> bool + 'static,
    ) -> Result<&mut Self> {
        self.pointer()
            .borrow_mut()
            .add_executing_condition(Rc::new(FuncCondition::new(name, func)))?;
        Ok(self)
    }

    pub fn operator(
        &mut self,
        func: impl Fn(&mut Context) -> TaskStatus + 'static,
    ) -> Result<&mut Self> {
        self.pointer()
            .borrow_mut()
            .set_operator(Rc::new(FuncOperator::new(func)))?;
        Ok(self)
    }

    pub fn operator_with_stop(
        &mut self,
        func: impl Fn(&mut Context) -> TaskStatus + 'static,
        stop: impl Fn(&mut Context) + 'static,
    ) -> Result<&mut Self> {
        self.pointer()
            .borrow_mut()
            .set_operator(Rc::new(FuncOperator::with_stop(func, stop)))?;
        Ok(self)
    }

    pub fn effect(
        &mut self,
        name: impl Into<String>,
        scope: EffectScope,
        action: impl Fn(&mut Context, EffectScope) + 'static,
    ) -> Result<&mut Self> {
        self.pointer()
            .borrow_mut()
            .add_effect(Rc::new(ActionEffect::new(name, scope, action)))?;
        Ok(self)
    }

    // ------------------------------------------------------- finish

    pub fn build(self) -> Result<Domain> {
        if self.pointers.len() != 1 {
            return Err(HtnError::Builder(
                "domain definition lacks one or more end() calls".into(),
            ));
        }
        Ok(self.domain)
    }
}
