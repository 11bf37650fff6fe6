//! Operator capability - the executable body of a primitive task

use crate::context::Context;
use crate::task::TaskStatus;

/// Updated once per planner tick while its task is current. Operators
/// are the only thing that mutates committed world state during
/// execution beyond what effects commit.
pub trait Operator {
    /// Advance the operator one tick.
    fn update(&self, ctx: &mut Context) -> TaskStatus;

    /// Called when the running task is forcefully stopped, typically
    /// because a better plan replaced the current one.
    fn stop(&self, ctx: &mut Context);
}

/// Closure-backed operator with an optional stop handler.
pub struct FuncOperator {
    func: Box<dyn Fn(&mut Context) -> TaskStatus>,
    stop_func: Option<Box<dyn Fn(&mut Context)>>,
}

impl FuncOperator {
    pub fn new(func: impl Fn(&mut Context) -> TaskStatus + 'static) -> Self {
        Self {
            func: Box::new(func),
            stop_func: None,
        }
    }

    pub fn with_stop(
        func: impl Fn(&mut Context) -> TaskStatus + 'static,
        stop: impl Fn(&mut Context) + 'static,
    ) -> Self {
        Self {
            func: Box::new(func),
            stop_func: Some(Box::new(stop)),
        }
    }
}

impl Operator for FuncOperator {
    fn update(&self, ctx: &mut Context) -> TaskStatus {
        (self.func)(ctx)
    }

    fn stop(&self, ctx: &mut Context) {
        if let Some(stop) = &self.stop_func {
            stop(ctx)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::FixedWorldState;

    #[test]
    fn test_func_operator_update() {
        let mut ctx = Context::new(Box::new(FixedWorldState::new(1)));
        ctx.init();

        let op = FuncOperator::new(|_| TaskStatus::Success);
        assert_eq!(op.update(&mut ctx), TaskStatus::Success);
        op.stop(&mut ctx);
    }

    #[test]
    fn test_stop_handler_runs() {
        use crate::core::types::PropertyId;

        let mut ctx = Context::new(Box::new(FixedWorldState::new(1)));
        ctx.init();

        let op = FuncOperator::with_stop(
            |_| TaskStatus::Continue,
            |ctx| ctx.set_state(PropertyId(0), 1, false, crate::task::EffectScope::Permanent),
        );
        op.stop(&mut ctx);
        assert_eq!(ctx.world_state().get(PropertyId(0)), 1);
    }
}
