//! Condition capability - pure reads of context state

use crate::context::Context;

/// A named predicate evaluated against the planning context.
///
/// Conditions gate decomposition (task validity) and execution (the
/// planner re-checks them before running an operator). They must not
/// mutate world state.
pub trait Condition {
    fn name(&self) -> &str;

    fn is_valid(&self, ctx: &mut Context) -> bool;
}

/// Closure-backed condition, the usual way domains are authored.
pub struct FuncCondition {
    name: String,
    func: Box<dyn Fn(&mut Context) -> bool>,
}

impl FuncCondition {
    pub fn new(name: impl Into<String>, func: impl Fn(&mut Context) -> bool + 'static) -> Self {
        Self {
            name: name.into(),
            func: Box::new(func),
        }
    }
}

impl Condition for FuncCondition {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_valid(&self, ctx: &mut Context) -> bool {
        let result = (self.func)(ctx);
        if ctx.log_decomposition() {
            let depth = ctx.current_decomposition_depth() + 1;
            ctx.log_at_depth(&self.name, format!("condition -> {}", result), depth);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::PropertyId;
    use crate::world::FixedWorldState;

    #[test]
    fn test_func_condition_reads_context() {
        let mut ctx = Context::new(Box::new(FixedWorldState::new(1)));
        ctx.init();

        let condition = FuncCondition::new("HasZero", |ctx| ctx.has_state(PropertyId(0), 0));
        assert_eq!(condition.name(), "HasZero");
        assert!(condition.is_valid(&mut ctx));

        let condition = FuncCondition::new("HasOne", |ctx| ctx.has_state(PropertyId(0), 1));
        assert!(!condition.is_valid(&mut ctx));
    }
}
