//! Effect capability - world-state changes produced by primitive tasks

use serde::{Deserialize, Serialize};

use crate::context::Context;

/// How long an effect's world-state change survives.
///
/// Carried on every change-stack entry; `trim_for_execution` drops
/// non-permanent entries and the planner re-applies `PlanAndExecute`
/// effects when their task completes. The three scopes are distinct on
/// purpose and must not be collapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EffectScope {
    /// Committed to world state when the plan is found.
    Permanent,
    /// Visible during planning only; discarded before execution.
    PlanOnly,
    /// Visible during planning and re-applied on operator success.
    PlanAndExecute,
}

/// A named world-state change applied during planning and, for
/// `PlanAndExecute`, again at execution time.
pub trait Effect {
    fn name(&self) -> &str;

    fn scope(&self) -> EffectScope;

    fn apply(&self, ctx: &mut Context);
}

/// Closure-backed effect. The closure receives the effect's scope so it
/// can forward it to `Context::set_state`.
pub struct ActionEffect {
    name: String,
    scope: EffectScope,
    action: Box<dyn Fn(&mut Context, EffectScope)>,
}

impl ActionEffect {
    pub fn new(
        name: impl Into<String>,
        scope: EffectScope,
        action: impl Fn(&mut Context, EffectScope) + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            scope,
            action: Box::new(action),
        }
    }
}

impl Effect for ActionEffect {
    fn name(&self) -> &str {
        &self.name
    }

    fn scope(&self) -> EffectScope {
        self.scope
    }

    fn apply(&self, ctx: &mut Context) {
        if ctx.log_decomposition() {
            let depth = ctx.current_decomposition_depth() + 1;
            ctx.log_at_depth(&self.name, format!("effect ({:?})", self.scope), depth);
        }
        (self.action)(ctx, self.scope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextState;
    use crate::core::types::PropertyId;
    use crate::world::FixedWorldState;

    #[test]
    fn test_effect_pushes_change_stack_during_planning() {
        let mut ctx = Context::new(Box::new(FixedWorldState::new(1)));
        ctx.init();
        ctx.set_context_state(ContextState::Planning);

        let effect = ActionEffect::new("SetA", EffectScope::PlanOnly, |ctx, scope| {
            ctx.set_state(PropertyId(0), 1, true, scope);
        });
        effect.apply(&mut ctx);

        assert_eq!(ctx.change_depth().unwrap()[0], 1);
        assert_eq!(ctx.world_state().get(PropertyId(0)), 0);
        assert_eq!(ctx.get_state(PropertyId(0)), 1);
    }

    #[test]
    fn test_effect_commits_during_execution() {
        let mut ctx = Context::new(Box::new(FixedWorldState::new(1)));
        ctx.init();

        let effect = ActionEffect::new("SetA", EffectScope::PlanAndExecute, |ctx, scope| {
            ctx.set_state(PropertyId(0), 1, true, scope);
        });
        effect.apply(&mut ctx);

        assert_eq!(ctx.world_state().get(PropertyId(0)), 1);
        assert!(ctx.is_dirty());
    }
}
