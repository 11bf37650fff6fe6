//! Planning and execution context
//!
//! Binds the committed world state to the bookkeeping a planning pass
//! needs: per-property change stacks, the method traversal records, the
//! partial-plan queue and the dirty flag.

pub mod log;

pub use log::DecompositionLogEntry;

use std::collections::VecDeque;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::core::error::{HtnError, Result};
use crate::core::types::{PropertyId, PropertyValue};
use crate::task::{EffectScope, TaskRef};
use crate::world::WorldState;

/// Whether world-state writes are tentative or committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContextState {
    Planning,
    Executing,
}

/// Saved continuation of a sequence that hit a pause-plan marker:
/// decomposition resumes at `next_index` within `task`.
#[derive(Clone)]
pub struct PartialPlanEntry {
    pub task: TaskRef,
    pub next_index: usize,
}

/// One planner's view of the world.
///
/// Owned exclusively by a single planner; all operations are
/// synchronous within a tick. Created, explicitly `init`-ed, mutated by
/// planning and execution, and `reset` between unrelated sessions.
pub struct Context {
    world_state: Box<dyn WorldState>,
    state: ContextState,
    initialized: bool,
    dirty: bool,

    // One stack of tentative (scope, value) changes per property.
    change_stacks: Vec<Vec<(EffectScope, PropertyValue)>>,

    pub(crate) mtr: Vec<i32>,
    pub(crate) last_mtr: Vec<i32>,
    pub(crate) mtr_debug: Vec<String>,
    pub(crate) last_mtr_debug: Vec<String>,

    pub(crate) partial_plan_queue: VecDeque<PartialPlanEntry>,
    pub(crate) has_paused_partial_plan: bool,

    current_decomposition_depth: i32,
    debug_mtr: bool,
    log_decomposition: bool,
    decomposition_log: Vec<DecompositionLogEntry>,

    pub(crate) rng: ChaCha8Rng,
}

impl Context {
    pub fn new(world_state: Box<dyn WorldState>) -> Self {
        Self::with_seed(world_state, 0)
    }

    /// Context with a deterministic RNG for reproducible random
    /// selection.
    pub fn with_seed(world_state: Box<dyn WorldState>, seed: u64) -> Self {
        Self {
            world_state,
            state: ContextState::Executing,
            initialized: false,
            dirty: false,
            change_stacks: Vec::new(),
            mtr: Vec::new(),
            last_mtr: Vec::new(),
            mtr_debug: Vec::new(),
            last_mtr_debug: Vec::new(),
            partial_plan_queue: VecDeque::new(),
            has_paused_partial_plan: false,
            current_decomposition_depth: 0,
            debug_mtr: false,
            log_decomposition: false,
            decomposition_log: Vec::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Size the change-stack storage from the world state's capacity
    /// and mark the context ready for planning.
    pub fn init(&mut self) {
        let count = self.world_state.max_property_count();
        self.change_stacks = vec![Vec::new(); count];
        self.initialized = true;
    }

    /// Clear both traversal records, the partial-plan queue and the
    /// decomposition log, and mark the context uninitialized. `init`
    /// afterwards yields a context behaviorally equal to a fresh one.
    pub fn reset(&mut self) {
        self.mtr.clear();
        self.last_mtr.clear();
        self.mtr_debug.clear();
        self.last_mtr_debug.clear();
        self.partial_plan_queue.clear();
        self.has_paused_partial_plan = false;
        self.decomposition_log.clear();
        self.current_decomposition_depth = 0;
        self.dirty = false;
        self.initialized = false;
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn context_state(&self) -> ContextState {
        self.state
    }

    pub fn set_context_state(&mut self, state: ContextState) {
        self.state = state;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Force (or clear) the replan trigger.
    pub fn set_dirty(&mut self, dirty: bool) {
        self.dirty = dirty;
    }

    pub fn world_state(&self) -> &dyn WorldState {
        self.world_state.as_ref()
    }

    // ------------------------------------------------------- world access

    pub fn has_state(&self, id: PropertyId, value: PropertyValue) -> bool {
        self.get_state(id) == value
    }

    /// Under `Planning`, the top of the property's change stack wins
    /// over the committed value; under `Executing`, always the
    /// committed value.
    pub fn get_state(&self, id: PropertyId) -> PropertyValue {
        if self.state == ContextState::Planning {
            if let Some((_, value)) = self.change_stacks.get(id.index()).and_then(|s| s.last()) {
                return *value;
            }
        }
        self.world_state.get(id)
    }

    /// Under `Executing`: commit the value (no-op when unchanged) and
    /// optionally mark the context dirty. Under `Planning`: push a
    /// tentative change tagged with the effect scope; committed state
    /// and the dirty flag stay untouched.
    pub fn set_state(
        &mut self,
        id: PropertyId,
        value: PropertyValue,
        set_dirty: bool,
        scope: EffectScope,
    ) {
        if self.state == ContextState::Executing {
            if self.world_state.get(id) == value {
                return;
            }
            self.world_state.set(id, value);
            if set_dirty {
                self.dirty = true;
            }
        } else {
            self.change_stacks[id.index()].push((scope, value));
        }
    }

    // ------------------------------------------------------- change stacks

    /// Snapshot of every property's change-stack size, for rollback.
    pub fn change_depth(&self) -> Result<Vec<usize>> {
        if !self.initialized {
            return Err(HtnError::ContextUninitialized);
        }
        Ok(self.change_stacks.iter().map(|s| s.len()).collect())
    }

    /// Pop each change stack down to the given snapshot. A planning
    /// operation; calling it during execution is a programming error.
    pub fn trim_to_depth(&mut self, depths: &[usize]) -> Result<()> {
        if self.state == ContextState::Executing {
            return Err(HtnError::InvalidContextState(
                "cannot trim change stacks in execution state",
            ));
        }
        for (stack, &depth) in self.change_stacks.iter_mut().zip(depths) {
            stack.truncate(depth);
        }
        Ok(())
    }

    /// Pop every stack while its top entry is non-permanent, leaving
    /// only the changes that should be committed for execution.
    pub fn trim_for_execution(&mut self) -> Result<()> {
        if self.state == ContextState::Executing {
            return Err(HtnError::InvalidContextState(
                "cannot trim change stacks in execution state",
            ));
        }
        for stack in &mut self.change_stacks {
            while matches!(stack.last(), Some((scope, _)) if *scope != EffectScope::Permanent) {
                stack.pop();
            }
        }
        Ok(())
    }

    /// Write each non-empty stack's top value into committed world
    /// state and clear the stacks. Called by `find_plan` after
    /// `trim_for_execution`.
    pub(crate) fn commit_change_stacks(&mut self) {
        for index in 0..self.change_stacks.len() {
            if let Some(&(_, value)) = self.change_stacks[index].last() {
                self.world_state.set(PropertyId(index as u32), value);
                self.change_stacks[index].clear();
            }
        }
    }

    pub(crate) fn clear_change_stacks(&mut self) {
        for stack in &mut self.change_stacks {
            stack.clear();
        }
    }

    // ------------------------------------------------------- traversal records

    pub fn mtr(&self) -> &[i32] {
        &self.mtr
    }

    pub fn mtr_mut(&mut self) -> &mut Vec<i32> {
        &mut self.mtr
    }

    pub fn last_mtr(&self) -> &[i32] {
        &self.last_mtr
    }

    pub fn last_mtr_mut(&mut self) -> &mut Vec<i32> {
        &mut self.last_mtr
    }

    pub fn mtr_debug(&self) -> &[String] {
        &self.mtr_debug
    }

    pub fn last_mtr_debug(&self) -> &[String] {
        &self.last_mtr_debug
    }

    // ------------------------------------------------------- partial plans

    pub fn partial_plan_queue(&self) -> &VecDeque<PartialPlanEntry> {
        &self.partial_plan_queue
    }

    pub fn has_paused_partial_plan(&self) -> bool {
        self.has_paused_partial_plan
    }

    // ------------------------------------------------------- debug facilities

    /// Mirror selector choices into a readable string trace.
    pub fn set_debug_mtr(&mut self, enabled: bool) {
        self.debug_mtr = enabled;
    }

    pub fn debug_mtr(&self) -> bool {
        self.debug_mtr
    }

    /// Record decomposition events into the in-memory log.
    pub fn set_log_decomposition(&mut self, enabled: bool) {
        self.log_decomposition = enabled;
    }

    pub fn log_decomposition(&self) -> bool {
        self.log_decomposition
    }

    pub fn decomposition_log(&self) -> &[DecompositionLogEntry] {
        &self.decomposition_log
    }

    pub fn clear_decomposition_log(&mut self) {
        self.decomposition_log.clear();
    }

    pub fn current_decomposition_depth(&self) -> i32 {
        self.current_decomposition_depth
    }

    pub(crate) fn bump_decomposition_depth(&mut self, delta: i32) {
        self.current_decomposition_depth += delta;
    }

    pub(crate) fn log(&mut self, name: &str, description: String) {
        let depth = self.current_decomposition_depth;
        self.log_at_depth(name, description, depth);
    }

    pub(crate) fn log_at_depth(&mut self, name: &str, description: String, depth: i32) {
        if !self.log_decomposition {
            return;
        }
        self.decomposition_log.push(DecompositionLogEntry {
            name: name.to_string(),
            description,
            depth,
        });
    }
}
