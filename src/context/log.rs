//! Decomposition log - in-memory trace of a planning pass

use serde::{Deserialize, Serialize};

/// One recorded decomposition event.
///
/// Entries accumulate on the context while decomposition logging is
/// enabled; `depth` is the nesting level of the task tree at the time
/// of the event, for indented display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecompositionLogEntry {
    pub name: String,
    pub description: String,
    pub depth: i32,
}
