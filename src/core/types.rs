//! Core type definitions used throughout the crate

use serde::{Deserialize, Serialize};

/// Identifier for a world-state property.
///
/// The id space is bounded by the world state's declared max property
/// count, so properties can live in array-indexed storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PropertyId(pub u32);

impl PropertyId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Fixed-width world-state property value
pub type PropertyValue = u8;
