//! World state - the typed property store planning reads and writes

use crate::core::types::{PropertyId, PropertyValue};

/// Capability contract for the committed world state.
///
/// A dumb store: a bounded mapping from property id to value. Concrete
/// property schemas are supplied by the embedder, typically as an enum
/// that converts into [`PropertyId`].
pub trait WorldState {
    fn get(&self, id: PropertyId) -> PropertyValue;

    fn set(&mut self, id: PropertyId, value: PropertyValue);

    /// Upper bound of the property-id space, fixed at construction.
    fn max_property_count(&self) -> usize;

    fn has(&self, id: PropertyId, value: PropertyValue) -> bool {
        self.get(id) == value
    }
}

/// Array-backed world state with a capacity declared up front.
#[derive(Debug, Clone)]
pub struct FixedWorldState {
    values: Vec<PropertyValue>,
}

impl FixedWorldState {
    pub fn new(max_property_count: usize) -> Self {
        Self {
            values: vec![0; max_property_count],
        }
    }
}

impl WorldState for FixedWorldState {
    fn get(&self, id: PropertyId) -> PropertyValue {
        self.values[id.index()]
    }

    fn set(&mut self, id: PropertyId, value: PropertyValue) {
        self.values[id.index()] = value;
    }

    fn max_property_count(&self) -> usize {
        self.values.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_world_state_defaults_to_zero() {
        let ws = FixedWorldState::new(4);
        assert_eq!(ws.max_property_count(), 4);
        assert_eq!(ws.get(PropertyId(3)), 0);
    }

    #[test]
    fn test_set_then_get() {
        let mut ws = FixedWorldState::new(2);
        ws.set(PropertyId(1), 7);
        assert_eq!(ws.get(PropertyId(1)), 7);
        assert!(ws.has(PropertyId(1), 7));
        assert!(!ws.has(PropertyId(0), 7));
    }
}
