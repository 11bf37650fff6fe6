//! Stratagem - hierarchical task network planning for real-time agents
//!
//! A domain of hierarchical tasks is decomposed against a mutable world
//! state into a linear queue of primitive actions; a planner drives
//! execution tick-by-tick and replans when the world changes.

pub mod context;
pub mod core;
pub mod decomposition;
pub mod domain;
pub mod planner;
pub mod task;
pub mod world;
