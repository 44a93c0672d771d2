// Core data models for tasktime
// Persisted records and the in-memory task with its transient timer state

pub mod task;

pub use task::*;
