//! Dispatch simulation: a single-agent driver over a family of reschedule
//! policies, and a decoupled multi-agent driver over per-agent sub-networks.

pub mod decoupled;
pub mod simulator;
