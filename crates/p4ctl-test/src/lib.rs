//! Test infrastructure for p4ctl
//!
//! Provides:
//! - P4Info descriptors of the `advanced_tunnel`, `load_balance` and `qos`
//!   programs
//! - A three-switch in-memory fabric with the pipeline installed
//! - Verification helpers that read device state back by name

mod fabric;
pub mod fixtures;
mod verification;

pub use fabric::{TestFabric, TestFabricError};
pub use fixtures::Program;
pub use verification::*;
