//! P4Runtime controller for the tunnel, load-balancing and QoS exercise
//! programs.
//!
//! The [`Controller`] connects to every switch, installs the program, writes
//! the configured policies through the [`PolicyEngine`] and then polls the
//! tunnel counters with the [`TelemetryPoller`], or just holds the sessions,
//! until cancelled.

pub mod config;
pub mod controller;
pub mod engine;
pub mod error;
pub mod inspect;
pub mod policy;
pub mod switches;
pub mod tables;
pub mod telemetry;

pub use config::{ControllerConfig, SwitchConfig, TelemetryConfig};
pub use controller::{Controller, Progress, RunSummary};
pub use engine::{EngineStats, PolicyEngine};
pub use error::{
    ConfigError, ConfigResult, ControllerError, ControllerResult, PolicyError, PolicyResult,
    TelemetryError, TelemetryResult,
};
pub use inspect::read_table_rules;
pub use policy::{EcmpGroup, EgressRewrite, ForwardRule, NextHop, Policy, PolicySet, Tunnel};
pub use switches::SwitchSet;
pub use telemetry::{poll_counter, TelemetryPoller};
