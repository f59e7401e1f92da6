//! Message bindings for the P4Runtime control protocol.
//!
//! This crate carries hand-maintained `prost` definitions for the subset of
//! the `p4.config.v1`, `p4.v1` and `google.rpc` packages the controller
//! speaks, plus a thin `tonic` client for the `p4.v1.P4Runtime` service.
//! Field tags follow the upstream `.proto` files, so the messages are
//! wire-compatible with any P4Runtime server (BMv2 `simple_switch_grpc`,
//! Stratum, ...).
//!
//! # Modules
//!
//! - [`p4info`]: pipeline descriptor (`p4.config.v1.P4Info`).
//! - [`format`]: text-format and JSON readers for the descriptor, backed by
//!   the `.proto` schema under `proto/`.
//! - [`p4runtime`]: requests, responses and entities of `p4.v1`.
//! - [`rpc`]: `google.rpc.Status` and the `p4.v1.Error` detail payload.
//! - [`client`]: the gRPC client.

pub mod client;
pub mod format;
pub mod p4info;
pub mod p4runtime;
pub mod rpc;

pub use client::P4RuntimeClient;
pub use format::FormatError;
pub use p4info::P4Info;
