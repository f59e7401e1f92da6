//! P4Runtime device sessions.
//!
//! [`Connector`] opens a [`Connection`] to one device; arbitration and
//! pipeline installation turn it into a [`Switch`] that accepts table
//! writes and counter reads. Two transports are provided: [`GrpcConnector`]
//! speaks P4Runtime to a real target, [`MemoryFabric`] simulates targets in
//! process.

mod convert;
pub mod error;
pub mod grpc;
pub mod memory;
pub mod session;

pub use error::{Operation, RpcCode, RpcError, RpcResult, UpdateError};
pub use grpc::{GrpcConnector, GrpcTransport};
pub use memory::{MemoryDevice, MemoryFabric, MemoryTransport};
pub use session::{
    Arbitrated, Connection, Connector, CounterReading, PipelineConfig, Switch, SwitchInfo,
    Transport,
};
