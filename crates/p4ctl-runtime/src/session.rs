//! Device sessions.
//!
//! A session moves through three states, each its own type:
//!
//! 1. [`Connection`]: transport established, not yet primary.
//! 2. [`Arbitrated`]: this controller is primary for the device.
//! 3. [`Switch`]: the forwarding pipeline is installed; entries can be
//!    written and read.
//!
//! Only [`Switch`] exposes writes, so writing to a device that has no
//! pipeline is a compile error rather than a runtime failure. A failed
//! transition releases the session before returning the error.

use crate::error::RpcResult;
use async_trait::async_trait;
use p4ctl_catalog::{CounterId, TableEntry};
use p4ctl_proto::P4Info;
use std::fmt;
use tracing::{debug, info, warn};

/// Identity of one device.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SwitchInfo {
    /// Name used in logs and reports, e.g. `s1`.
    pub name: String,
    /// gRPC address, e.g. `127.0.0.1:50051`.
    pub address: String,
    pub device_id: u64,
}

impl SwitchInfo {
    pub fn new(name: impl Into<String>, address: impl Into<String>, device_id: u64) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            device_id,
        }
    }
}

impl fmt::Display for SwitchInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, device {})", self.name, self.address, self.device_id)
    }
}

/// One counter cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CounterReading {
    pub index: i64,
    pub packets: u64,
    pub bytes: u64,
}

/// What gets installed on every device before any entry is written.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub p4info: P4Info,
    /// Target-specific program, e.g. the BMv2 JSON.
    pub device_config: Vec<u8>,
}

impl PipelineConfig {
    pub fn new(p4info: P4Info, device_config: Vec<u8>) -> Self {
        Self {
            p4info,
            device_config,
        }
    }
}

/// The wire side of a session.
///
/// Implementations do not track session state themselves; ordering is
/// enforced by the typestate wrappers in this module.
#[async_trait]
pub trait Transport: Send + Sync {
    fn info(&self) -> &SwitchInfo;

    /// Claims primary role for the device.
    async fn arbitrate(&self) -> RpcResult<()>;

    async fn set_pipeline(&self, config: &PipelineConfig) -> RpcResult<()>;

    /// Inserts one entry.
    async fn write(&self, entry: &TableEntry) -> RpcResult<()>;

    /// Reads every entry of every table.
    async fn read_table_entries(&self) -> RpcResult<Vec<TableEntry>>;

    /// Reads one counter cell, or every cell when `index` is `None`.
    async fn read_counters(&self, counter: CounterId, index: Option<i64>) -> RpcResult<Vec<CounterReading>>;

    /// Releases the session. Calling it again is a no-op.
    async fn close(&self) -> RpcResult<()>;
}

/// Opens transports to devices.
#[async_trait]
pub trait Connector: Send + Sync {
    type Transport: Transport;

    async fn connect(&self, info: &SwitchInfo) -> RpcResult<Connection<Self::Transport>>;
}

async fn release<T: Transport>(transport: &T) {
    if let Err(e) = transport.close().await {
        warn!("Failed to release session {}: {}", transport.info().name, e);
    }
}

/// A connected session that is not primary yet.
#[derive(Debug)]
pub struct Connection<T: Transport> {
    transport: T,
}

impl<T: Transport> Connection<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn info(&self) -> &SwitchInfo {
        self.transport.info()
    }

    /// Becomes primary for the device. On failure the session is released.
    pub async fn arbitrate(self) -> RpcResult<Arbitrated<T>> {
        match self.transport.arbitrate().await {
            Ok(()) => {
                info!("Arbitration done for {}", self.transport.info());
                Ok(Arbitrated {
                    transport: self.transport,
                })
            }
            Err(e) => {
                release(&self.transport).await;
                Err(e)
            }
        }
    }

    pub async fn close(self) -> RpcResult<()> {
        self.transport.close().await
    }
}

/// A session holding primary role, without a pipeline.
#[derive(Debug)]
pub struct Arbitrated<T: Transport> {
    transport: T,
}

impl<T: Transport> Arbitrated<T> {
    pub fn info(&self) -> &SwitchInfo {
        self.transport.info()
    }

    /// Installs the forwarding program. On failure the session is released.
    pub async fn install_pipeline(self, config: &PipelineConfig) -> RpcResult<Switch<T>> {
        match self.transport.set_pipeline(config).await {
            Ok(()) => {
                info!("Installed P4 program on {}", self.transport.info().name);
                Ok(Switch {
                    transport: self.transport,
                })
            }
            Err(e) => {
                release(&self.transport).await;
                Err(e)
            }
        }
    }

    pub async fn close(self) -> RpcResult<()> {
        self.transport.close().await
    }
}

/// A configured device session.
#[derive(Debug)]
pub struct Switch<T: Transport> {
    transport: T,
}

impl<T: Transport> Switch<T> {
    pub fn info(&self) -> &SwitchInfo {
        self.transport.info()
    }

    pub fn name(&self) -> &str {
        &self.transport.info().name
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Writes one entry and waits for the device to acknowledge it.
    pub async fn write_table_entry(&self, entry: &TableEntry) -> RpcResult<()> {
        debug!(switch = %self.name(), table = %entry.table_id, "Write");
        self.transport.write(entry).await
    }

    pub async fn read_table_entries(&self) -> RpcResult<Vec<TableEntry>> {
        self.transport.read_table_entries().await
    }

    /// Reads a counter. Index 0 reads every index of the counter.
    pub async fn read_counters(&self, counter: CounterId, index: i64) -> RpcResult<Vec<CounterReading>> {
        let index = (index != 0).then_some(index);
        debug!(switch = %self.name(), counter = %counter, ?index, "Read counters");
        self.transport.read_counters(counter, index).await
    }

    /// Releases the session. Safe to call more than once.
    pub async fn close(&self) -> RpcResult<()> {
        self.transport.close().await
    }
}
