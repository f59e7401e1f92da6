//! In-memory devices.
//!
//! A [`MemoryFabric`] stands in for a set of switches reachable over
//! P4Runtime. Each [`MemoryDevice`] keeps the state a real target would
//! (primary role, installed pipeline, table entries, counters) and exposes
//! knobs to inject the failures a real target can produce. The transport
//! enforces the same preconditions a P4Runtime server does, so sessions
//! driven against it fail the way they would on hardware.

use crate::error::{Operation, RpcCode, RpcError, RpcResult, UpdateError};
use crate::session::{Connection, Connector, CounterReading, PipelineConfig, SwitchInfo, Transport};
use async_trait::async_trait;
use p4ctl_catalog::{CounterId, TableEntry, TableId};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Copy)]
struct WriteFault {
    after: usize,
    code: RpcCode,
}

#[derive(Debug, Default)]
struct DeviceState {
    unreachable: bool,
    reject_arbitration: bool,
    pipeline_fault: Option<RpcCode>,
    write_fault: Option<WriteFault>,
    write_latency: Duration,

    connects: usize,
    closes: usize,
    primary: bool,
    pipeline: Option<PipelineConfig>,
    tables: HashSet<TableId>,
    counter_sizes: HashMap<CounterId, i64>,

    entries: Vec<TableEntry>,
    write_log: Vec<TableEntry>,
    counters: BTreeMap<(CounterId, i64), (u64, u64)>,
}

/// Handle to one simulated device. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryDevice {
    state: Arc<Mutex<DeviceState>>,
}

impl MemoryDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes connection attempts fail.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.state.lock().unreachable = unreachable;
    }

    /// Makes arbitration report that another controller is primary.
    pub fn reject_arbitration(&self, reject: bool) {
        self.state.lock().reject_arbitration = reject;
    }

    /// Makes the next pipeline installs fail with `code`.
    pub fn fail_pipeline(&self, code: RpcCode) {
        self.state.lock().pipeline_fault = Some(code);
    }

    /// Accepts `after` more writes, then fails every following write with
    /// `code`.
    pub fn fail_writes_after(&self, after: usize, code: RpcCode) {
        let mut state = self.state.lock();
        let after = state.write_log.len() + after;
        state.write_fault = Some(WriteFault { after, code });
    }

    /// Delays every following write by `latency` before it is applied.
    pub fn set_write_latency(&self, latency: Duration) {
        self.state.lock().write_latency = latency;
    }

    pub fn clear_faults(&self) {
        let mut state = self.state.lock();
        state.unreachable = false;
        state.reject_arbitration = false;
        state.pipeline_fault = None;
        state.write_fault = None;
    }

    /// Adds traffic to one counter cell.
    pub fn hit_counter(&self, counter: CounterId, index: i64, packets: u64, bytes: u64) {
        let mut state = self.state.lock();
        let cell = state.counters.entry((counter, index)).or_default();
        cell.0 += packets;
        cell.1 += bytes;
    }

    pub fn is_primary(&self) -> bool {
        self.state.lock().primary
    }

    pub fn pipeline(&self) -> Option<PipelineConfig> {
        self.state.lock().pipeline.clone()
    }

    /// Installed entries, in first-insertion order.
    pub fn entries(&self) -> Vec<TableEntry> {
        self.state.lock().entries.clone()
    }

    /// Installed entries of one table.
    pub fn entries_of(&self, table: TableId) -> Vec<TableEntry> {
        self.state
            .lock()
            .entries
            .iter()
            .filter(|e| e.table_id == table)
            .cloned()
            .collect()
    }

    /// Every accepted write, in order, including ones later overwritten.
    pub fn write_log(&self) -> Vec<TableEntry> {
        self.state.lock().write_log.clone()
    }

    pub fn connects(&self) -> usize {
        self.state.lock().connects
    }

    /// Number of times a session to this device was closed.
    pub fn closes(&self) -> usize {
        self.state.lock().closes
    }
}

/// A named set of [`MemoryDevice`]s, reachable through [`Connector`].
///
/// Connecting to a name the fabric has not seen yet creates the device.
#[derive(Debug, Clone, Default)]
pub struct MemoryFabric {
    devices: Arc<Mutex<HashMap<String, MemoryDevice>>>,
}

impl MemoryFabric {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the device called `name`, creating it when absent.
    pub fn device(&self, name: &str) -> MemoryDevice {
        self.devices
            .lock()
            .entry(name.to_string())
            .or_default()
            .clone()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.devices.lock().keys().cloned().collect();
        names.sort();
        names
    }
}

#[async_trait]
impl Connector for MemoryFabric {
    type Transport = MemoryTransport;

    async fn connect(&self, info: &SwitchInfo) -> RpcResult<Connection<MemoryTransport>> {
        let device = self.device(&info.name);
        {
            let mut state = device.state.lock();
            if state.unreachable {
                return Err(RpcError::Connect {
                    device: info.name.clone(),
                    address: info.address.clone(),
                    message: "connection refused".to_string(),
                });
            }
            state.connects += 1;
        }
        debug!("Connected to in-memory device {}", info);
        Ok(Connection::new(MemoryTransport {
            info: info.clone(),
            device,
        }))
    }
}

/// Session to a [`MemoryDevice`].
#[derive(Debug)]
pub struct MemoryTransport {
    info: SwitchInfo,
    device: MemoryDevice,
}

impl MemoryTransport {
    pub fn device(&self) -> &MemoryDevice {
        &self.device
    }

    fn error(&self, operation: Operation, code: RpcCode, message: impl Into<String>) -> RpcError {
        RpcError::status(&self.info.name, operation, code, message)
    }

    fn require_primary(&self, state: &DeviceState, operation: Operation) -> RpcResult<()> {
        if !state.primary {
            return Err(self.error(
                operation,
                RpcCode::FailedPrecondition,
                "controller is not primary",
            ));
        }
        Ok(())
    }

    fn require_pipeline(&self, state: &DeviceState, operation: Operation) -> RpcResult<()> {
        if state.pipeline.is_none() {
            return Err(self.error(
                operation,
                RpcCode::FailedPrecondition,
                "no forwarding pipeline installed",
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    fn info(&self) -> &SwitchInfo {
        &self.info
    }

    async fn arbitrate(&self) -> RpcResult<()> {
        let mut state = self.device.state.lock();
        if state.reject_arbitration {
            return Err(RpcError::NotPrimary {
                device: self.info.name.clone(),
                code: RpcCode::AlreadyExists,
                message: "a controller with a higher election id is primary".to_string(),
            });
        }
        state.primary = true;
        Ok(())
    }

    async fn set_pipeline(&self, config: &PipelineConfig) -> RpcResult<()> {
        let mut state = self.device.state.lock();
        self.require_primary(&state, Operation::SetPipeline)?;
        if let Some(code) = state.pipeline_fault {
            return Err(self.error(Operation::SetPipeline, code, "pipeline rejected"));
        }

        state.tables = config
            .p4info
            .tables
            .iter()
            .filter_map(|t| t.preamble.as_ref())
            .map(|p| TableId::from_raw(p.id))
            .collect();
        state.counter_sizes = config
            .p4info
            .counters
            .iter()
            .filter_map(|c| c.preamble.as_ref().map(|p| (CounterId::from_raw(p.id), c.size)))
            .collect();
        // a new program starts from empty tables and counters
        state.entries.clear();
        state.counters.clear();
        state.pipeline = Some(config.clone());
        Ok(())
    }

    async fn write(&self, entry: &TableEntry) -> RpcResult<()> {
        let latency = self.device.state.lock().write_latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.device.state.lock();
        self.require_primary(&state, Operation::Write)?;
        self.require_pipeline(&state, Operation::Write)?;

        if let Some(fault) = state.write_fault {
            if state.write_log.len() >= fault.after {
                let mut err = self.error(Operation::Write, RpcCode::Unknown, "Write failure.");
                if let RpcError::Status { details, .. } = &mut err {
                    details.push(UpdateError {
                        code: fault.code,
                        message: format!("injected failure on table {}", entry.table_id),
                    });
                }
                return Err(err);
            }
        }

        if !state.tables.contains(&entry.table_id) {
            return Err(self.error(
                Operation::Write,
                RpcCode::InvalidArgument,
                format!("unknown table {}", entry.table_id),
            ));
        }

        // last write for a key wins
        match state.entries.iter().position(|e| e.same_key(entry)) {
            Some(i) => state.entries[i] = entry.clone(),
            None => state.entries.push(entry.clone()),
        }
        state.write_log.push(entry.clone());
        Ok(())
    }

    async fn read_table_entries(&self) -> RpcResult<Vec<TableEntry>> {
        let state = self.device.state.lock();
        self.require_pipeline(&state, Operation::ReadEntries)?;
        Ok(state.entries.clone())
    }

    async fn read_counters(&self, counter: CounterId, index: Option<i64>) -> RpcResult<Vec<CounterReading>> {
        let state = self.device.state.lock();
        self.require_pipeline(&state, Operation::ReadCounters)?;
        let size = state.counter_sizes.get(&counter).copied().ok_or_else(|| {
            self.error(
                Operation::ReadCounters,
                RpcCode::NotFound,
                format!("unknown counter {counter}"),
            )
        })?;

        let reading = |index: i64| {
            let (packets, bytes) = state.counters.get(&(counter, index)).copied().unwrap_or_default();
            CounterReading {
                index,
                packets,
                bytes,
            }
        };
        match index {
            Some(index) if !(0..size).contains(&index) => Err(self.error(
                Operation::ReadCounters,
                RpcCode::OutOfRange,
                format!("index {index} out of range for counter {counter} of size {size}"),
            )),
            Some(index) => Ok(vec![reading(index)]),
            None => Ok((0..size).map(reading).collect()),
        }
    }

    async fn close(&self) -> RpcResult<()> {
        let mut state = self.device.state.lock();
        state.primary = false;
        state.closes += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use p4ctl_catalog::{ActionCall, ActionId, ActionParam, FieldMatch, MatchFieldId, MatchValue, ParamId};
    use p4ctl_proto::p4info::{self, P4Info};
    use pretty_assertions::assert_eq;

    const TABLE: u32 = 100;
    const COUNTER: u32 = 300;

    fn pipeline() -> PipelineConfig {
        let p4info = P4Info {
            tables: vec![p4info::Table {
                preamble: Some(p4info::Preamble {
                    id: TABLE,
                    name: "MyIngress.myTunnel_exact".to_string(),
                    ..Default::default()
                }),
                ..Default::default()
            }],
            counters: vec![p4info::Counter {
                preamble: Some(p4info::Preamble {
                    id: COUNTER,
                    name: "MyIngress.ingressTunnelCounter".to_string(),
                    ..Default::default()
                }),
                size: 4,
                ..Default::default()
            }],
            ..Default::default()
        };
        PipelineConfig::new(p4info, b"{}".to_vec())
    }

    fn entry(key: u8, port: u8) -> TableEntry {
        TableEntry {
            table_id: TableId::from_raw(TABLE),
            matches: vec![FieldMatch {
                field_id: MatchFieldId::from_raw(1),
                value: MatchValue::Exact { value: vec![0, key] },
            }],
            action: ActionCall {
                action_id: ActionId::from_raw(7),
                params: vec![ActionParam {
                    param_id: ParamId::from_raw(1),
                    value: vec![0, port],
                }],
            },
            priority: 0,
        }
    }

    async fn configured(device: &MemoryDevice) -> MemoryTransport {
        let transport = MemoryTransport {
            info: SwitchInfo::new("s1", "127.0.0.1:50051", 0),
            device: device.clone(),
        };
        transport.arbitrate().await.unwrap();
        transport.set_pipeline(&pipeline()).await.unwrap();
        transport
    }

    #[tokio::test]
    async fn test_write_requires_primary_and_pipeline() {
        let device = MemoryDevice::new();
        let transport = MemoryTransport {
            info: SwitchInfo::new("s1", "127.0.0.1:50051", 0),
            device: device.clone(),
        };
        let err = transport.write(&entry(1, 2)).await.unwrap_err();
        assert_eq!(err.code(), Some(RpcCode::FailedPrecondition));

        transport.arbitrate().await.unwrap();
        let err = transport.write(&entry(1, 2)).await.unwrap_err();
        assert_eq!(err.code(), Some(RpcCode::FailedPrecondition));
        assert!(device.entries().is_empty());
    }

    #[tokio::test]
    async fn test_last_write_wins() {
        let device = MemoryDevice::new();
        let transport = configured(&device).await;
        transport.write(&entry(1, 2)).await.unwrap();
        transport.write(&entry(2, 3)).await.unwrap();
        transport.write(&entry(1, 4)).await.unwrap();

        assert_eq!(device.entries(), vec![entry(1, 4), entry(2, 3)]);
        assert_eq!(device.write_log().len(), 3);
    }

    #[tokio::test]
    async fn test_unknown_table_is_rejected() {
        let device = MemoryDevice::new();
        let transport = configured(&device).await;
        let mut bad = entry(1, 2);
        bad.table_id = TableId::from_raw(999);
        let err = transport.write(&bad).await.unwrap_err();
        assert_eq!(err.code(), Some(RpcCode::InvalidArgument));
    }

    #[tokio::test]
    async fn test_injected_write_failure() {
        let device = MemoryDevice::new();
        let transport = configured(&device).await;
        device.fail_writes_after(1, RpcCode::ResourceExhausted);

        transport.write(&entry(1, 2)).await.unwrap();
        let err = transport.write(&entry(2, 2)).await.unwrap_err();
        match err {
            RpcError::Status { code, details, .. } => {
                assert_eq!(code, RpcCode::Unknown);
                assert_eq!(details[0].code, RpcCode::ResourceExhausted);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(device.entries(), vec![entry(1, 2)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_latency() {
        let device = MemoryDevice::new();
        let transport = configured(&device).await;
        device.set_write_latency(Duration::from_millis(10));

        let start = tokio::time::Instant::now();
        transport.write(&entry(1, 2)).await.unwrap();
        transport.write(&entry(2, 2)).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(20));
        assert_eq!(device.entries().len(), 2);
    }

    #[tokio::test]
    async fn test_cleared_faults_accept_writes_again() {
        let device = MemoryDevice::new();
        let transport = configured(&device).await;
        device.fail_writes_after(0, RpcCode::Internal);
        assert!(transport.write(&entry(1, 2)).await.is_err());

        device.clear_faults();
        transport.write(&entry(1, 2)).await.unwrap();
        assert_eq!(device.entries(), vec![entry(1, 2)]);
    }

    #[tokio::test]
    async fn test_counter_reads() {
        let device = MemoryDevice::new();
        let transport = configured(&device).await;
        let counter = CounterId::from_raw(COUNTER);
        device.hit_counter(counter, 2, 10, 980);
        device.hit_counter(counter, 2, 1, 98);

        let one = transport.read_counters(counter, Some(2)).await.unwrap();
        assert_eq!(
            one,
            vec![CounterReading {
                index: 2,
                packets: 11,
                bytes: 1078
            }]
        );

        let all = transport.read_counters(counter, None).await.unwrap();
        assert_eq!(all.len(), 4);
        assert_eq!(all.iter().map(|r| r.packets).sum::<u64>(), 11);

        let err = transport.read_counters(counter, Some(4)).await.unwrap_err();
        assert_eq!(err.code(), Some(RpcCode::OutOfRange));
        let err = transport
            .read_counters(CounterId::from_raw(1), None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some(RpcCode::NotFound));
    }

    #[tokio::test]
    async fn test_new_pipeline_clears_state() {
        let device = MemoryDevice::new();
        let transport = configured(&device).await;
        transport.write(&entry(1, 2)).await.unwrap();
        device.hit_counter(CounterId::from_raw(COUNTER), 0, 1, 1);

        transport.set_pipeline(&pipeline()).await.unwrap();
        assert!(device.entries().is_empty());
        let all = transport
            .read_counters(CounterId::from_raw(COUNTER), None)
            .await
            .unwrap();
        assert!(all.iter().all(|r| r.packets == 0));
    }

    #[tokio::test]
    async fn test_close_drops_primary() {
        let device = MemoryDevice::new();
        let transport = configured(&device).await;
        assert!(device.is_primary());
        transport.close().await.unwrap();
        transport.close().await.unwrap();
        assert!(!device.is_primary());
        assert_eq!(device.closes(), 2);
    }
}
