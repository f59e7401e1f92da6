//! P4Runtime over gRPC.

use crate::convert::{counter_reading_from_proto, table_entry_from_proto, table_entry_to_proto};
use crate::error::{Operation, RpcCode, RpcError, RpcResult, UpdateError};
use crate::session::{Connection, Connector, CounterReading, PipelineConfig, SwitchInfo, Transport};
use async_trait::async_trait;
use p4ctl_catalog::{CounterId, TableEntry};
use p4ctl_proto::p4runtime::{
    self as p4, entity, set_forwarding_pipeline_config_request, stream_message_request,
    stream_message_response, update, write_request,
};
use p4ctl_proto::{rpc, P4RuntimeClient};
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio_stream::wrappers::ReceiverStream;
use tonic::codec::Streaming;
use tonic::transport::Endpoint;
use tracing::{debug, info, warn};

/// Election id claimed by the controller. Any non-zero id wins an
/// uncontested election.
pub const ELECTION_ID: p4::Uint128 = p4::Uint128 { high: 0, low: 1 };

const STREAM_BUFFER: usize = 16;

/// The open stream channel. Holding it keeps the primary role.
struct StreamChannel {
    _requests: mpsc::Sender<p4::StreamMessageRequest>,
    _responses: Streaming<p4::StreamMessageResponse>,
}

pub struct GrpcTransport {
    info: SwitchInfo,
    client: P4RuntimeClient,
    stream: Mutex<Option<StreamChannel>>,
}

impl std::fmt::Debug for GrpcTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GrpcTransport").field("info", &self.info).finish()
    }
}

impl GrpcTransport {
    pub fn new(info: SwitchInfo, client: P4RuntimeClient) -> Self {
        Self {
            info,
            client,
            stream: Mutex::new(None),
        }
    }

    fn status_error(&self, operation: Operation, status: tonic::Status) -> RpcError {
        let details = rpc::p4_errors(status.details())
            .into_iter()
            .map(|e| UpdateError {
                code: RpcCode::from_raw(e.canonical_code),
                message: e.message,
            })
            .collect();
        RpcError::Status {
            device: self.info.name.clone(),
            operation,
            code: status.code().into(),
            message: status.message().to_string(),
            details,
        }
    }

    async fn read(&self, operation: Operation, entity: entity::Entity) -> RpcResult<Vec<p4::Entity>> {
        let request = p4::ReadRequest {
            device_id: self.info.device_id,
            entities: vec![p4::Entity {
                entity: Some(entity),
            }],
            ..Default::default()
        };
        let mut stream = self
            .client
            .clone()
            .read(request)
            .await
            .map_err(|s| self.status_error(operation, s))?
            .into_inner();

        let mut entities = Vec::new();
        while let Some(response) = stream
            .message()
            .await
            .map_err(|s| self.status_error(operation, s))?
        {
            entities.extend(response.entities);
        }
        Ok(entities)
    }
}

#[async_trait]
impl Transport for GrpcTransport {
    fn info(&self) -> &SwitchInfo {
        &self.info
    }

    async fn arbitrate(&self) -> RpcResult<()> {
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        let request = p4::StreamMessageRequest {
            update: Some(stream_message_request::Update::Arbitration(
                p4::MasterArbitrationUpdate {
                    device_id: self.info.device_id,
                    election_id: Some(ELECTION_ID),
                    ..Default::default()
                },
            )),
        };
        tx.send(request)
            .await
            .map_err(|_| RpcError::stream_closed(&self.info.name, Operation::Arbitrate))?;

        let mut responses = self
            .client
            .clone()
            .stream_channel(ReceiverStream::new(rx))
            .await
            .map_err(|s| self.status_error(Operation::Arbitrate, s))?
            .into_inner();

        loop {
            let message = responses
                .message()
                .await
                .map_err(|s| self.status_error(Operation::Arbitrate, s))?
                .ok_or_else(|| RpcError::stream_closed(&self.info.name, Operation::Arbitrate))?;

            match message.update {
                Some(stream_message_response::Update::Arbitration(arbitration)) => {
                    let status = arbitration.status.unwrap_or_default();
                    let code = RpcCode::from_raw(status.code);
                    if !code.is_ok() {
                        return Err(RpcError::NotPrimary {
                            device: self.info.name.clone(),
                            code,
                            message: status.message,
                        });
                    }
                    *self.stream.lock().await = Some(StreamChannel {
                        _requests: tx,
                        _responses: responses,
                    });
                    return Ok(());
                }
                Some(stream_message_response::Update::Error(error)) => {
                    warn!(
                        "Stream error from {} during arbitration: {}",
                        self.info.name, error.message
                    );
                }
                None => debug!("Ignoring empty stream message from {}", self.info.name),
            }
        }
    }

    async fn set_pipeline(&self, config: &PipelineConfig) -> RpcResult<()> {
        let request = p4::SetForwardingPipelineConfigRequest {
            device_id: self.info.device_id,
            election_id: Some(ELECTION_ID),
            action: set_forwarding_pipeline_config_request::Action::VerifyAndCommit.into(),
            config: Some(p4::ForwardingPipelineConfig {
                p4info: Some(config.p4info.clone()),
                p4_device_config: config.device_config.clone(),
                cookie: None,
            }),
            ..Default::default()
        };
        self.client
            .clone()
            .set_forwarding_pipeline_config(request)
            .await
            .map_err(|s| self.status_error(Operation::SetPipeline, s))?;
        Ok(())
    }

    async fn write(&self, entry: &TableEntry) -> RpcResult<()> {
        let request = p4::WriteRequest {
            device_id: self.info.device_id,
            election_id: Some(ELECTION_ID),
            updates: vec![p4::Update {
                r#type: update::Type::Insert.into(),
                entity: Some(p4::Entity {
                    entity: Some(entity::Entity::TableEntry(table_entry_to_proto(entry))),
                }),
            }],
            atomicity: write_request::Atomicity::ContinueOnError.into(),
            ..Default::default()
        };
        debug!(switch = %self.info.name, ?request, "WriteRequest");
        self.client
            .clone()
            .write(request)
            .await
            .map_err(|s| self.status_error(Operation::Write, s))?;
        Ok(())
    }

    async fn read_table_entries(&self) -> RpcResult<Vec<TableEntry>> {
        // table_id 0 is a wildcard over all tables
        let entities = self
            .read(
                Operation::ReadEntries,
                entity::Entity::TableEntry(p4::TableEntry::default()),
            )
            .await?;
        entities
            .into_iter()
            .filter_map(|e| match e.entity {
                Some(entity::Entity::TableEntry(entry)) => Some(entry),
                _ => None,
            })
            .map(|entry| {
                table_entry_from_proto(entry)
                    .map_err(|m| RpcError::malformed(&self.info.name, Operation::ReadEntries, m))
            })
            .collect()
    }

    async fn read_counters(&self, counter: CounterId, index: Option<i64>) -> RpcResult<Vec<CounterReading>> {
        let entities = self
            .read(
                Operation::ReadCounters,
                entity::Entity::CounterEntry(p4::CounterEntry {
                    counter_id: counter.as_raw(),
                    index: index.map(|index| p4::Index { index }),
                    data: None,
                }),
            )
            .await?;
        Ok(entities
            .iter()
            .filter_map(|e| match &e.entity {
                Some(entity::Entity::CounterEntry(entry)) => Some(counter_reading_from_proto(entry)),
                _ => None,
            })
            .collect())
    }

    async fn close(&self) -> RpcResult<()> {
        if self.stream.lock().await.take().is_some() {
            debug!("Closed stream channel to {}", self.info.name);
        }
        Ok(())
    }
}

/// Connects to devices over plaintext HTTP/2.
#[derive(Debug, Clone)]
pub struct GrpcConnector {
    connect_timeout: Duration,
}

impl GrpcConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for GrpcConnector {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

#[async_trait]
impl Connector for GrpcConnector {
    type Transport = GrpcTransport;

    async fn connect(&self, info: &SwitchInfo) -> RpcResult<Connection<GrpcTransport>> {
        let connect_error = |message: String| RpcError::Connect {
            device: info.name.clone(),
            address: info.address.clone(),
            message,
        };
        let uri = if info.address.contains("://") {
            info.address.clone()
        } else {
            format!("http://{}", info.address)
        };
        let endpoint = Endpoint::from_shared(uri)
            .map_err(|e| connect_error(e.to_string()))?
            .connect_timeout(self.connect_timeout);
        let client = P4RuntimeClient::connect(endpoint)
            .await
            .map_err(|e| connect_error(e.to_string()))?;
        info!("Connected to {}", info);
        Ok(Connection::new(GrpcTransport::new(info.clone(), client)))
    }
}
