//! gRPC client for the `p4.v1.P4Runtime` service.

use crate::p4runtime::{
    ReadRequest, ReadResponse, SetForwardingPipelineConfigRequest,
    SetForwardingPipelineConfigResponse, StreamMessageRequest, StreamMessageResponse,
    WriteRequest, WriteResponse,
};
use tonic::codec::{ProstCodec, Streaming};
use tonic::codegen::http::uri::PathAndQuery;
use tonic::transport::{Channel, Endpoint};
use tonic::{IntoRequest, IntoStreamingRequest, Response, Status};

const WRITE: &str = "/p4.v1.P4Runtime/Write";
const READ: &str = "/p4.v1.P4Runtime/Read";
const SET_PIPELINE: &str = "/p4.v1.P4Runtime/SetForwardingPipelineConfig";
const STREAM_CHANNEL: &str = "/p4.v1.P4Runtime/StreamChannel";

/// Thin wrapper over a `tonic` channel exposing the four RPCs the controller
/// uses. Cloning is cheap and shares the underlying HTTP/2 connection.
#[derive(Debug, Clone)]
pub struct P4RuntimeClient {
    inner: tonic::client::Grpc<Channel>,
}

impl P4RuntimeClient {
    pub fn new(channel: Channel) -> Self {
        Self {
            inner: tonic::client::Grpc::new(channel),
        }
    }

    /// Connects to `endpoint` (e.g. `http://127.0.0.1:50051`).
    pub async fn connect(endpoint: Endpoint) -> Result<Self, tonic::transport::Error> {
        let channel = endpoint.connect().await?;
        Ok(Self::new(channel))
    }

    async fn ready(&mut self) -> Result<(), Status> {
        self.inner
            .ready()
            .await
            .map_err(|e| Status::unknown(format!("service was not ready: {e}")))
    }

    pub async fn write(
        &mut self,
        request: impl IntoRequest<WriteRequest>,
    ) -> Result<Response<WriteResponse>, Status> {
        self.ready().await?;
        self.inner
            .unary(
                request.into_request(),
                PathAndQuery::from_static(WRITE),
                ProstCodec::default(),
            )
            .await
    }

    /// Server-streaming read; each response carries a batch of entities.
    pub async fn read(
        &mut self,
        request: impl IntoRequest<ReadRequest>,
    ) -> Result<Response<Streaming<ReadResponse>>, Status> {
        self.ready().await?;
        self.inner
            .server_streaming(
                request.into_request(),
                PathAndQuery::from_static(READ),
                ProstCodec::default(),
            )
            .await
    }

    pub async fn set_forwarding_pipeline_config(
        &mut self,
        request: impl IntoRequest<SetForwardingPipelineConfigRequest>,
    ) -> Result<Response<SetForwardingPipelineConfigResponse>, Status> {
        self.ready().await?;
        self.inner
            .unary(
                request.into_request(),
                PathAndQuery::from_static(SET_PIPELINE),
                ProstCodec::default(),
            )
            .await
    }

    /// Opens the bidirectional stream used for arbitration.
    pub async fn stream_channel(
        &mut self,
        request: impl IntoStreamingRequest<Message = StreamMessageRequest>,
    ) -> Result<Response<Streaming<StreamMessageResponse>>, Status> {
        self.ready().await?;
        self.inner
            .streaming(
                request.into_streaming_request(),
                PathAndQuery::from_static(STREAM_CHANNEL),
                ProstCodec::default(),
            )
            .await
    }
}
