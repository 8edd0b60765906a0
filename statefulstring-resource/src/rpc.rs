use std::future::Future;

use async_trait::async_trait;
use jsonrpsee::{
    core::{
        client::{ReceivedMessage, TransportReceiverT, TransportSenderT},
        RpcResult,
    },
    proc_macros::rpc,
    types::{ErrorCode, ErrorObject, ErrorObjectOwned},
};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::Instrument as _;

use crate::{framework::ResourceProvider, schema::v0};

#[rpc(client, server, namespace = "resource")]
pub trait ResourceProviderRpc {
    #[method(name = "capabilities")]
    async fn capabilities(&self) -> RpcResult<v0::ProviderCapabilities>;

    #[method(name = "check")]
    async fn check(
        &self,
        #[argument(rename = "type")] type_: String,
        #[argument(rename = "inputProperties")] input_properties: serde_json::Map<String, Value>,
    ) -> RpcResult<v0::CheckResourceResponse>;

    #[method(name = "create")]
    async fn create(
        &self,
        #[argument(rename = "type")] type_: String,
        name: String,
        #[argument(rename = "inputProperties")] input_properties: serde_json::Map<String, Value>,
    ) -> RpcResult<v0::CreateResourceResponse>;

    #[method(name = "diff")]
    async fn diff(
        &self,
        resource: v0::ExtantResource,
        #[argument(rename = "inputProperties")] input_properties: serde_json::Map<String, Value>,
    ) -> RpcResult<v0::DiffResourceResponse>;

    #[method(name = "update")]
    async fn update(
        &self,
        resource: v0::ExtantResource,
        #[argument(rename = "inputProperties")] input_properties: serde_json::Map<String, Value>,
    ) -> RpcResult<v0::UpdateResourceResponse>;

    #[method(name = "destroy")]
    async fn destroy(&self, resource: v0::ExtantResource)
        -> RpcResult<v0::DestroyResourceResponse>;
}

#[async_trait]
impl<T> ResourceProviderRpcServer for T
where
    T: ResourceProvider,
{
    async fn capabilities(&self) -> RpcResult<v0::ProviderCapabilities> {
        Ok(ResourceProvider::capabilities(self))
    }

    async fn check(
        &self,
        type_: String,
        inputs: serde_json::Map<String, Value>,
    ) -> RpcResult<v0::CheckResourceResponse> {
        let span = tracing::debug_span!("check", resource_type = %type_);
        let req = v0::CheckResourceRequest {
            type_: v0::ResourceType(type_),
            input_properties: v0::InputProperties(inputs),
        };

        ResourceProvider::check(self, req)
            .instrument(span)
            .await
            .map_err(handle_error)
    }

    async fn create(
        &self,
        type_: String,
        name: String,
        inputs: serde_json::Map<String, Value>,
    ) -> RpcResult<v0::CreateResourceResponse> {
        let span = tracing::debug_span!("create", resource_type = %type_, name = %name);
        let req = v0::CreateResourceRequest {
            type_: v0::ResourceType(type_),
            name,
            input_properties: v0::InputProperties(inputs),
        };

        ResourceProvider::create(self, req)
            .instrument(span)
            .await
            .map_err(handle_error)
    }

    async fn diff(
        &self,
        resource: v0::ExtantResource,
        inputs: serde_json::Map<String, Value>,
    ) -> RpcResult<v0::DiffResourceResponse> {
        let span = tracing::debug_span!("diff", resource_type = %resource.type_);
        let req = v0::DiffResourceRequest {
            resource,
            input_properties: v0::InputProperties(inputs),
        };

        ResourceProvider::diff(self, req)
            .instrument(span)
            .await
            .map_err(handle_error)
    }

    async fn update(
        &self,
        resource: v0::ExtantResource,
        inputs: serde_json::Map<String, Value>,
    ) -> RpcResult<v0::UpdateResourceResponse> {
        let span = tracing::debug_span!("update", resource_type = %resource.type_);
        let req = v0::UpdateResourceRequest {
            resource,
            input_properties: v0::InputProperties(inputs),
        };

        ResourceProvider::update(self, req)
            .instrument(span)
            .await
            .map_err(handle_error)
    }

    async fn destroy(&self, resource: v0::ExtantResource) -> RpcResult<v0::DestroyResourceResponse> {
        let span = tracing::debug_span!("destroy", resource_type = %resource.type_);
        let req = v0::DestroyResourceRequest { resource };

        ResourceProvider::destroy(self, req)
            .instrument(span)
            .await
            .map_err(handle_error)
    }
}

fn handle_error(error: anyhow::Error) -> ErrorObjectOwned {
    tracing::error!("{:?}", error);
    ErrorObject::owned(
        ErrorCode::InternalError.code(),
        "Resource provider encountered an error",
        Some(format!("{:#}", error)),
    )
}

/// Client side of the protocol channel: writes one message per line.
pub struct LineSender<W> {
    writer: W,
}

impl<W> LineSender<W> {
    pub fn new(writer: W) -> Self {
        LineSender { writer }
    }
}

impl<W> TransportSenderT for LineSender<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    type Error = std::io::Error;

    fn send(&mut self, msg: String) -> impl Future<Output = Result<(), Self::Error>> + Send {
        async move {
            self.writer.write_all(msg.as_bytes()).await?;
            self.writer.write_all(b"\n").await?;
            self.writer.flush().await
        }
    }

    fn close(&mut self) -> impl Future<Output = Result<(), Self::Error>> + Send {
        async move { self.writer.shutdown().await }
    }
}

/// Client side of the protocol channel: reads one message per line.
pub struct LineReceiver<R> {
    reader: BufReader<R>,
    buf: Vec<u8>,
}

impl<R> LineReceiver<R>
where
    R: AsyncRead,
{
    pub fn new(reader: R) -> Self {
        LineReceiver {
            reader: BufReader::new(reader),
            buf: Vec::new(),
        }
    }
}

impl<R> TransportReceiverT for LineReceiver<R>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    type Error = std::io::Error;

    fn receive(&mut self) -> impl Future<Output = Result<ReceivedMessage, Self::Error>> + Send {
        async move {
            loop {
                self.buf.clear();
                let n = self.reader.read_until(b'\n', &mut self.buf).await?;
                if n == 0 {
                    return Err(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        "resource provider closed its output",
                    ));
                }
                let line = std::str::from_utf8(&self.buf)
                    .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?
                    .trim();
                if !line.is_empty() {
                    return Ok(ReceivedMessage::Text(line.to_string()));
                }
            }
        }
    }
}
