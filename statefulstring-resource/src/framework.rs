use std::os::fd::{AsRawFd, FromRawFd};

use anyhow::{Context, Result};
use async_trait::async_trait;
use jsonrpsee::{types::ErrorCode, RpcModule};
use nix::unistd::{dup, dup2};
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::{logging, rpc::ResourceProviderRpcServer, schema::v0};

/// The operations a resource provider serves.
///
/// Every operation receives the complete prior state it needs, so a provider
/// does not have to keep anything between calls.
#[async_trait]
pub trait ResourceProvider: Send + Sync + 'static {
    /// Describe the provider and which of its operations do real work.
    fn capabilities(&self) -> v0::ProviderCapabilities;

    /// Validate and normalize inputs before any other operation sees them.
    ///
    /// The default accepts the inputs as they are.
    async fn check(&self, request: v0::CheckResourceRequest) -> Result<v0::CheckResourceResponse> {
        Ok(v0::CheckResourceResponse {
            input_properties: request.input_properties,
            failures: Vec::new(),
        })
    }

    async fn create(&self, request: v0::CreateResourceRequest)
        -> Result<v0::CreateResourceResponse>;

    async fn diff(&self, request: v0::DiffResourceRequest) -> Result<v0::DiffResourceResponse>;

    async fn update(&self, request: v0::UpdateResourceRequest)
        -> Result<v0::UpdateResourceResponse>;

    /// The default has nothing to tear down; the host just forgets the resource.
    async fn destroy(
        &self,
        _request: v0::DestroyResourceRequest,
    ) -> Result<v0::DestroyResourceResponse> {
        Ok(v0::DestroyResourceResponse {})
    }
}

/// Run a provider as a process: set up logging, take over the protocol
/// channel and serve requests until the host closes it.
pub async fn run_main(provider: impl ResourceProvider) {
    logging::Options::from_env()
        .and_then(|options| logging::set_up(&options))
        .with_context(|| "Could not set up logging")
        .unwrap_or_exit();

    let pipe = init_stdio()
        .with_context(|| "Could not set up the protocol channel")
        .unwrap_or_exit();
    let pipe = pipe_fds_to_files(pipe);

    let capabilities = ResourceProvider::capabilities(&provider);
    tracing::info!(
        provider = %capabilities.name,
        version = %capabilities.version,
        "resource provider started"
    );

    let module = provider.into_rpc();
    let reader = BufReader::new(tokio::fs::File::from_std(pipe.in_));
    let writer = tokio::fs::File::from_std(pipe.out);

    serve(&module, reader, writer)
        .await
        .with_context(|| "Could not serve requests")
        .unwrap_or_exit();

    tracing::info!("input closed, shutting down");
}

/// Answer newline-delimited JSON-RPC requests from `reader` on `writer`, one
/// response line per request line, until `reader` reaches end of input.
///
/// Notifications are executed but never answered.
pub async fn serve<Ctx, R, W>(module: &RpcModule<Ctx>, mut reader: R, mut writer: W) -> Result<()>
where
    Ctx: Send + Sync + 'static,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut line = Vec::new();
    loop {
        line.clear();
        let n = reader
            .read_until(b'\n', &mut line)
            .await
            .with_context(|| "Could not read request message")?;
        if n == 0 {
            return Ok(());
        }
        let Some(response) = answer(module, &line).await else {
            continue;
        };
        writer
            .write_all(response.as_bytes())
            .await
            .with_context(|| "Could not write response message")?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
    }
}

/// The response line for one request line, if it gets one.
async fn answer<Ctx>(module: &RpcModule<Ctx>, line: &[u8]) -> Option<String>
where
    Ctx: Send + Sync + 'static,
{
    let line = match std::str::from_utf8(line) {
        Ok(line) => line.trim(),
        Err(e) => {
            tracing::warn!("Could not parse request message: {}", e);
            return Some(error_response(ErrorCode::ParseError, Value::Null));
        }
    };
    if line.is_empty() {
        return None;
    }

    let mut request: Value = match serde_json::from_str(line) {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!("Could not parse request message: {}", e);
            return Some(error_response(ErrorCode::ParseError, Value::Null));
        }
    };

    // A request without an id is a notification. It runs like any other
    // request, but its response is discarded.
    let notification = match request.as_object_mut() {
        Some(fields) if !fields.contains_key("id") => {
            fields.insert("id".to_string(), Value::Null);
            true
        }
        _ => false,
    };

    let response = match module.raw_json_request(&request.to_string(), 1).await {
        Ok((response, _subscriptions)) => response.to_string(),
        Err(e) => {
            tracing::warn!("Invalid request message: {}", e);
            let id = request
                .get("id")
                .filter(|id| id.is_string() || id.is_number())
                .cloned()
                .unwrap_or(Value::Null);
            error_response(ErrorCode::InvalidRequest, id)
        }
    };

    if notification {
        tracing::debug!("not answering notification");
        return None;
    }
    Some(response)
}

fn error_response(code: ErrorCode, id: Value) -> String {
    json!({
        "jsonrpc": "2.0",
        "error": {
            "code": code.code(),
            "message": code.message(),
        },
        "id": id,
    })
    .to_string()
}

/// A pair of `T` values: one for input and one for output.
struct InOut<T> {
    in_: T,
    out: T,
}

/// A file descriptor
type Fd = i32;

/// Configure the standard input/output streams for the process.
/// This returns the communication channels with the host, and reconfigures the
/// stdio file descriptor as follows:
///
/// ```text
/// 0: /dev/null
/// 1: stderr
/// 2: stderr
/// ```
fn init_stdio() -> Result<InOut<Fd>> {
    let r = InOut {
        in_: dup(0).with_context(|| "dup(0)")?,
        out: dup(1).with_context(|| "dup(1)")?,
    };

    // 0: dev/null
    {
        let dev_null =
            std::fs::File::open("/dev/null").with_context(|| "Could not open /dev/null")?;
        dup2(dev_null.as_raw_fd(), 0).with_context(|| "Could not dup2(/dev/null, 0)")?;
    }

    // 1: stderr
    dup2(2, 1).with_context(|| "Could not dup2(2, 1)")?;

    // 2: stderr is left as is

    Ok(r)
}

fn pipe_fds_to_files(pipe: InOut<Fd>) -> InOut<std::fs::File> {
    // Both descriptors come fresh from dup(), so we are their sole owner.
    InOut {
        in_: unsafe { std::fs::File::from_raw_fd(pipe.in_) },
        out: unsafe { std::fs::File::from_raw_fd(pipe.out) },
    }
}

trait ProviderMainError<T> {
    type V;
    fn unwrap_or_exit(self) -> Self::V;
}
impl<T> ProviderMainError<Result<T>> for Result<T> {
    type V = T;
    fn unwrap_or_exit(self) -> T {
        match self {
            Ok(v) => v,
            Err(e) => {
                eprintln!("Error: {:?}", e);
                std::process::exit(1);
            }
        }
    }
}
