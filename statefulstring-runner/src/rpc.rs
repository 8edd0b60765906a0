use anyhow::{Context, Result};
use jsonrpsee::async_client::{Client, ClientBuilder};
use statefulstring_resource::rpc::{LineReceiver, LineSender};
use tokio::process;

/// Connect a JSON-RPC client to the protocol channel of a provider process.
///
/// Must be called within a tokio runtime.
pub(crate) fn build_rpc_client_from_child(process: &mut process::Child) -> Result<Client> {
    let sender = LineSender::new(
        process
            .stdin
            .take()
            .context("provider process has no stdin")?,
    );
    let receiver = LineReceiver::new(
        process
            .stdout
            .take()
            .context("provider process has no stdout")?,
    );

    Ok(ClientBuilder::new().build_with_tokio(sender, receiver))
}
