use std::process::Stdio;

use anyhow::{bail, Context, Result};
use jsonrpsee::async_client::Client;
use serde_json::{Map, Value};
use statefulstring_resource::{rpc::ResourceProviderRpcClient, schema::v0};
use tokio::process::{Child, Command};

mod rpc;

pub struct ResourceProviderConfig {
    pub provider_executable: String,
    pub provider_args: Vec<String>,
}

/// A running provider process and the protocol channel to it.
pub struct ResourceProviderClient {
    provider_config: ResourceProviderConfig,
    process: Child,
    client: Client,
}

impl ResourceProviderClient {
    /// Start the provider process. Must be called within a tokio runtime.
    pub fn launch(provider_config: ResourceProviderConfig) -> Result<Self> {
        let mut process = Command::new(&provider_config.provider_executable)
            .args(&provider_config.provider_args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .with_context(|| {
                format!(
                    "Could not spawn provider process {}",
                    provider_config.provider_executable
                )
            })?;

        let client = rpc::build_rpc_client_from_child(&mut process)?;

        Ok(ResourceProviderClient {
            provider_config,
            process,
            client,
        })
    }

    fn failed(&self, method: &str) -> String {
        format!(
            "Provider {} failed to {}",
            self.provider_config.provider_executable, method
        )
    }

    pub async fn capabilities(&self) -> Result<v0::ProviderCapabilities> {
        ResourceProviderRpcClient::capabilities(&self.client)
            .await
            .with_context(|| self.failed("describe its capabilities"))
    }

    pub async fn check(
        &self,
        type_: &str,
        inputs: &Map<String, Value>,
    ) -> Result<v0::CheckResourceResponse> {
        tracing::debug!(%type_, "check");
        ResourceProviderRpcClient::check(&self.client, type_.to_string(), inputs.clone())
            .await
            .with_context(|| self.failed("check the inputs"))
    }

    pub async fn create(
        &self,
        type_: &str,
        name: &str,
        inputs: &Map<String, Value>,
    ) -> Result<v0::CreateResourceResponse> {
        tracing::debug!(%type_, %name, "create");
        ResourceProviderRpcClient::create(
            &self.client,
            type_.to_string(),
            name.to_string(),
            inputs.clone(),
        )
        .await
        .with_context(|| self.failed("create the resource"))
    }

    pub async fn diff(
        &self,
        resource: &v0::ExtantResource,
        inputs: &Map<String, Value>,
    ) -> Result<v0::DiffResourceResponse> {
        tracing::debug!(type_ = %resource.type_, "diff");
        ResourceProviderRpcClient::diff(&self.client, resource.clone(), inputs.clone())
            .await
            .with_context(|| self.failed("diff the resource"))
    }

    pub async fn update(
        &self,
        resource: &v0::ExtantResource,
        inputs: &Map<String, Value>,
    ) -> Result<v0::UpdateResourceResponse> {
        tracing::debug!(type_ = %resource.type_, "update");
        ResourceProviderRpcClient::update(&self.client, resource.clone(), inputs.clone())
            .await
            .with_context(|| self.failed("update the resource"))
    }

    pub async fn destroy(
        &self,
        resource: &v0::ExtantResource,
    ) -> Result<v0::DestroyResourceResponse> {
        tracing::debug!(type_ = %resource.type_, "destroy");
        ResourceProviderRpcClient::destroy(&self.client, resource.clone())
            .await
            .with_context(|| self.failed("destroy the resource"))
    }

    /// Close the channel and wait for the provider to exit.
    pub async fn shutdown(self) -> Result<()> {
        let ResourceProviderClient {
            provider_config,
            mut process,
            client,
        } = self;

        // The client's background task closes stdin once the client is gone
        drop(client);
        let status = process.wait().await.with_context(|| {
            format!(
                "Could not wait for provider {}",
                provider_config.provider_executable
            )
        })?;
        if !status.success() {
            bail!(
                "Provider {} exited with {}",
                provider_config.provider_executable,
                status
            );
        }
        Ok(())
    }
}

/// Gather input properties from the command line flags.
///
/// `json_pairs` and `str_pairs` are flattened NAME VALUE pairs. A property may
/// only be given once, whatever the flag; see the note on ordering in `main`.
pub fn collect_input_properties(
    inputs_json: Option<&str>,
    json_pairs: &[String],
    str_pairs: &[String],
) -> Result<Map<String, Value>> {
    let mut inputs = match inputs_json {
        Some(json_string) => serde_json::from_str::<Map<String, Value>>(json_string)
            .with_context(|| "failed to parse value of --inputs-json")?,
        None => Map::new(),
    };

    for pair in json_pairs.chunks(2) {
        let [k, v] = pair else {
            bail!("--input-json takes a NAME and a JSON value");
        };
        if inputs.contains_key(k) {
            bail!("duplicate input: {}", k);
        }
        inputs.insert(
            k.clone(),
            serde_json::from_str(v.as_str())
                .with_context(|| format!("failed to parse JSON value for input: {}", k))?,
        );
    }
    for pair in str_pairs.chunks(2) {
        let [k, v] = pair else {
            bail!("--input-str takes a NAME and a string");
        };
        if inputs.contains_key(k) {
            bail!("duplicate input: {}", k);
        }
        inputs.insert(k.clone(), Value::String(v.clone()));
    }

    Ok(inputs)
}
