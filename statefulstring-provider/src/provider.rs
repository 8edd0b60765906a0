use anyhow::{bail, Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use statefulstring_resource::{
    framework::ResourceProvider,
    schema::v0::{self, CheckFailure},
};

use crate::lifecycle::StatefulString;
use crate::resource::{trigger_path, StatefulStringArgs, StatefulStringState, STRING_PATH};

pub const NAME: &str = "statefulString";
pub const STATEFUL_STRING_TYPE: &str = "statefulString:index:StatefulString";

pub struct StatefulStringProvider {}

impl StatefulStringProvider {
    fn resource(&self, type_: &v0::ResourceType, operation: &str) -> Result<StatefulString> {
        match type_.as_str() {
            STATEFUL_STRING_TYPE => Ok(StatefulString {}),
            t => bail!(
                "StatefulStringProvider::{}: unknown resource type: {}",
                operation,
                t
            ),
        }
    }
}

#[async_trait::async_trait]
impl ResourceProvider for StatefulStringProvider {
    fn capabilities(&self) -> v0::ProviderCapabilities {
        v0::ProviderCapabilities {
            name: NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            resource_types: vec![v0::ResourceType::from(STATEFUL_STRING_TYPE)],
            validates_inputs: true,
            destroys: false,
        }
    }

    async fn check(&self, request: v0::CheckResourceRequest) -> Result<v0::CheckResourceResponse> {
        let resource = self.resource(&request.type_, "check")?;

        let failures = structural_failures(&request.input_properties);
        if !failures.is_empty() {
            tracing::info!(failures = failures.len(), "rejected input properties");
            return Ok(v0::CheckResourceResponse {
                input_properties: request.input_properties,
                failures,
            });
        }

        for key in request.input_properties.keys() {
            if key != STRING_PATH && key != "triggers" {
                tracing::warn!(property = %key, "ignoring unknown input property");
            }
        }

        let inputs: StatefulStringArgs =
            parse_properties(&request.input_properties, &request.type_, "input")?;
        let (normalized, failures) = resource.check(inputs);
        Ok(v0::CheckResourceResponse {
            input_properties: v0::InputProperties(to_properties(&normalized)?),
            failures,
        })
    }

    async fn create(
        &self,
        request: v0::CreateResourceRequest,
    ) -> Result<v0::CreateResourceResponse> {
        let resource = self.resource(&request.type_, "create")?;
        let inputs: StatefulStringArgs =
            parse_properties(&request.input_properties, &request.type_, "input")?;

        let (id, state) = resource.create(&request.name, inputs);
        tracing::info!(id = %id, "created resource");

        Ok(v0::CreateResourceResponse {
            id,
            output_properties: v0::OutputProperties(to_properties(&state)?),
        })
    }

    async fn diff(&self, request: v0::DiffResourceRequest) -> Result<v0::DiffResourceResponse> {
        let resource = self.resource(&request.resource.type_, "diff")?;
        let old = previous_state(&request.resource, "diff")?;
        let new: StatefulStringArgs =
            parse_properties(&request.input_properties, &request.resource.type_, "input")?;

        let report = resource.diff(&old, &new);

        Ok(v0::DiffResourceResponse {
            has_changes: report.has_changes,
            detailed_diff: report
                .detailed_diff
                .into_iter()
                .map(|(path, kind)| (path, kind.into()))
                .collect(),
        })
    }

    async fn update(
        &self,
        request: v0::UpdateResourceRequest,
    ) -> Result<v0::UpdateResourceResponse> {
        let resource = self.resource(&request.resource.type_, "update")?;
        let old = previous_state(&request.resource, "update")?;
        let new: StatefulStringArgs =
            parse_properties(&request.input_properties, &request.resource.type_, "input")?;

        let state = resource.update(&old, &new);
        if state.args.string != new.string {
            tracing::info!("no trigger changed; the string keeps its previous value");
        }

        Ok(v0::UpdateResourceResponse {
            output_properties: v0::OutputProperties(to_properties(&state)?),
        })
    }
}

fn previous_state(resource: &v0::ExtantResource, operation: &str) -> Result<StatefulStringState> {
    let output_properties = resource.output_properties.as_ref().ok_or_else(|| {
        anyhow::anyhow!(
            "The {} operation on a {} resource requires that the output properties are set",
            operation,
            resource.type_
        )
    })?;
    parse_properties(output_properties, &resource.type_, "output")
}

/// Problems that would make the input properties undecodable.
fn structural_failures(input_properties: &Map<String, Value>) -> Vec<CheckFailure> {
    let mut failures = Vec::new();

    match input_properties.get(STRING_PATH) {
        None | Some(Value::String(_)) => {}
        Some(other) => failures.push(CheckFailure {
            property: STRING_PATH.to_string(),
            reason: format!("expected a string, got {}", json_type(other)),
        }),
    }

    match input_properties.get("triggers") {
        None => {}
        Some(Value::Object(triggers)) => {
            for (key, value) in triggers {
                if !value.is_string() {
                    failures.push(CheckFailure {
                        property: trigger_path(key),
                        reason: format!("expected a string, got {}", json_type(value)),
                    });
                }
            }
        }
        Some(other) => failures.push(CheckFailure {
            property: "triggers".to_string(),
            reason: format!("expected an object of strings, got {}", json_type(other)),
        }),
    }

    failures
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn parse_properties<T: DeserializeOwned>(
    properties: &Map<String, Value>,
    resource_type: &v0::ResourceType,
    which: &str,
) -> Result<T> {
    serde_json::from_value(Value::Object(properties.clone())).with_context(|| {
        format!(
            "Could not deserialize {} properties for {} resource",
            which, resource_type
        )
    })
}

fn to_properties<T: Serialize>(value: &T) -> Result<Map<String, Value>> {
    match serde_json::to_value(value)? {
        Value::Object(o) => Ok(o),
        _ => bail!("Expected object as output"),
    }
}
