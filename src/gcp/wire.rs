// ABOUTME: JSON request and response bodies for the Google Cloud REST APIs.
// ABOUTME: Converts between backend trait types and the camelCase wire format.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::backend::{
    ApiCode, ApiError, ApiState, BuildRecord, BuildSpec, BuildStatus, LogEntry, LogQuery,
    Operation, Repository, ServiceDefinition, ServiceRecord,
};
use crate::types::BuildId;

// --- long-running operations ---

#[derive(Debug, Deserialize)]
pub(crate) struct OperationJson {
    pub name: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub response: Option<Value>,
    #[serde(default)]
    pub error: Option<StatusJson>,
    #[serde(default)]
    pub metadata: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StatusJson {
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub message: String,
}

impl OperationJson {
    /// A finished operation carrying an error becomes that error.
    pub fn into_operation(self) -> Result<Operation, ApiError> {
        if let Some(status) = self.error {
            return Err(ApiError::new(ApiCode::from_grpc(status.code), status.message));
        }
        Ok(Operation {
            name: crate::types::OperationName::new(self.name),
            done: self.done,
            response: self.response,
        })
    }

    /// Cloud Build reports the new build under `metadata.build.id`.
    pub fn build_id(&self) -> Option<BuildId> {
        self.metadata
            .as_ref()?
            .get("build")?
            .get("id")?
            .as_str()
            .map(BuildId::new)
    }
}

/// Decode the final resource of a finished operation.
pub(crate) fn decode_response<T: for<'de> Deserialize<'de>>(
    response: Option<Value>,
) -> Result<T, ApiError> {
    let value = response.unwrap_or(Value::Object(Default::default()));
    serde_json::from_value(value)
        .map_err(|e| ApiError::internal(format!("unexpected operation response: {e}")))
}

// --- Cloud Run v2 ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ServiceBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<&'a str>,
    pub labels: &'a BTreeMap<String, String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub invoker_iam_disabled: bool,
    pub template: RevisionTemplate<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RevisionTemplate<'a> {
    pub revision: &'a str,
    pub containers: Vec<Container<'a>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct Container<'a> {
    pub image: String,
    pub resources: Resources<'a>,
}

#[derive(Debug, Serialize)]
pub(crate) struct Resources<'a> {
    pub limits: BTreeMap<&'static str, &'a str>,
}

impl<'a> ServiceBody<'a> {
    pub fn new(name: Option<&'a str>, definition: &'a ServiceDefinition) -> Self {
        let mut limits = BTreeMap::new();
        limits.insert("cpu", definition.cpu.as_str());
        limits.insert("memory", definition.memory.as_str());
        Self {
            name,
            labels: &definition.labels,
            invoker_iam_disabled: definition.invoker_iam_disabled,
            template: RevisionTemplate {
                revision: &definition.revision,
                containers: vec![Container {
                    image: definition.image.to_string(),
                    resources: Resources { limits },
                }],
            },
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ServiceJson {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub latest_ready_revision: Option<String>,
    #[serde(default)]
    pub invoker_iam_disabled: bool,
}

impl From<ServiceJson> for ServiceRecord {
    fn from(json: ServiceJson) -> Self {
        ServiceRecord {
            name: json.name,
            uri: json.uri,
            latest_ready_revision: json.latest_ready_revision,
            invoker_iam_disabled: json.invoker_iam_disabled,
        }
    }
}

// --- Cloud Storage ---

#[derive(Debug, Serialize)]
pub(crate) struct BucketBody<'a> {
    pub name: &'a str,
    pub location: &'a str,
}

// --- Artifact Registry ---

#[derive(Debug, Serialize)]
pub(crate) struct RepositoryBody<'a> {
    pub format: &'a str,
    pub description: &'a str,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RepositoryJson {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub format: String,
}

impl From<RepositoryJson> for Repository {
    fn from(json: RepositoryJson) -> Self {
        Repository {
            name: json.name,
            format: json.format,
        }
    }
}

// --- Cloud Build ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BuildBody<'a> {
    pub source: SourceBody<'a>,
    pub steps: Vec<StepBody<'a>>,
    pub images: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SourceBody<'a> {
    pub storage_source: StorageSourceBody<'a>,
}

#[derive(Debug, Serialize)]
pub(crate) struct StorageSourceBody<'a> {
    pub bucket: &'a str,
    pub object: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct StepBody<'a> {
    pub name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entrypoint: Option<&'a str>,
    pub args: &'a [String],
    pub dir: &'a str,
}

impl<'a> From<&'a BuildSpec> for BuildBody<'a> {
    fn from(spec: &'a BuildSpec) -> Self {
        BuildBody {
            source: SourceBody {
                storage_source: StorageSourceBody {
                    bucket: &spec.source.bucket,
                    object: &spec.source.object,
                },
            },
            steps: spec
                .steps
                .iter()
                .map(|step| StepBody {
                    name: &step.name,
                    entrypoint: step.entrypoint.as_deref(),
                    args: &step.args,
                    dir: &step.dir,
                })
                .collect(),
            images: spec.images.iter().map(ToString::to_string).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BuildJson {
    pub id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub results: Option<BuildResults>,
    #[serde(default)]
    pub log_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct BuildResults {
    #[serde(default)]
    pub images: Vec<BuiltImage>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BuiltImage {
    pub name: String,
}

impl From<BuildJson> for BuildRecord {
    fn from(json: BuildJson) -> Self {
        BuildRecord {
            id: BuildId::new(json.id),
            status: BuildStatus::from_api(&json.status),
            images: json
                .results
                .unwrap_or_default()
                .images
                .into_iter()
                .map(|image| image.name)
                .collect(),
            log_url: json.log_url,
        }
    }
}

// --- Service Usage ---

#[derive(Debug, Deserialize)]
pub(crate) struct ApiServiceJson {
    #[serde(default)]
    pub state: String,
}

impl ApiServiceJson {
    pub fn state(&self) -> ApiState {
        match self.state.as_str() {
            "ENABLED" => ApiState::Enabled,
            "DISABLED" => ApiState::Disabled,
            _ => ApiState::Unspecified,
        }
    }
}

// --- Cloud Logging ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ListEntriesBody<'a> {
    pub resource_names: &'a [String],
    pub filter: &'a str,
    pub order_by: &'a str,
    pub page_size: u32,
}

impl<'a> From<&'a LogQuery> for ListEntriesBody<'a> {
    fn from(query: &'a LogQuery) -> Self {
        ListEntriesBody {
            resource_names: &query.resource_names,
            filter: &query.filter,
            order_by: &query.order_by,
            page_size: query.page_size,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ListEntriesJson {
    #[serde(default)]
    pub entries: Vec<LogEntryJson>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LogEntryJson {
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub text_payload: Option<String>,
    #[serde(default)]
    pub json_payload: Option<Value>,
}

impl From<LogEntryJson> for LogEntry {
    fn from(json: LogEntryJson) -> Self {
        let payload = match (json.text_payload, json.json_payload) {
            (Some(text), _) => text,
            (None, Some(Value::Object(fields))) => match fields.get("message") {
                Some(Value::String(message)) => message.clone(),
                _ => Value::Object(fields).to_string(),
            },
            (None, Some(other)) => other.to_string(),
            (None, None) => String::new(),
        };
        LogEntry {
            timestamp: json.timestamp,
            payload,
        }
    }
}
