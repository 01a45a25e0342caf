//! Wire types exchanged with the worker.
//!
//! Execution mode reads one [`InvocationEnvelope`] from stdin and prints one
//! [`ChildReport`] line to stdout. Metadata mode prints one
//! [`MetadataReport`] line.

use std::path::Path;

use nimbus_core::{AuthLevel, FunctionMeta, UserId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Everything the worker needs to know about the call besides the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationContext {
    /// Host API the SDK calls back into.
    pub api_base_url: String,
    /// Short-lived internal token for those calls.
    pub auth_token: String,
    /// Caller, absent for anonymous and system calls.
    pub user_id: Option<UserId>,
    /// Whether the caller holds admin scope.
    pub is_admin: bool,
    /// Correlates worker logs with the call row.
    pub request_id: String,
    /// Registry name of the function.
    pub function_name: String,
    /// Whether the worker should forward user logs.
    pub logging_enabled: bool,
    /// `manual` or `schedule`.
    pub trigger: String,
    /// Dependencies are already resolved; skip the sync step.
    pub warm: bool,
}

/// Stdin document of execution mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocationEnvelope {
    /// Call context.
    pub context: InvocationContext,
    /// User payload.
    pub payload: Value,
}

impl InvocationEnvelope {
    /// Serialize to the single stdin line, newline terminated.
    pub fn to_line(&self) -> Result<Vec<u8>, serde_json::Error> {
        let mut bytes = serde_json::to_vec(self)?;
        bytes.push(b'\n');
        Ok(bytes)
    }
}

/// Stdout line of execution mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ChildReport {
    /// The handler returned.
    Succeeded {
        /// Handler return value.
        #[serde(default)]
        result: Value,
    },
    /// The handler threw.
    Failed {
        /// Error message.
        #[serde(default)]
        error: String,
        /// Error class name reported by the worker.
        #[serde(default)]
        error_type: Option<String>,
    },
}

impl ChildReport {
    /// Parse one stdout line.
    pub fn parse(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line.trim())
    }
}

/// Stdout line of metadata mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataReport {
    /// Name passed to `register`.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Required caller level.
    #[serde(default)]
    pub auth: AuthLevel,
    /// Free-form tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Opaque payload schema.
    #[serde(default)]
    pub input_schema: Option<Value>,
    /// Opaque result schema.
    #[serde(default)]
    pub output_schema: Option<Value>,
}

impl MetadataReport {
    /// Parse one stdout line.
    pub fn parse(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line.trim())
    }

    /// Registry entry for the file this report came from.
    pub fn into_meta(self, file_path: &Path) -> FunctionMeta {
        FunctionMeta::new(self.name, file_path)
            .with_description(self.description)
            .with_auth(self.auth)
            .with_tags(self.tags)
            .with_schemas(self.input_schema, self.output_schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn succeeded_report_parses() {
        let report = ChildReport::parse(r#"{"status":"succeeded","result":{"value":42}}"#).unwrap();
        assert_eq!(
            report,
            ChildReport::Succeeded {
                result: json!({"value": 42})
            }
        );
    }

    #[test]
    fn failed_report_keeps_error_type() {
        let report =
            ChildReport::parse(r#"{"status":"failed","error":"bad","error_type":"TypeError"}"#)
                .unwrap();
        assert_eq!(
            report,
            ChildReport::Failed {
                error: "bad".into(),
                error_type: Some("TypeError".into()),
            }
        );
    }

    #[test]
    fn unknown_status_is_rejected() {
        assert!(ChildReport::parse(r#"{"status":"maybe"}"#).is_err());
        assert!(ChildReport::parse("not json").is_err());
    }

    #[test]
    fn envelope_is_one_line() {
        let envelope = InvocationEnvelope {
            context: InvocationContext {
                api_base_url: "http://127.0.0.1:8090".into(),
                auth_token: "t".into(),
                user_id: None,
                is_admin: true,
                request_id: "r".into(),
                function_name: "double".into(),
                logging_enabled: true,
                trigger: "schedule".into(),
                warm: false,
            },
            payload: json!({"value": 21}),
        };
        let line = envelope.to_line().unwrap();
        assert_eq!(line.iter().filter(|b| **b == b'\n').count(), 1);
        assert_eq!(line.last(), Some(&b'\n'));

        let back: InvocationEnvelope = serde_json::from_slice(&line).unwrap();
        assert_eq!(back.context.trigger, "schedule");
    }

    #[test]
    fn metadata_defaults_apply() {
        let report = MetadataReport::parse(r#"{"name":"double"}"#).unwrap();
        let meta = report.into_meta(Path::new("/fns/double.ts"));
        assert_eq!(meta.name, "double");
        assert_eq!(meta.auth, AuthLevel::Authenticated);
        assert_eq!(meta.file_path, Path::new("/fns/double.ts"));
    }
}
