// chef-core/src/provider/protocol.rs
//! Line-delimited JSON messages exchanged with provider processes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Argument appended to a provider's command line to select provider mode.
pub const PROVIDER_FLAG: &str = "--chef";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderRequest {
    pub id: String,
    #[serde(flatten)]
    pub command: ProviderCommand,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "lowercase")]
pub enum ProviderCommand {
    List,
    Update {
        name: String,
        version: String,
        #[serde(default)]
        force: bool,
    },
    Remove {
        name: String,
    },
    Versions {
        name: String,
        #[serde(default)]
        page: u32,
    },
    /// Fire-and-forget; providers never answer it.
    Cancel {
        #[serde(rename = "targetId")]
        target_id: String,
    },
}

impl ProviderCommand {
    pub fn label(&self) -> &'static str {
        match self {
            ProviderCommand::List => "list",
            ProviderCommand::Update { .. } => "update",
            ProviderCommand::Remove { .. } => "remove",
            ProviderCommand::Versions { .. } => "versions",
            ProviderCommand::Cancel { .. } => "cancel",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderResponse {
    pub id: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ProviderResponse {
    pub fn ok(id: &str, kind: Option<&str>, data: Option<Value>) -> Self {
        Self {
            id: id.to_string(),
            kind: kind.map(str::to_string),
            success: true,
            error: None,
            data,
        }
    }

    pub fn failure(id: &str, error: impl Into<String>) -> Self {
        Self {
            id: id.to_string(),
            kind: None,
            success: false,
            error: Some(error.into()),
            data: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn requests_use_the_flat_wire_shape() {
        let req = ProviderRequest {
            id: "7".into(),
            command: ProviderCommand::Update {
                name: "tool".into(),
                version: "1.2".into(),
                force: false,
            },
        };
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({"id": "7", "command": "update", "name": "tool", "version": "1.2", "force": false})
        );

        let cancel = ProviderRequest {
            id: "8".into(),
            command: ProviderCommand::Cancel {
                target_id: "7".into(),
            },
        };
        assert_eq!(
            serde_json::to_value(&cancel).unwrap(),
            json!({"id": "8", "command": "cancel", "targetId": "7"})
        );
    }

    #[test]
    fn list_request_parses_from_minimal_line() {
        let req: ProviderRequest = serde_json::from_str(r#"{"id":"1","command":"list"}"#).unwrap();
        assert_eq!(req.command, ProviderCommand::List);
    }

    #[test]
    fn responses_tolerate_missing_optional_fields() {
        let resp: ProviderResponse =
            serde_json::from_str(r#"{"id":"3","success":false,"error":"boom"}"#).unwrap();
        assert!(!resp.success);
        assert_eq!(resp.error.as_deref(), Some("boom"));
        assert!(resp.kind.is_none() && resp.data.is_none());
    }
}
