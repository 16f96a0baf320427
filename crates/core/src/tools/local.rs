//! Local Mock Tools
//!
//! Tools with a canned, in-process implementation. They are exposed through an
//! MCP server running on an in-memory duplex pipe so that the conversation side
//! reaches them through the same client interface it would use for any MCP server.

use rmcp::{
    ServerHandler, ServiceExt,
    handler::server::{router::tool::ToolRouter, tool::Parameters},
    model::{ServerCapabilities, ServerInfo},
    service::{RoleClient, RunningService},
    tool, tool_handler, tool_router,
};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

/// Client handle to a running MCP server.
pub type McpClient = RunningService<RoleClient, ()>;

/// Arguments for `search_ehr_clinical_notes`.
#[derive(Deserialize, JsonSchema, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct SearchClinicalNotesArgs {
    /// Date range to search, e.g. "2024-06-01..2024-07-01".
    #[serde(default)]
    pub date_range: Option<String>,
    /// Free-text terms to match against note bodies.
    #[serde(default)]
    pub search_terms: Option<String>,
}

/// Arguments for `lookup_medical_policy`.
#[derive(Deserialize, JsonSchema, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct LookupMedicalPolicyArgs {
    #[serde(default)]
    pub policy_type: Option<String>,
    #[serde(default)]
    pub body_part: Option<String>,
    #[serde(default)]
    pub diagnosis: Option<String>,
}

/// MCP server exposing the locally implemented tools.
pub struct LocalToolServer {
    tool_router: ToolRouter<Self>,
}

impl Default for LocalToolServer {
    fn default() -> Self {
        Self::new()
    }
}

#[tool_handler]
impl ServerHandler for LocalToolServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

#[tool_router]
impl LocalToolServer {
    pub fn new() -> Self {
        Self {
            tool_router: Self::tool_router(),
        }
    }

    /// Returns mock clinical notes from the patient's record.
    #[tool(description = "Searches the EHR for a patient's clinical notes and visit summaries.")]
    pub async fn search_ehr_clinical_notes(
        &self,
        args: Parameters<SearchClinicalNotesArgs>,
    ) -> Result<String, String> {
        info!(args = ?args.0, "Executing tool 'search_ehr_clinical_notes'");
        let result = json!({
            "status": "success",
            "notes": [
                {"date": "2024-06-10", "note": "PCP exam positive Lachman; MRI ordered if instability persists after PT."},
                {"date": "2024-06-27", "note": "Continued instability with stairs and pivoting; PT notes document limited improvement."}
            ]
        });
        Ok(result.to_string())
    }

    /// Returns mock policy criteria.
    #[tool(description = "Retrieves specific medical policy criteria for a condition or procedure.")]
    pub async fn lookup_medical_policy(
        &self,
        args: Parameters<LookupMedicalPolicyArgs>,
    ) -> Result<String, String> {
        info!(args = ?args.0, "Executing tool 'lookup_medical_policy'");
        let result = json!({
            "policyId": "HF-MRI-KNEE-2024",
            "criteria": [
                "Conservative therapy >= 14 days required before MRI.",
                "Clinical documentation of persistent symptoms despite therapy.",
                "Physical exam findings suggestive of internal derangement."
            ]
        });
        Ok(result.to_string())
    }
}

/// Starts the local tool server on an in-memory pipe and connects a client to it.
///
/// The returned task owns the server; abort it to shut the server down.
pub async fn spawn_local_tools() -> anyhow::Result<(Arc<McpClient>, JoinHandle<()>)> {
    let (server_transport, client_transport) = tokio::io::duplex(4096);
    let server = LocalToolServer::new();
    let handle = tokio::spawn(async move {
        if let Ok(service) = server.serve(server_transport).await {
            let _ = service.waiting().await;
        }
    });
    let client = ().serve(client_transport).await?;
    Ok((Arc::new(client), handle))
}
