//! Platform credentials referenced by migration executions.

use edgeshift_common::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Source and target platform credentials.
///
/// Owned by the credential store; executions only hold the id.
#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default = "edgeshift_common::new_id")]
    pub id: String,
    pub name: String,
    pub edge_org: String,
    pub edge_env: String,
    pub edge_username: String,
    pub edge_password: String,
    pub apigee_x_project: String,
    pub apigee_x_env: String,
    /// Service account key JSON.
    pub apigee_x_service_account: String,
    #[serde(default)]
    pub created_at: Timestamp,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("edge_org", &self.edge_org)
            .field("edge_env", &self.edge_env)
            .field("edge_username", &self.edge_username)
            .field("edge_password", &"[REDACTED]")
            .field("apigee_x_project", &self.apigee_x_project)
            .field("apigee_x_env", &self.apigee_x_env)
            .field("apigee_x_service_account", &"[REDACTED]")
            .finish()
    }
}

/// Credentials without secret material, safe to list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialsSummary {
    pub id: String,
    pub name: String,
    pub edge_org: String,
    pub edge_env: String,
    pub apigee_x_project: String,
    pub apigee_x_env: String,
    pub created_at: Timestamp,
}

impl From<&Credentials> for CredentialsSummary {
    fn from(c: &Credentials) -> Self {
        Self {
            id: c.id.clone(),
            name: c.name.clone(),
            edge_org: c.edge_org.clone(),
            edge_env: c.edge_env.clone(),
            apigee_x_project: c.apigee_x_project.clone(),
            apigee_x_env: c.apigee_x_env.clone(),
            created_at: c.created_at,
        }
    }
}
