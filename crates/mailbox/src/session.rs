//! Session supplied by the authentication provider

use serde::{Deserialize, Serialize};

use crate::error::ActionError;

/// Signed-in user and the connection handle remote calls go through
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: String,
    #[serde(default)]
    pub connection_id: Option<String>,
}

impl Session {
    pub fn new(user_id: impl Into<String>, connection_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            connection_id: Some(connection_id.into()),
        }
    }

    /// A session without a mail connection; remote-bound calls are refused
    pub fn disconnected(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            connection_id: None,
        }
    }

    /// Precondition for every remote-bound entry point
    pub fn require_connection(&self) -> Result<&str, ActionError> {
        match self.connection_id.as_deref() {
            Some(id) if !id.is_empty() && !self.user_id.is_empty() => Ok(id),
            _ => Err(ActionError::Unauthenticated),
        }
    }
}
