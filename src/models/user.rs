//! User profile models

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Profile from `profiles`
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
}

/// Fields collected by the registration step
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub email: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

impl NewUser {
    /// Minimal shape check before handing the fields to the auth provider
    pub fn validate(&self) -> Result<(), String> {
        let email = self.email.trim();
        if email.is_empty() {
            return Err("Email is required".to_string());
        }
        match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
            _ => Err(format!("'{}' is not a valid email address", email)),
        }
    }
}
