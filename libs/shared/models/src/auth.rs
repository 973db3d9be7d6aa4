use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub exp: Option<u64>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub user_metadata: Option<serde_json::Value>,
    pub iat: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub role: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role.as_deref() == Some("admin")
    }
}

/// The acting staff member, passed explicitly into every mutating engine call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    pub actor_id: String,
    pub role: Option<String>,
    /// Correlates log lines of one request.
    pub request_id: Uuid,
}

impl RequestContext {
    pub fn new(actor_id: impl Into<String>, role: Option<String>) -> Self {
        Self {
            actor_id: actor_id.into(),
            role,
            request_id: Uuid::new_v4(),
        }
    }

    /// Context for work the system does on its own behalf (outbox relay, jobs).
    pub fn system() -> Self {
        Self::new("system", Some("system".to_string()))
    }
}

impl From<&User> for RequestContext {
    fn from(user: &User) -> Self {
        Self::new(user.id.clone(), user.role.clone())
    }
}
