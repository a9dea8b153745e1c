use serde_json::Value;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::database::{Storage, StorageError};
use crate::entity::descriptor::{FieldKind, FieldRule, USER};
use crate::entity::result_builder::result_item;
use crate::entity::validation::validate;
use crate::entity::{ErrorItem, ModelError};
use crate::filter::Condition;
use crate::session::{Session, SessionStore};

const REGISTRATION_RULES: &[FieldRule] = &[
    FieldRule::required("login", FieldKind::Text { max_len: 100 }),
    FieldRule::required("password", FieldKind::Text { max_len: 100 }),
    FieldRule::required("email", FieldKind::Text { max_len: 50 }),
    FieldRule::required("phone", FieldKind::Text { max_len: 20 }),
];

const LOGIN_RULES: &[FieldRule] = &[
    FieldRule::required("login", FieldKind::Text { max_len: 100 }),
    FieldRule::required("password", FieldKind::Text { max_len: 100 }),
];

/// Pull `login` and `password` out of a login body, one error per bad field
pub fn credentials(data: &Value) -> Result<(String, String), ModelError> {
    let values = validate(data, LOGIN_RULES).map_err(ModelError::Validation)?;
    let text = |name: &str| values.get(name).and_then(Value::as_str).unwrap_or_default().to_string();
    Ok((text("login"), text("password")))
}

/// Registration, login and logout
#[derive(Clone)]
pub struct AuthModel {
    storage: Arc<dyn Storage>,
    sessions: SessionStore,
    min_password_length: usize,
}

impl AuthModel {
    pub fn new(storage: Arc<dyn Storage>, sessions: SessionStore, min_password_length: usize) -> Self {
        Self { storage, sessions, min_password_length }
    }

    /// Create a plain (non-admin) user. A taken login is a soft error.
    pub async fn registration(&self, data: &Value) -> Result<(Value, Vec<ErrorItem>), ModelError> {
        let mut values = validate(data, REGISTRATION_RULES).map_err(ModelError::Validation)?;

        let password = values.remove("password").and_then(|v| v.as_str().map(str::to_string)).unwrap_or_default();
        if password.chars().count() < self.min_password_length {
            let reason = format!("Shorter than minimum length {}.", self.min_password_length);
            return Err(ModelError::Validation(vec![ErrorItem::new("password", reason)]));
        }

        let login = values.get("login").cloned().unwrap_or(Value::Null);
        let taken = self
            .storage
            .select(USER.table, &["id"], &[Condition::eq("login", login.clone())])
            .await?;
        if !taken.is_empty() {
            info!("Registration refused, login {} is taken", login);
            return Ok((Value::Null, vec![ErrorItem::with_value("login", "Login already exists.", login)]));
        }

        values.insert("password_hash".to_string(), Value::String(hash_password(&password)));
        values.insert("flags".to_string(), Value::from(0));

        let row = match self.storage.insert(USER.table, values).await {
            Ok(row) => row,
            Err(StorageError::Conflict(_)) => {
                return Ok((Value::Null, vec![ErrorItem::with_value("login", "Login already exists.", login)]));
            }
            Err(e) => return Err(e.into()),
        };

        info!("Registered user {}", login);
        Ok((result_item(&row, USER.all_fields), vec![]))
    }

    /// Check credentials and open a session. `None` means the credentials
    /// were wrong; the caller cannot tell an unknown login from a bad password.
    pub async fn login(&self, login: &str, password: &str) -> Result<Option<Session>, StorageError> {
        let rows = self
            .storage
            .select(USER.table, &[], &[Condition::eq("login", login)])
            .await?;

        let Some(row) = rows.into_iter().next() else {
            warn!("Failed login for unknown user {}", login);
            return Ok(None);
        };

        let stored_hash = row.get("password_hash").and_then(Value::as_str).unwrap_or_default();
        if !verify_password(password, stored_hash) {
            warn!("Failed login for user {}", login);
            return Ok(None);
        }

        let identity = Session::from_map(&row).map_err(|e| StorageError::QueryError(e.to_string()))?;
        let session = self.sessions.create(identity).await;
        info!("{} logged in", session);
        Ok(Some(session))
    }

    /// Forget the session. Returns whether the token was known.
    pub async fn logout(&self, sid: &str) -> bool {
        let destroyed = self.sessions.destroy(sid).await;
        if destroyed {
            info!("Session closed");
        } else {
            warn!("Logout with unknown session token");
        }
        destroyed
    }
}

/// Salted SHA-256 digest stored as `salt$hex`
pub fn hash_password(password: &str) -> String {
    let salt = Uuid::new_v4().simple().to_string();
    format!("{}${}", salt, digest(&salt, password))
}

pub fn verify_password(password: &str, stored: &str) -> bool {
    match stored.split_once('$') {
        Some((salt, expected)) => digest(salt, password) == expected,
        None => false,
    }
}

fn digest(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}
