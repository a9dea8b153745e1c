pub mod store;

pub use store::SessionStore;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Flags value that marks an administrator
pub const ADMIN_FLAGS: i32 = -4;

/// Fields a mapping may set on a Session. `sid` is deliberately absent:
/// only the SessionStore assigns tokens.
pub const UPDATABLE_FIELDS: &[&str] = &["id", "login", "name", "email", "phone", "description", "flags"];

#[derive(Debug, Error, PartialEq)]
pub enum SessionError {
    #[error("Session field '{field}' must be {expected}")]
    InvalidField { field: String, expected: &'static str },
}

/// Authenticated identity plus its opaque token.
///
/// A Session without a token is the "not authenticated" value; check
/// [`Session::is_valid`] before trusting any identity field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: Option<i64>,
    pub login: Option<String>,
    pub name: Option<String>,
    pub sid: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub description: Option<String>,
    pub flags: i32,
}

impl Session {
    /// The empty, unauthenticated session
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build an identity snapshot from a mapping such as a user row.
    /// Keys outside [`UPDATABLE_FIELDS`] are ignored.
    pub fn from_map(data: &Map<String, Value>) -> Result<Self, SessionError> {
        let mut session = Self::default();
        session.load_map(data)?;
        Ok(session)
    }

    /// Apply allow-listed fields from a mapping. Unknown keys are ignored; a
    /// known key with a value of the wrong type is an error and leaves the
    /// session untouched.
    pub fn load_map(&mut self, data: &Map<String, Value>) -> Result<(), SessionError> {
        let mut updated = self.clone();
        for field in UPDATABLE_FIELDS {
            let Some(value) = data.get(*field) else { continue };
            match *field {
                "id" => updated.id = optional_int(field, value)?,
                "flags" => {
                    updated.flags = match optional_int(field, value)? {
                        Some(flags) => i32::try_from(flags).map_err(|_| invalid(field, "a 32-bit integer"))?,
                        None => 0,
                    }
                }
                "login" => updated.login = optional_string(field, value)?,
                "name" => updated.name = optional_string(field, value)?,
                "email" => updated.email = optional_string(field, value)?,
                "phone" => updated.phone = optional_string(field, value)?,
                "description" => updated.description = optional_string(field, value)?,
                _ => {}
            }
        }
        *self = updated;
        Ok(())
    }

    /// A session is valid iff it carries a non-empty token
    pub fn is_valid(&self) -> bool {
        self.sid.as_deref().is_some_and(|sid| !sid.is_empty())
    }

    pub fn is_admin(&self) -> bool {
        self.flags == ADMIN_FLAGS
    }

    pub fn token(&self) -> Option<&str> {
        self.sid.as_deref().filter(|sid| !sid.is_empty())
    }
}

impl std::fmt::Display for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Session id={:?} login={:?} admin={}",
            self.id,
            self.login,
            self.is_admin()
        )
    }
}

fn invalid(field: &str, expected: &'static str) -> SessionError {
    SessionError::InvalidField { field: field.to_string(), expected }
}

fn optional_int(field: &str, value: &Value) -> Result<Option<i64>, SessionError> {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => n.as_i64().map(Some).ok_or_else(|| invalid(field, "an integer")),
        _ => Err(invalid(field, "an integer")),
    }
}

fn optional_string(field: &str, value: &Value) -> Result<Option<String>, SessionError> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s.clone())),
        _ => Err(invalid(field, "a string")),
    }
}
