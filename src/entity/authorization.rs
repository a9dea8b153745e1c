use std::collections::BTreeSet;

use crate::database::{Storage, StorageError};
use crate::filter::Condition;
use crate::session::Session;
use super::descriptor::EntityDescriptor;
use super::result_builder::{not_found_errors, row_id, ErrorItem};

/// Decides which parent entities a caller may read children of.
///
/// Visibility is currently "every existing parent": there is no per-owner
/// restriction yet, so the caller only shows up in logs.
pub struct AuthorizationResolver<'a> {
    storage: &'a dyn Storage,
    parent: &'static EntityDescriptor,
}

impl<'a> AuthorizationResolver<'a> {
    pub fn new(storage: &'a dyn Storage, parent: &'static EntityDescriptor) -> Self {
        Self { storage, parent }
    }

    /// With no ids requested, every parent is allowed and nothing can fail.
    /// Otherwise the allowed set is requested ∩ existing, and each missing id
    /// becomes one error (ascending id order).
    pub async fn resolve(
        &self,
        requested: Option<&BTreeSet<i64>>,
        caller: &Session,
    ) -> Result<(BTreeSet<i64>, Vec<ErrorItem>), StorageError> {
        let requested = requested.filter(|ids| !ids.is_empty());

        let conditions = match requested {
            Some(ids) => vec![Condition::any_of("id", ids.iter().copied())],
            None => vec![],
        };
        let rows = self.storage.select(self.parent.table, &["id"], &conditions).await?;
        let existing: BTreeSet<i64> = rows.iter().filter_map(row_id).collect();

        let errors = match requested {
            Some(ids) => not_found_errors(ids, &existing, "id", &format!("{} not found", self.parent.label)),
            None => vec![],
        };

        tracing::debug!(
            caller = ?caller.id,
            parent = self.parent.label,
            allowed = existing.len(),
            denied = errors.len(),
            "resolved parent visibility"
        );
        Ok((existing, errors))
    }
}
