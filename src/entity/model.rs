use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::auth::hash_password;
use crate::database::{Row, Storage, StorageError};
use crate::filter::Condition;
use crate::session::Session;
use super::authorization::AuthorizationResolver;
use super::descriptor::EntityDescriptor;
use super::result_builder::{not_found_errors, result_item, row_id, ErrorItem};
use super::validation::{validate, MISSING, NULL_NOT_ALLOWED};

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Validation failed")]
    Validation(Vec<ErrorItem>),

    #[error("{0}")]
    Forbidden(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Read/write model for one entity, described by an [`EntityDescriptor`]
pub struct EntityQueryModel {
    descriptor: &'static EntityDescriptor,
    storage: Arc<dyn Storage>,
    select_fields: Vec<String>,
}

impl EntityQueryModel {
    /// `fields` restricts the projection; `None` or an empty list selects
    /// every readable field. Unknown field names are rejected up front.
    pub fn new(
        descriptor: &'static EntityDescriptor,
        storage: Arc<dyn Storage>,
        fields: Option<&[String]>,
    ) -> Result<Self, ModelError> {
        let select_fields = match fields {
            Some(fields) if !fields.is_empty() => {
                let unknown: Vec<ErrorItem> = fields
                    .iter()
                    .filter(|f| !descriptor.has_field(f))
                    .map(|f| ErrorItem::with_value("fields", "Unknown field.", f.as_str()))
                    .collect();
                if !unknown.is_empty() {
                    return Err(ModelError::Validation(unknown));
                }
                let mut seen = BTreeSet::new();
                fields.iter().filter(|f| seen.insert(f.as_str())).cloned().collect()
            }
            _ => descriptor.all_fields.iter().map(|f| f.to_string()).collect(),
        };

        Ok(Self { descriptor, storage, select_fields })
    }

    /// Authorized, filtered read.
    ///
    /// Every requested id ends up either in the result or in the errors.
    /// For grouped entities the result is a single map keyed by parent id;
    /// otherwise it is the flat list of projected records.
    pub async fn get_entities(
        &self,
        ids: Option<&[i64]>,
        filter_name: Option<&str>,
        parent_ids: Option<&BTreeSet<i64>>,
        caller: &Session,
    ) -> Result<(Vec<Value>, Vec<ErrorItem>), StorageError> {
        let mut errors = Vec::new();
        let mut conditions = Vec::new();

        if let Some(link) = &self.descriptor.parent {
            let resolver = AuthorizationResolver::new(self.storage.as_ref(), link.parent);
            let (allowed, auth_errors) = resolver.resolve(parent_ids, caller).await?;
            errors.extend(auth_errors);
            // An empty allowed set still runs the query; it simply matches nothing
            conditions.push(Condition::any_of(link.column, allowed));
        }

        let requested: Option<BTreeSet<i64>> = ids
            .filter(|ids| !ids.is_empty())
            .map(|ids| ids.iter().copied().collect());
        if let Some(requested) = &requested {
            conditions.push(Condition::any_of("id", requested.iter().copied()));
        }

        if let Some(name) = filter_name.filter(|n| !n.is_empty()) {
            conditions.push(Condition::contains(self.descriptor.name_column, name));
        }

        let columns = self.query_columns();
        let rows = self.storage.select(self.descriptor.table, &columns, &conditions).await?;
        debug!(entity = self.descriptor.label, rows = rows.len(), "fetched entities");

        if let Some(requested) = &requested {
            let found: BTreeSet<i64> = rows.iter().filter_map(row_id).collect();
            errors.extend(not_found_errors(requested, &found, "id", self.descriptor.not_found_reason));
        }

        let result = match &self.descriptor.parent {
            Some(link) => vec![self.group_by_parent(&rows, link.column)],
            None => rows.iter().map(|row| result_item(row, &self.select_fields)).collect(),
        };
        Ok((result, errors))
    }

    /// Validate and insert one record
    pub async fn create_entity(&self, data: &Value, caller: &Session) -> Result<(Value, Vec<ErrorItem>), ModelError> {
        self.check_write_access(caller)?;

        let mut values = validate(data, self.descriptor.create_rules).map_err(ModelError::Validation)?;
        self.store_password_digest(&mut values)?;
        if let Some(owner_column) = self.descriptor.owner_column {
            values.insert(owner_column.to_string(), caller.id.map(Value::from).unwrap_or(Value::Null));
        }
        self.check_parent_exists(&values).await?;
        self.check_unique(&values, None).await?;

        let row = self.storage.insert(self.descriptor.table, values).await.map_err(conflict_to_validation)?;
        debug!(entity = self.descriptor.label, id = ?row_id(&row), "created entity");
        Ok((result_item(&row, &self.select_fields), vec![]))
    }

    /// Validate and update one record by its `id`. An unknown id is a soft
    /// error, not a failure.
    pub async fn update_entity(&self, data: &Value, caller: &Session) -> Result<(Value, Vec<ErrorItem>), ModelError> {
        self.check_write_access(caller)?;

        let id = match data.get("id") {
            None => return Err(ModelError::Validation(vec![ErrorItem::new("id", MISSING)])),
            Some(value) => value
                .as_i64()
                .ok_or_else(|| ModelError::Validation(vec![ErrorItem::new("id", "Not a valid integer.")]))?,
        };

        let mut values = validate(data, self.descriptor.update_rules).map_err(ModelError::Validation)?;
        self.store_password_digest(&mut values)?;
        self.check_parent_exists(&values).await?;
        self.check_unique(&values, Some(id)).await?;

        let row = if values.is_empty() {
            // Nothing to change: report the current state
            let existing = self
                .storage
                .select(self.descriptor.table, &[], &[Condition::eq("id", id)])
                .await?;
            existing.into_iter().next()
        } else {
            self.storage
                .update(self.descriptor.table, id, values)
                .await
                .map_err(conflict_to_validation)?
        };

        match row {
            Some(row) => Ok((result_item(&row, &self.select_fields), vec![])),
            None => Ok((Value::Null, vec![ErrorItem::with_value("id", self.descriptor.not_found_reason, id)])),
        }
    }

    fn check_write_access(&self, caller: &Session) -> Result<(), ModelError> {
        if self.descriptor.admin_only_writes && !caller.is_admin() {
            warn!(entity = self.descriptor.label, caller = ?caller.id, "non-admin write rejected");
            return Err(ModelError::Forbidden(format!("{} changes require an administrator", self.descriptor.label)));
        }
        Ok(())
    }

    /// Swap a plain password for its digest before it reaches storage
    fn store_password_digest(&self, values: &mut Row) -> Result<(), ModelError> {
        let Some(field) = self.descriptor.password_field else { return Ok(()) };
        let Some(value) = values.remove(field) else { return Ok(()) };
        let Some(password) = value.as_str() else {
            return Err(ModelError::Validation(vec![ErrorItem::new(field, NULL_NOT_ALLOWED)]));
        };
        values.insert("password_hash".to_string(), Value::String(hash_password(password)));
        Ok(())
    }

    async fn check_parent_exists(&self, values: &Row) -> Result<(), ModelError> {
        let Some(link) = &self.descriptor.parent else { return Ok(()) };
        let Some(parent_id) = values.get(link.column).and_then(Value::as_i64) else { return Ok(()) };

        let found = self
            .storage
            .select(link.parent.table, &["id"], &[Condition::eq("id", parent_id)])
            .await?;
        if found.is_empty() {
            let reason = format!("{} not found", link.parent.label);
            return Err(ModelError::Validation(vec![ErrorItem::with_value(link.column, reason, parent_id)]));
        }
        Ok(())
    }

    async fn check_unique(&self, values: &Row, own_id: Option<i64>) -> Result<(), ModelError> {
        let mut errors = Vec::new();
        for field in self.descriptor.unique_fields {
            let Some(value) = values.get(*field).filter(|v| !v.is_null()) else { continue };
            let clashes = self
                .storage
                .select(self.descriptor.table, &["id"], &[Condition::eq(*field, value.clone())])
                .await?;
            if clashes.iter().filter_map(row_id).any(|id| Some(id) != own_id) {
                errors.push(ErrorItem::with_value(*field, "Already exists.", value.clone()));
            }
        }
        if errors.is_empty() { Ok(()) } else { Err(ModelError::Validation(errors)) }
    }

    /// Projection columns plus the bookkeeping ones (id, parent column)
    fn query_columns(&self) -> Vec<&str> {
        let mut columns: Vec<&str> = self.select_fields.iter().map(String::as_str).collect();
        let mut extra = vec!["id"];
        if let Some(link) = &self.descriptor.parent {
            extra.push(link.column);
        }
        for column in extra {
            if !columns.contains(&column) {
                columns.push(column);
            }
        }
        columns
    }

    fn group_by_parent(&self, rows: &[Row], column: &str) -> Value {
        let mut groups: BTreeMap<i64, Vec<Value>> = BTreeMap::new();
        for row in rows {
            let Some(parent_id) = row.get(column).and_then(Value::as_i64) else { continue };
            groups.entry(parent_id).or_default().push(result_item(row, &self.select_fields));
        }
        let grouped: Map<String, Value> = groups
            .into_iter()
            .map(|(parent_id, items)| (parent_id.to_string(), Value::Array(items)))
            .collect();
        Value::Object(grouped)
    }
}

/// A unique-constraint race that slipped past `check_unique` is still the
/// client's problem, not a server fault
fn conflict_to_validation(err: StorageError) -> ModelError {
    match err {
        StorageError::Conflict(detail) => {
            debug!("unique conflict on write: {}", detail);
            ModelError::Validation(vec![ErrorItem::new("body", "Record already exists.")])
        }
        other => ModelError::Storage(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::verify_password;
    use crate::database::MemoryStorage;
    use crate::entity::descriptor::{SCHEDULE, SCHEDULE_DETAIL, USER};
    use serde_json::json;

    fn caller() -> Session {
        Session { id: Some(7), sid: Some("token".into()), ..Session::default() }
    }

    fn admin() -> Session {
        Session { flags: crate::session::ADMIN_FLAGS, ..caller() }
    }

    fn model(descriptor: &'static EntityDescriptor, storage: &Arc<MemoryStorage>) -> EntityQueryModel {
        EntityQueryModel::new(descriptor, storage.clone(), None).unwrap()
    }

    async fn seeded() -> Arc<MemoryStorage> {
        let storage = Arc::new(MemoryStorage::new());
        let schedules = model(&SCHEDULE, &storage);
        schedules.create_entity(&json!({"name": "Team"}), &caller()).await.unwrap();
        schedules.create_entity(&json!({"name": "Gym"}), &caller()).await.unwrap();

        let details = model(&SCHEDULE_DETAIL, &storage);
        for (schedule_id, description) in [(1, "standup"), (1, "retro"), (2, "legs")] {
            let data = json!({
                "time": "2024-05-01T09:00:00Z",
                "description": description,
                "members": [7],
                "schedule_id": schedule_id,
            });
            details.create_entity(&data, &caller()).await.unwrap();
        }
        storage
    }

    #[tokio::test]
    async fn unknown_fields_are_rejected() {
        let storage = Arc::new(MemoryStorage::new());
        let fields = vec!["name".to_string(), "password_hash".to_string()];
        let err = EntityQueryModel::new(&USER, storage, Some(&fields)).err().unwrap();
        match err {
            ModelError::Validation(errors) => {
                assert_eq!(errors, vec![ErrorItem::with_value("fields", "Unknown field.", "password_hash")]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn schedules_flat_with_not_found_errors() {
        let storage = seeded().await;
        let fields = vec!["name".to_string()];
        let schedules = EntityQueryModel::new(&SCHEDULE, storage.clone(), Some(&fields)).unwrap();

        let (result, errors) = schedules.get_entities(Some(&[2, 9, 1]), None, None, &caller()).await.unwrap();
        assert_eq!(result, vec![json!({"name": "Team"}), json!({"name": "Gym"})]);
        assert_eq!(errors, vec![ErrorItem::with_value("id", "Schedule is not found", 9)]);
    }

    #[tokio::test]
    async fn schedule_owner_comes_from_session() {
        let storage = seeded().await;
        let (result, _) = model(&SCHEDULE, &storage).get_entities(Some(&[1]), None, None, &caller()).await.unwrap();
        assert_eq!(result[0]["owner_id"], json!(7));
    }

    #[tokio::test]
    async fn details_grouped_by_schedule() {
        let storage = seeded().await;
        let fields = vec!["id".to_string(), "description".to_string()];
        let details = EntityQueryModel::new(&SCHEDULE_DETAIL, storage.clone(), Some(&fields)).unwrap();

        let (result, errors) = details.get_entities(None, None, None, &caller()).await.unwrap();
        assert!(errors.is_empty());
        assert_eq!(
            result,
            vec![json!({
                "1": [{"id": 1, "description": "standup"}, {"id": 2, "description": "retro"}],
                "2": [{"id": 3, "description": "legs"}],
            })]
        );
    }

    #[tokio::test]
    async fn details_name_filter_uses_description() {
        let storage = seeded().await;
        let (result, _) = model(&SCHEDULE_DETAIL, &storage)
            .get_entities(None, Some("tro"), None, &caller())
            .await
            .unwrap();
        let groups = result[0].as_object().unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups["1"][0]["description"], json!("retro"));
    }

    #[tokio::test]
    async fn missing_schedule_and_detail_are_both_reported() {
        let storage = seeded().await;
        let details = model(&SCHEDULE_DETAIL, &storage);
        let schedules = BTreeSet::from([5]);

        let (result, errors) = details.get_entities(Some(&[10]), None, Some(&schedules), &caller()).await.unwrap();
        assert_eq!(result, vec![json!({})]);
        assert_eq!(
            errors,
            vec![
                ErrorItem::with_value("id", "Schedule not found", 5),
                ErrorItem::with_value("id", "Schedule or schedule-detail is not found", 10),
            ]
        );
    }

    #[tokio::test]
    async fn every_requested_id_is_accounted_for_once() {
        let storage = seeded().await;
        let details = model(&SCHEDULE_DETAIL, &storage);
        let requested = [3, 1, 8, 2, 1];
        let schedules = BTreeSet::from([1]);

        let (result, errors) = details.get_entities(Some(&requested), None, Some(&schedules), &caller()).await.unwrap();
        let mut returned: Vec<i64> = result[0]
            .as_object()
            .unwrap()
            .values()
            .flat_map(|items| items.as_array().unwrap().iter().map(|i| i["id"].as_i64().unwrap()))
            .collect();
        let mut missing: Vec<i64> = errors.iter().map(|e| e.value.as_ref().unwrap().as_i64().unwrap()).collect();

        returned.sort();
        missing.sort();
        assert_eq!(returned, vec![1, 2]);
        assert_eq!(missing, vec![3, 8]);
    }

    #[tokio::test]
    async fn create_detail_requires_existing_schedule() {
        let storage = seeded().await;
        let data = json!({"time": "2024-05-01T09:00:00Z", "schedule_id": 42});
        let err = model(&SCHEDULE_DETAIL, &storage).create_entity(&data, &caller()).await.unwrap_err();
        match err {
            ModelError::Validation(errors) => {
                assert_eq!(errors, vec![ErrorItem::with_value("schedule_id", "Schedule not found", 42)]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn update_changes_fields_and_reports_unknown_ids() {
        let storage = seeded().await;
        let schedules = model(&SCHEDULE, &storage);

        let (record, errors) = schedules.update_entity(&json!({"id": 2, "name": "Pool"}), &caller()).await.unwrap();
        assert!(errors.is_empty());
        assert_eq!(record["name"], json!("Pool"));

        let (record, errors) = schedules.update_entity(&json!({"id": 99, "name": "Pool"}), &caller()).await.unwrap();
        assert_eq!(record, Value::Null);
        assert_eq!(errors, vec![ErrorItem::with_value("id", "Schedule is not found", 99)]);
    }

    #[tokio::test]
    async fn update_requires_id() {
        let storage = seeded().await;
        let err = model(&SCHEDULE, &storage).update_entity(&json!({"name": "x"}), &caller()).await.unwrap_err();
        assert!(matches!(err, ModelError::Validation(ref errors) if errors[0].selector == "id"));
    }

    #[tokio::test]
    async fn user_writes_are_admin_only() {
        let storage = Arc::new(MemoryStorage::new());
        let users = model(&USER, &storage);

        let err = users.create_entity(&json!({"login": "ann"}), &caller()).await.unwrap_err();
        assert!(matches!(err, ModelError::Forbidden(_)));

        let (record, _) = users.create_entity(&json!({"login": "ann"}), &admin()).await.unwrap();
        assert_eq!(record["login"], json!("ann"));

        let err = users.create_entity(&json!({"login": "ann"}), &admin()).await.unwrap_err();
        match err {
            ModelError::Validation(errors) => assert_eq!(errors[0].selector, "login"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn user_passwords_are_stored_as_digests() {
        let storage = Arc::new(MemoryStorage::new());
        let users = model(&USER, &storage);

        let (record, _) = users.create_entity(&json!({"login": "ann", "password": "hunter2"}), &admin()).await.unwrap();
        assert!(record.get("password").is_none());
        assert!(record.get("password_hash").is_none());
        let id = record["id"].as_i64().unwrap();

        let stored = |rows: Vec<Row>| rows[0]["password_hash"].as_str().unwrap_or_default().to_string();
        let rows = storage.select("users", &[], &[Condition::eq("id", id)]).await.unwrap();
        assert!(verify_password("hunter2", &stored(rows)));

        users.update_entity(&json!({"id": id, "password": "changed"}), &admin()).await.unwrap();
        let rows = storage.select("users", &[], &[Condition::eq("id", id)]).await.unwrap();
        let digest = stored(rows);
        assert!(verify_password("changed", &digest));
        assert!(!verify_password("hunter2", &digest));

        let err = users.update_entity(&json!({"id": id, "password": null}), &admin()).await.unwrap_err();
        assert!(matches!(err, ModelError::Validation(ref errors) if errors[0].selector == "password"));
    }
}
