use serde_json::Value;

use crate::app::AppState;
use crate::entity::{EntityDescriptor, EntityQueryModel};
use crate::middleware::{ApiResponse, ApiResult};
use crate::session::Session;
use super::params::ListQuery;

/// Shared body of every entity GET
pub async fn list(
    descriptor: &'static EntityDescriptor,
    state: &AppState,
    query: ListQuery,
    session: &Session,
) -> ApiResult<Vec<Value>> {
    let params = query.parse()?;
    let model = EntityQueryModel::new(descriptor, state.storage.clone(), params.fields.as_deref())?;
    let (result, errors) = model
        .get_entities(params.ids.as_deref(), params.name.as_deref(), params.schedules.as_ref(), session)
        .await?;
    Ok(ApiResponse::new(result, errors))
}

/// Shared body of every entity POST
pub async fn create(
    descriptor: &'static EntityDescriptor,
    state: &AppState,
    query: ListQuery,
    session: &Session,
    payload: Value,
) -> ApiResult<Value> {
    let params = query.parse()?;
    let model = EntityQueryModel::new(descriptor, state.storage.clone(), params.fields.as_deref())?;
    let outcome = model.create_entity(&payload, session).await?;
    tracing::info!("{} created by user {:?}", descriptor.label, session.id);
    Ok(ApiResponse::from(outcome))
}

/// Shared body of every entity PUT
pub async fn update(
    descriptor: &'static EntityDescriptor,
    state: &AppState,
    query: ListQuery,
    session: &Session,
    payload: Value,
) -> ApiResult<Value> {
    let params = query.parse()?;
    let model = EntityQueryModel::new(descriptor, state.storage.clone(), params.fields.as_deref())?;
    let outcome = model.update_entity(&payload, session).await?;
    Ok(ApiResponse::from(outcome))
}
