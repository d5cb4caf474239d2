use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::app::AppState;
use crate::audit::RequestContext;
use crate::authz::{Action, Principal};
use crate::errors::{AppError, AppResult};
use crate::extract::{ApiJson, ApiQuery};
use crate::lifecycle::{self, DeletedPage, DeletedQuery, RestoreTarget};

/// Both fields are optional here so a missing one is reported by name.
#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
pub struct RestoreRequest {
    #[schema(example = "job_order")]
    pub entity_type: Option<String>,
    #[schema(example = "00000000-0000-0000-0000-000000000000")]
    pub entity_id: Option<String>,
}

#[utoipa::path(
    post,
    path = "/records/restore",
    tag = "Records",
    request_body = RestoreRequest,
    responses(
        (status = 200, description = "Restored entity", body = Object),
        (status = 400, description = "Missing field, unknown entity type, or entity is not deleted"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Only owners can restore"),
        (status = 404, description = "Entity not found"),
        (status = 409, description = "Parent client is still deleted")
    )
)]
pub async fn restore_record(
    State(state): State<AppState>,
    principal: Principal,
    context: RequestContext,
    payload: Result<ApiJson<RestoreRequest>, AppError>,
) -> AppResult<Json<Value>> {
    state.roles.require(&principal, Action::RestoreRecords)?;

    // Body errors surface only once the caller may restore at all.
    let ApiJson(payload) = payload?;
    let target = RestoreTarget::parse(payload.entity_type.as_deref(), payload.entity_id.as_deref())?;
    let restored = lifecycle::restore(&state.pool, &state.roles, &principal, target, &context).await?;

    Ok(Json(restored))
}

#[utoipa::path(
    get,
    path = "/records/deleted",
    tag = "Records",
    params(DeletedQuery),
    responses(
        (status = 200, description = "Deletions, newest first", body = DeletedPage),
        (status = 403, description = "Requires ViewDeletedRecords")
    )
)]
pub async fn list_deleted_records(
    State(state): State<AppState>,
    principal: Principal,
    ApiQuery(query): ApiQuery<DeletedQuery>,
) -> AppResult<Json<DeletedPage>> {
    state.roles.require(&principal, Action::ViewDeletedRecords)?;
    Ok(Json(lifecycle::list_deleted(&state.pool, &query).await?))
}
