use axum::extract::State;
use axum::Json;

use crate::app::AppState;
use crate::authz::{Principal, RoleGrant};
use crate::errors::AppResult;

/// The fixed role catalogue and the actions each role confers.
#[utoipa::path(
    get,
    path = "/roles",
    tag = "Roles",
    responses(
        (status = 200, description = "Roles and their actions", body = [RoleGrant]),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn list_roles(State(state): State<AppState>, _principal: Principal) -> AppResult<Json<Vec<RoleGrant>>> {
    Ok(Json(state.roles.grants()))
}
