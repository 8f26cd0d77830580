use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{delete, post},
};
use axum_valid::Valid;

use crate::{
    dto::player::{ActionRequest, PlayerActionResponse, PlayerDeletedResponse, PlayerQuery},
    error::AppError,
    services::player_service,
    state::SharedState,
};

/// Player control endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/players/{id}/actions", post(send_action))
        .route("/players/{id}", delete(delete_player))
}

/// Send a playback or navigation command to the player `id`.
pub async fn send_action(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Valid(Json(payload)): Valid<Json<ActionRequest>>,
) -> Result<Json<PlayerActionResponse>, AppError> {
    Ok(Json(player_service::action(&state, &id, payload).await?))
}

/// Forget the player `id` and erase its states.
pub async fn delete_player(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Query(query): Query<PlayerQuery>,
) -> Result<Json<PlayerDeletedResponse>, AppError> {
    Ok(Json(
        player_service::delete(&state, &id, query.controller).await?,
    ))
}

#[cfg(test)]
mod tests {
    use axum::{http::StatusCode, response::IntoResponse};

    use super::*;
    use crate::{player::actions::ActionMode, state::test_support::state};

    #[tokio::test]
    async fn unknown_player_maps_to_not_found() {
        let (state, _) = state();
        let request = ActionRequest {
            controller: None,
            mode: ActionMode::Navigation,
            action: "select".into(),
            value: None,
            control_path: None,
        };
        let response = send_action(
            State(state),
            Path("ghost".into()),
            Valid(Json(request)),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
