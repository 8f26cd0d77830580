use tracing::info;

use crate::{
    dto::player::{ActionRequest, PlayerActionResponse, PlayerDeletedResponse},
    error::ServiceError,
    player::{error::PlayerError, record::PlayerIdentity},
    state::SharedState,
};

/// Identify the player `device_id`, scoped to `controller` when given.
async fn resolve_identity(
    state: &SharedState,
    device_id: &str,
    controller: Option<String>,
) -> Result<PlayerIdentity, ServiceError> {
    match controller {
        Some(controller) => Ok(PlayerIdentity::new(controller, device_id, None)?),
        None => match state.players().find_device(device_id) {
            Some(player) => Ok(player.identity().await),
            None => Err(PlayerError::UnknownPlayer {
                device_id: device_id.to_owned(),
            }
            .into()),
        },
    }
}

/// Send an action to a player and confirm its control node.
pub async fn action(
    state: &SharedState,
    device_id: &str,
    request: ActionRequest,
) -> Result<PlayerActionResponse, ServiceError> {
    let identity = resolve_identity(state, device_id, request.controller).await?;
    state
        .action(
            &identity,
            request.mode,
            &request.action,
            request.value,
            request.control_path,
        )
        .await?;

    Ok(PlayerActionResponse {
        device_id: identity.device_id,
        message: format!("{} {} sent", request.mode, request.action),
    })
}

/// Forget a player and erase its subtree.
pub async fn delete(
    state: &SharedState,
    device_id: &str,
    controller: Option<String>,
) -> Result<PlayerDeletedResponse, ServiceError> {
    let identity = resolve_identity(state, device_id, controller).await?;
    let report = state
        .delete_player(&identity)
        .await
        .ok_or_else(|| ServiceError::NotFound(format!("player `{device_id}`")))?;
    info!(player = %identity, "player removed on request");

    Ok(PlayerDeletedResponse {
        device_id: identity.device_id,
        erased: report.collected,
        failed: report.failed,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{player::actions::ActionMode, state::test_support::state};

    #[tokio::test]
    async fn unknown_devices_are_not_found() {
        let (state, _) = state();
        let request = ActionRequest {
            controller: None,
            mode: ActionMode::Playback,
            action: "play".into(),
            value: None,
            control_path: None,
        };
        let err = action(&state, "ghost", request).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Player(PlayerError::UnknownPlayer { .. })
        ));
        assert!(matches!(
            delete(&state, "ghost", Some("server".into())).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn delete_resolves_the_controller() {
        let (state, _) = state();
        state
            .set_client_data(json!({
                "MediaContainer": {
                    "machineIdentifier": "srv",
                    "Server": {"name": "TV", "machineIdentifier": "abc"}
                }
            }))
            .await
            .unwrap();

        let deleted = delete(&state, "abc", None).await.unwrap();
        assert_eq!(deleted.device_id, "abc");
        assert!(state.players().is_empty());
        state.shutdown();
    }
}
