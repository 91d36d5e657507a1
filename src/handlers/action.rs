//! Scene trigger handler

use super::requests::{self, SceneRef};
use crate::error::SceneError;
use crate::scene::lookup::SceneCollection;
use crate::scene::{DeviceDirectory, ModeExecutor};
use scene_shared::codes;
use serde_json::Value;
use tracing::info;

/// Handle `action`: resolve the scene and run it through the owner
///
/// Fails as a whole only when the device, the scene or the owner route can't
/// be resolved; in that case nothing is forwarded.
pub async fn handle_action(
    directory: &DeviceDirectory,
    executor: &ModeExecutor,
    parameters: Value,
) -> Result<Value, SceneError> {
    let request: SceneRef = requests::parse(parameters)?;
    let device = directory.fetch_device(&request.device_id).await?;
    let scene = SceneCollection::from_device(&device).find(&request.scene_id)?;

    let owner = device
        .owner
        .as_deref()
        .filter(|owner| !owner.is_empty())
        .ok_or_else(|| SceneError::DeviceLookup {
            ret_code: codes::DEVICE_RECORD_INVALID,
            description: format!("device {} has no owner to route commands through", device.uuid),
        })?;

    let outcome = executor.execute(&scene, owner).await;

    if scene.notify {
        info!(
            scene_id = %scene.scene_id,
            status = %outcome.overall_status,
            "scene notification"
        );
    }

    Ok(serde_json::to_value(&outcome)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::testing::{device_json, scene_json, FakeTransport, DEVICE_ID, OWNER};
    use crate::scene::CommandForwarder;
    use scene_shared::{ExecutionMode, OverallStatus, SceneExecutionOutcome};
    use serde_json::json;
    use std::sync::Arc;

    fn engine(transport: Arc<FakeTransport>) -> (DeviceDirectory, ModeExecutor) {
        let directory = DeviceDirectory::new(transport.clone(), vec!["device-manager".into()]);
        let executor = ModeExecutor::new(CommandForwarder::new(transport), 4);
        (directory, executor)
    }

    #[tokio::test]
    async fn test_parallel_scene_with_one_failing_command() {
        let transport = Arc::new(
            FakeTransport::new()
                .with_device(device_json(vec![scene_json(
                    "s-1",
                    ExecutionMode::Parallel,
                    &["c-1", "c-2", "c-3"],
                )]))
                .failing("c-2", 500, "device offline"),
        );
        let (directory, executor) = engine(transport.clone());

        let data = handle_action(&directory, &executor, json!({"deviceId": DEVICE_ID, "sceneId": "s-1"}))
            .await
            .expect("action succeeds even with a failed command");
        let outcome: SceneExecutionOutcome = serde_json::from_value(data).expect("outcome");

        assert_eq!(outcome.overall_status, OverallStatus::PartialFailure);
        let codes: Vec<_> = outcome.per_command_results.iter().map(|r| r.ret_code).collect();
        assert_eq!(codes, vec![200, 500, 200]);
        assert!(transport.forwards().iter().all(|call| call.route == OWNER));
    }

    #[tokio::test]
    async fn test_waterfall_scene_stops_at_step_two() {
        let transport = Arc::new(
            FakeTransport::new()
                .with_device(device_json(vec![scene_json(
                    "s-1",
                    ExecutionMode::Waterfall,
                    &["c-1", "c-2", "c-3"],
                )]))
                .failing("c-2", 500, "device offline"),
        );
        let (directory, executor) = engine(transport.clone());

        let data = handle_action(&directory, &executor, json!({"deviceId": DEVICE_ID, "sceneId": "s-1"}))
            .await
            .expect("action");

        assert_eq!(data["overallStatus"], "STOPPED_AT_STEP_2");
        assert_eq!(data["perCommandResults"].as_array().map(Vec::len), Some(2));
        assert!(!transport.forwarded_uuids().contains(&"c-3".to_string()));
    }

    #[tokio::test]
    async fn test_action_runs_next_to_an_unreadable_scene() {
        let transport = Arc::new(FakeTransport::new().with_device(device_json(vec![
            json!({"sceneId": "s-0", "name": "Broken", "mode": "SOMETIMES"}),
            scene_json("s-1", ExecutionMode::Series, &["c-1"]),
        ])));
        let (directory, executor) = engine(transport.clone());

        let data = handle_action(&directory, &executor, json!({"deviceId": DEVICE_ID, "sceneId": "s-1"}))
            .await
            .expect("action");

        assert_eq!(data["overallStatus"], "ALL_DONE");
        assert_eq!(transport.forwarded_uuids(), vec!["c-1"]);
    }

    #[tokio::test]
    async fn test_unknown_scene_forwards_nothing() {
        let transport = Arc::new(FakeTransport::new().with_device(device_json(vec![scene_json(
            "s-1",
            ExecutionMode::Parallel,
            &["c-1"],
        )])));
        let (directory, executor) = engine(transport.clone());

        let err = handle_action(&directory, &executor, json!({"deviceId": DEVICE_ID, "sceneId": "s-2"}))
            .await
            .expect_err("scene missing");

        assert_eq!(err.ret_code(), codes::SCENE_NOT_FOUND);
        assert!(transport.forwards().is_empty());
    }

    #[tokio::test]
    async fn test_wildcard_is_not_a_trigger_target() {
        let transport = Arc::new(FakeTransport::new().with_device(device_json(vec![scene_json(
            "s-1",
            ExecutionMode::Parallel,
            &["c-1"],
        )])));
        let (directory, executor) = engine(transport.clone());

        let err = handle_action(&directory, &executor, json!({"deviceId": DEVICE_ID, "sceneId": "*"}))
            .await
            .expect_err("wildcard");

        assert_eq!(err.ret_code(), codes::SCENE_NOT_FOUND);
        assert!(transport.forwards().is_empty());
    }

    #[tokio::test]
    async fn test_device_lookup_failure_forwards_nothing() {
        let transport = Arc::new(FakeTransport::new().with_device_error(404, "device not found"));
        let (directory, executor) = engine(transport.clone());

        let err = handle_action(&directory, &executor, json!({"deviceId": DEVICE_ID, "sceneId": "s-1"}))
            .await
            .expect_err("lookup fails");

        assert_eq!(err.ret_code(), 404);
        assert!(transport.forwards().is_empty());
    }

    #[tokio::test]
    async fn test_device_without_owner_forwards_nothing() {
        let transport = Arc::new(FakeTransport::new().with_device(json!({
            "uuid": DEVICE_ID,
            "extra": {"scenes": [scene_json("s-1", ExecutionMode::Series, &["c-1"])]}
        })));
        let (directory, executor) = engine(transport.clone());

        let err = handle_action(&directory, &executor, json!({"deviceId": DEVICE_ID, "sceneId": "s-1"}))
            .await
            .expect_err("no owner");

        assert_eq!(err.ret_code(), codes::DEVICE_RECORD_INVALID);
        assert!(transport.forwards().is_empty());
    }
}
