//! Result aggregation into the outcome envelope

use scene_shared::{ExecutionMode, ExecutionResult, OverallStatus, Scene, SceneExecutionOutcome};

/// Overall status of a run from its per-command results
pub fn aggregate(mode: ExecutionMode, results: &[ExecutionResult]) -> OverallStatus {
    match results.iter().position(|result| !result.is_success()) {
        None => OverallStatus::AllDone,
        Some(index) if mode == ExecutionMode::Waterfall => OverallStatus::StoppedAtStep(index + 1),
        Some(_) => OverallStatus::PartialFailure,
    }
}

pub fn build_outcome(scene: &Scene, results: Vec<ExecutionResult>) -> SceneExecutionOutcome {
    SceneExecutionOutcome {
        scene_id: scene.scene_id.clone(),
        mode: scene.mode,
        overall_status: aggregate(scene.mode, &results),
        per_command_results: results,
    }
}
