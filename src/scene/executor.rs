//! Mode executor - dispatches a resolved scene's commands per its mode

use super::aggregate;
use super::forwarder::CommandForwarder;
use super::run_state::{RunPhase, RunTracker};
use futures::stream::{self, StreamExt};
use scene_shared::{CommandSpec, ExecutionMode, ExecutionResult, OverallStatus, Scene, SceneExecutionOutcome};
use serde_json::Value;
use tracing::{debug, info, warn};

/// Runs scenes against the owning controller's route
pub struct ModeExecutor {
    forwarder: CommandForwarder,
    max_parallel: usize,
}

impl ModeExecutor {
    /// `max_parallel` caps in-flight forwards in PARALLEL mode (at least 1)
    pub fn new(forwarder: CommandForwarder, max_parallel: usize) -> Self {
        Self {
            forwarder,
            max_parallel: max_parallel.max(1),
        }
    }

    /// Execute `scene` by forwarding its commands to `route`
    ///
    /// Per-command failures end up in the outcome; this never fails as a
    /// whole. The scene itself is only read.
    pub async fn execute(&self, scene: &Scene, route: &str) -> SceneExecutionOutcome {
        let mut run = RunTracker::new(&scene.scene_id);
        run.advance(RunPhase::Dispatching);

        info!(
            "Executing scene {} ({}): {} commands via {}",
            scene.scene_id,
            scene.mode,
            scene.commands.len(),
            route
        );

        let results = match scene.mode {
            ExecutionMode::Parallel => self.run_parallel(route, &scene.commands).await,
            ExecutionMode::Series => self.run_series(route, &scene.commands).await,
            ExecutionMode::Waterfall => self.run_waterfall(route, &scene.commands).await,
        };

        let outcome = aggregate::build_outcome(scene, results);

        match outcome.overall_status {
            OverallStatus::AllDone => run.advance(RunPhase::AllDone),
            _ => run.advance(RunPhase::PartialFailure),
        };

        info!(
            "Scene {} finished: {} ({}/{} commands sent)",
            scene.scene_id,
            outcome.overall_status,
            outcome.per_command_results.len(),
            scene.commands.len()
        );

        run.advance(RunPhase::Reported);
        debug!("Scene {} run ended in {:?}", scene.scene_id, run.phase());
        outcome
    }

    /// Fan out with at most `max_parallel` forwards in flight; results come
    /// back in command order
    async fn run_parallel(&self, route: &str, commands: &[CommandSpec]) -> Vec<ExecutionResult> {
        // Collected before streaming so the handler future stays `Send`
        let pending: Vec<_> = commands
            .iter()
            .map(|command| self.forwarder.forward(route, command))
            .collect();

        stream::iter(pending).buffered(self.max_parallel).collect().await
    }

    /// One at a time; a failure does not stop the sequence
    async fn run_series(&self, route: &str, commands: &[CommandSpec]) -> Vec<ExecutionResult> {
        let mut results = Vec::with_capacity(commands.len());
        for command in commands {
            results.push(self.forwarder.forward(route, command).await);
        }
        results
    }

    /// One at a time, feeding each reply's data into the next command; stops
    /// at the first failure
    async fn run_waterfall(&self, route: &str, commands: &[CommandSpec]) -> Vec<ExecutionResult> {
        let mut results = Vec::with_capacity(commands.len());
        let mut context = Value::Null;

        for (step, command) in commands.iter().enumerate() {
            let command = merge_step_context(command, &context);
            let result = self.forwarder.forward(route, &command).await;
            let failed = !result.is_success();

            context = result.data.clone();
            results.push(result);

            if failed {
                warn!(
                    "Waterfall stopped at step {} of {}",
                    step + 1,
                    commands.len()
                );
                break;
            }
        }

        results
    }
}

/// Copy of `command` with the previous step's reply data merged into its
/// parameters
///
/// Only object data merges into object parameters, and keys already present
/// in the parameters are kept. Anything else leaves the command unchanged.
pub fn merge_step_context(command: &CommandSpec, context: &Value) -> CommandSpec {
    let mut merged = command.clone();

    if let (Some(parameters), Value::Object(data)) = (merged.cmd.parameters.as_object_mut(), context) {
        for (key, value) in data {
            parameters
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
    }

    merged
}
