use super::{load_state, record_elapsed, EXPERIMENT_TASK, STATE_KEY};
use crate::engine::InferenceEngine;
use async_trait::async_trait;
use graph_flow::{Context, GraphError, NextAction, Task, TaskResult};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Runs the requested experiment, if any. Failures are kept in the state.
pub struct ExperimentTask {
    engine: Arc<InferenceEngine>,
}

impl ExperimentTask {
    pub fn new(engine: Arc<InferenceEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl Task for ExperimentTask {
    fn id(&self) -> &str {
        EXPERIMENT_TASK
    }

    #[instrument(skip(self, context))]
    async fn run(&self, context: Context) -> Result<TaskResult, GraphError> {
        let start_time = std::time::Instant::now();
        let mut state = load_state(&context).await?;

        let message = match state.experiment.clone() {
            None => {
                info!("No experiment requested, skipping");
                "No experiment requested".to_string()
            }
            Some(request) => {
                info!("Submitting experiment: {}", request.hypothesis);
                match self
                    .engine
                    .execute_experiment(&request.hypothesis, &request.code)
                    .await
                {
                    Ok(report) => {
                        state.experiment_report = Some(report.clone());
                        report
                    }
                    Err(err) => {
                        warn!("Experiment failed: {}", err);
                        state.experiment_error = Some(err.to_string());
                        format!("Experiment failed: {}", err)
                    }
                }
            }
        };

        context.set(STATE_KEY, state).await;
        record_elapsed(&context, EXPERIMENT_TASK, start_time).await;

        Ok(TaskResult::new(Some(message), NextAction::Continue))
    }
}
