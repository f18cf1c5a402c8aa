use super::{load_state, record_elapsed, EVIDENCE_TASK, STATE_KEY};
use crate::engine::InferenceEngine;
use async_trait::async_trait;
use graph_flow::{Context, GraphError, NextAction, Task, TaskResult};
use std::sync::Arc;
use tracing::{info, instrument};

pub struct EvidenceTask {
    engine: Arc<InferenceEngine>,
}

impl EvidenceTask {
    pub fn new(engine: Arc<InferenceEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl Task for EvidenceTask {
    fn id(&self) -> &str {
        EVIDENCE_TASK
    }

    #[instrument(skip(self, context))]
    async fn run(&self, context: Context) -> Result<TaskResult, GraphError> {
        let start_time = std::time::Instant::now();
        info!("Starting evidence gathering task");

        let mut state = load_state(&context).await?;
        let (evidence, search) = self.engine.run_expert_round(&state.context.goal).await;

        info!(
            "Gathered {} evidence entries, {} web sources",
            evidence.len(),
            search.sources.len()
        );
        let sources: Vec<String> = evidence.keys().cloned().collect();
        state.evidence = evidence;
        state.search = Some(search);
        context.set(STATE_KEY, state).await;
        record_elapsed(&context, EVIDENCE_TASK, start_time).await;

        Ok(TaskResult::new(
            Some(format!("Evidence from: {}", sources.join(", "))),
            NextAction::Continue,
        ))
    }
}
