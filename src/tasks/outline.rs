use super::{load_state, record_elapsed, OUTLINE_TASK, STATE_KEY};
use crate::engine::InferenceEngine;
use async_trait::async_trait;
use graph_flow::{Context, GraphError, NextAction, Task, TaskResult};
use std::sync::Arc;
use tracing::{info, instrument, warn};

pub struct OutlineTask {
    engine: Arc<InferenceEngine>,
}

impl OutlineTask {
    pub fn new(engine: Arc<InferenceEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl Task for OutlineTask {
    fn id(&self) -> &str {
        OUTLINE_TASK
    }

    #[instrument(skip(self, context))]
    async fn run(&self, context: Context) -> Result<TaskResult, GraphError> {
        let start_time = std::time::Instant::now();
        info!("Starting outline generation task");

        let mut state = load_state(&context).await?;
        let response = self.engine.generate_outline(&state.context).await;
        if response.is_error() {
            warn!("Outline generation degraded: {}", response.content);
        }

        info!("Generated outline with {} characters", response.content.len());
        state.context.outline = Some(response.content.clone());
        context.set(STATE_KEY, state).await;
        record_elapsed(&context, OUTLINE_TASK, start_time).await;

        Ok(TaskResult::new(Some(response.content), NextAction::Continue))
    }
}
