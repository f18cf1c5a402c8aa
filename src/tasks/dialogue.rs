use super::{load_state, record_elapsed, DIALOGUE_TASK, STATE_KEY};
use crate::engine::InferenceEngine;
use async_trait::async_trait;
use graph_flow::{Context, GraphError, NextAction, Task, TaskResult};
use std::sync::Arc;
use tracing::{info, instrument};

pub struct DialogueTask {
    engine: Arc<InferenceEngine>,
}

impl DialogueTask {
    pub fn new(engine: Arc<InferenceEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl Task for DialogueTask {
    fn id(&self) -> &str {
        DIALOGUE_TASK
    }

    #[instrument(skip(self, context))]
    async fn run(&self, context: Context) -> Result<TaskResult, GraphError> {
        let start_time = std::time::Instant::now();
        info!("Starting expert dialogue task");

        let mut state = load_state(&context).await?;
        state.dialogue = self
            .engine
            .collaborative_dialogue(
                &state.context.goal,
                state.human_feedback.as_deref(),
                state.dialogue_turns,
            )
            .await;

        info!("Captured {} dialogue turns", state.dialogue.len());
        let summary = state.dialogue.join("\n");
        context.set(STATE_KEY, state).await;
        record_elapsed(&context, DIALOGUE_TASK, start_time).await;

        Ok(TaskResult::new(Some(summary), NextAction::Continue))
    }
}
