use super::{load_state, record_elapsed, DRAFTING_TASK, STATE_KEY};
use crate::engine::InferenceEngine;
use crate::models::{DraftedSection, SessionState};
use crate::outline::section_titles;
use crate::report::tool_usage;
use async_trait::async_trait;
use graph_flow::{Context, GraphError, NextAction, Task, TaskResult};
use std::sync::Arc;
use tracing::{info, instrument};

pub struct DraftingTask {
    engine: Arc<InferenceEngine>,
}

impl DraftingTask {
    pub fn new(engine: Arc<InferenceEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl Task for DraftingTask {
    fn id(&self) -> &str {
        DRAFTING_TASK
    }

    #[instrument(skip(self, context))]
    async fn run(&self, context: Context) -> Result<TaskResult, GraphError> {
        let start_time = std::time::Instant::now();
        info!("Starting section drafting task");

        let mut state = load_state(&context).await?;
        let titles = section_titles(state.context.outline.as_deref().unwrap_or_default());
        let notes = collect_notes(&state);

        let mut sections = Vec::with_capacity(titles.len());
        for title in titles {
            let response = self
                .engine
                .synthesize_section(&state.context, &title, &notes)
                .await;
            info!("Drafted section '{}' ({} characters)", title, response.content.len());
            sections.push(DraftedSection {
                title,
                content: response.content,
            });
        }

        state.sections = sections;
        state.tool_usage = tool_usage(&state);
        let drafted = state.sections.len();
        context.set(STATE_KEY, state).await;
        record_elapsed(&context, DRAFTING_TASK, start_time).await;

        Ok(TaskResult::new(
            Some(format!("Drafted {} sections", drafted)),
            NextAction::End,
        ))
    }
}

/// Evidence values, then the experiment report, then the dialogue.
fn collect_notes(state: &SessionState) -> Vec<String> {
    state
        .evidence
        .values()
        .cloned()
        .chain(state.experiment_report.clone())
        .chain(state.dialogue.iter().cloned())
        .collect()
}
