//! Session pipeline as a graph-flow workflow.
//!
//! `outline → dialogue → evidence → experiment → drafting`. Each task pauses
//! the runner after it finishes (`NextAction::Continue`), so a front end can
//! review the state before resuming; `drafting` ends the session.

mod dialogue;
mod drafting;
mod evidence;
mod experiment;
mod outline;

pub use dialogue::DialogueTask;
pub use drafting::DraftingTask;
pub use evidence::EvidenceTask;
pub use experiment::ExperimentTask;
pub use outline::OutlineTask;

use crate::engine::InferenceEngine;
use crate::models::SessionState;
use graph_flow::{Context, Graph, GraphBuilder, GraphError};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

pub const STATE_KEY: &str = "session_state";
pub const TASK_TIMES_KEY: &str = "task_times";

pub const OUTLINE_TASK: &str = "outline";
pub const DIALOGUE_TASK: &str = "dialogue";
pub const EVIDENCE_TASK: &str = "evidence";
pub const EXPERIMENT_TASK: &str = "experiment";
pub const DRAFTING_TASK: &str = "drafting";

pub fn build_session_graph(engine: Arc<InferenceEngine>) -> Graph {
    GraphBuilder::new("sci_storm_session")
        .add_task(Arc::new(OutlineTask::new(engine.clone())))
        .add_task(Arc::new(DialogueTask::new(engine.clone())))
        .add_task(Arc::new(EvidenceTask::new(engine.clone())))
        .add_task(Arc::new(ExperimentTask::new(engine.clone())))
        .add_task(Arc::new(DraftingTask::new(engine)))
        .add_edge(OUTLINE_TASK, DIALOGUE_TASK)
        .add_edge(DIALOGUE_TASK, EVIDENCE_TASK)
        .add_edge(EVIDENCE_TASK, EXPERIMENT_TASK)
        .add_edge(EXPERIMENT_TASK, DRAFTING_TASK)
        .build()
}

async fn load_state(context: &Context) -> Result<SessionState, GraphError> {
    context
        .get(STATE_KEY)
        .await
        .ok_or_else(|| GraphError::ContextError("Session state not found".to_string()))
}

async fn record_elapsed(context: &Context, task_id: &str, started: Instant) {
    let elapsed = started.elapsed().as_millis() as u64;
    let mut task_times: HashMap<String, u64> = context.get(TASK_TIMES_KEY).await.unwrap_or_default();
    task_times.insert(task_id.to_string(), elapsed);
    context.set(TASK_TIMES_KEY, task_times).await;
}
