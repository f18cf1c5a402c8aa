//! Drives the session graph one step at a time.

use crate::engine::InferenceEngine;
use crate::models::SessionState;
use crate::tasks::{build_session_graph, OUTLINE_TASK, STATE_KEY, TASK_TIMES_KEY};
use graph_flow::{ExecutionStatus, FlowRunner, InMemorySessionStorage, Session, SessionStorage};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

/// Outcome of one [`SessionDriver::step`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// A task finished; `next_task` runs on the following step.
    Paused { next_task: String },
    Completed,
}

pub struct SessionDriver {
    runner: FlowRunner,
    storage: Arc<dyn SessionStorage>,
}

impl SessionDriver {
    pub fn new(engine: Arc<InferenceEngine>) -> Self {
        let storage: Arc<dyn SessionStorage> = Arc::new(InMemorySessionStorage::new());
        let graph = Arc::new(build_session_graph(engine));
        Self {
            runner: FlowRunner::new(graph, storage.clone()),
            storage,
        }
    }

    /// Store a new session positioned at the outline task.
    pub async fn start(&self, state: SessionState) -> anyhow::Result<String> {
        let session_id = Uuid::new_v4().to_string();
        let session = Session::new_from_task(session_id.clone(), OUTLINE_TASK);
        session.context.set(STATE_KEY, state).await;
        self.storage.save(session).await?;
        info!("Started session {}", session_id);
        Ok(session_id)
    }

    pub async fn step(&self, session_id: &str) -> anyhow::Result<Step> {
        let result = self.runner.run(session_id).await?;
        match result.status {
            ExecutionStatus::Completed => Ok(Step::Completed),
            ExecutionStatus::Paused { next_task_id, .. } => Ok(Step::Paused {
                next_task: next_task_id,
            }),
            ExecutionStatus::Error(e) => {
                error!("Session {} failed: {}", session_id, e);
                Err(anyhow::anyhow!("Session {} failed: {}", session_id, e))
            }
            _ => Err(anyhow::anyhow!(
                "Session {} stopped waiting for input",
                session_id
            )),
        }
    }

    pub async fn run_to_end(&self, session_id: &str) -> anyhow::Result<()> {
        while let Step::Paused { next_task } = self.step(session_id).await? {
            info!("Session {} continuing with {}", session_id, next_task);
        }
        Ok(())
    }

    async fn session(&self, session_id: &str) -> anyhow::Result<Session> {
        self.storage
            .get(session_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Session {} not found", session_id))
    }

    pub async fn state(&self, session_id: &str) -> anyhow::Result<SessionState> {
        self.session(session_id)
            .await?
            .context
            .get(STATE_KEY)
            .await
            .ok_or_else(|| anyhow::anyhow!("Session {} has no state", session_id))
    }

    /// Replace the state between steps, e.g. after a human checkpoint.
    pub async fn set_state(&self, session_id: &str, state: SessionState) -> anyhow::Result<()> {
        let session = self.session(session_id).await?;
        session.context.set(STATE_KEY, state).await;
        self.storage.save(session).await?;
        Ok(())
    }

    pub async fn task_times(&self, session_id: &str) -> anyhow::Result<HashMap<String, u64>> {
        Ok(self
            .session(session_id)
            .await?
            .context
            .get(TASK_TIMES_KEY)
            .await
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::tests::{engine_with, ScriptedBackend};
    use crate::models::GenerationContext;
    use crate::roster::ExpertRoster;
    use crate::tasks::{DIALOGUE_TASK, EVIDENCE_TASK};

    #[tokio::test]
    async fn test_state_edits_between_steps_reach_later_tasks() {
        let backend = Arc::new(ScriptedBackend::default());
        let mut roster = ExpertRoster::default();
        roster.register("Ada", "sys", "");
        let (engine, _dir) = engine_with(backend.clone(), roster);
        let driver = SessionDriver::new(Arc::new(engine));

        let id = driver
            .start(SessionState::new(GenerationContext::new("Goal", "Paper", "IMRaD"), 1))
            .await
            .unwrap();

        assert_eq!(
            driver.step(&id).await.unwrap(),
            Step::Paused {
                next_task: DIALOGUE_TASK.to_string()
            }
        );
        let mut state = driver.state(&id).await.unwrap();
        state.human_feedback = Some("stress uncertainty".to_string());
        driver.set_state(&id, state).await.unwrap();

        assert_eq!(
            driver.step(&id).await.unwrap(),
            Step::Paused {
                next_task: EVIDENCE_TASK.to_string()
            }
        );
        {
            let calls = backend.calls.lock().unwrap();
            assert!(calls[1][1].content.contains("Human feedback: stress uncertainty"));
        }

        driver.run_to_end(&id).await.unwrap();
        let state = driver.state(&id).await.unwrap();
        assert_eq!(state.sections.len(), 1);
        assert!(driver.task_times(&id).await.unwrap().contains_key("drafting"));
    }

    #[tokio::test]
    async fn test_unknown_session_is_an_error() {
        let (engine, _dir) = engine_with(Arc::new(ScriptedBackend::default()), ExpertRoster::default());
        let driver = SessionDriver::new(Arc::new(engine));
        assert!(driver.state("missing").await.is_err());
    }
}
