//! Orchestration over the backend, the expert roster, and the tool clients.
//!
//! Every operation issues its calls one after another. Language-model access
//! goes through [`ChatBackend::generate`], so a failing backend shows up as
//! error-marked text in the results instead of aborting the session.

use crate::backend::{prompt_pair, BackendResponse, ChatBackend, GenerationOptions};
use crate::config::AppConfig;
use crate::error::ExecutionError;
use crate::models::{Evidence, GenerationContext, SearchResult};
use crate::roster::ExpertRoster;
use crate::tools::search::format_sources;
use crate::tools::{interpret_result, notes, ExecutionClient, NoteStore, SearchClient};
use std::sync::Arc;
use tracing::{debug, info, instrument};

pub const WEB_SEARCH_KEY: &str = "web_search";
pub const LOCAL_NOTES_KEY: &str = "local_notes";
pub const NO_SEARCH_RESULTS: &str = "No web search results were available for this query.";
pub const NO_NOTE_HITS: &str = "No local notes matched this query.";
pub const DEFAULT_LANGUAGE_LABEL: &str = "the language of the goal";

const OUTLINE_SYSTEM_PROMPT: &str = "You are coordinating a collaborative outline session. \
Use the expert roster to propose a draft outline that a human will review.";

const SECTION_SYSTEM_PROMPT: &str = "You are a lead author merging expert findings. \
Ground the response in the provided evidence and cite code execution outputs when available.";

pub struct InferenceEngine {
    backend: Arc<dyn ChatBackend>,
    roster: ExpertRoster,
    search: SearchClient,
    notes: NoteStore,
    execution: ExecutionClient,
    options: GenerationOptions,
    note_hits: usize,
}

impl InferenceEngine {
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        roster: ExpertRoster,
        search: SearchClient,
        notes: NoteStore,
        execution: ExecutionClient,
    ) -> Self {
        Self {
            backend,
            roster,
            search,
            notes,
            execution,
            options: GenerationOptions::default(),
            note_hits: 5,
        }
    }

    /// Wire the tool clients from configuration and ingest local notes.
    pub fn from_config(
        config: &AppConfig,
        roster: ExpertRoster,
        backend: Arc<dyn ChatBackend>,
    ) -> anyhow::Result<Self> {
        let search = SearchClient::new(&config.search);
        let mut note_store = NoteStore::open(&config.notes.persist_directory).map_err(|e| {
            anyhow::anyhow!(
                "Failed to open note store at {}: {}",
                config.notes.persist_directory.display(),
                e
            )
        })?;
        note_store.ingest(notes::load_dir(&config.notes.source_directory));
        info!(
            notes = note_store.len(),
            experts = roster.len(),
            live_search = search.has_api_key(),
            "Engine ready"
        );

        let execution = ExecutionClient::new(config.execution.clone());
        Ok(Self::new(backend, roster, search, note_store, execution).with_note_hits(config.notes.top_k))
    }

    pub fn with_note_hits(mut self, k: usize) -> Self {
        self.note_hits = k;
        self
    }

    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    #[instrument(skip(self, ctx), fields(goal = %ctx.goal))]
    pub async fn generate_outline(&self, ctx: &GenerationContext) -> BackendResponse {
        let mut user_prompt = format!(
            "Goal: {}\nDocument Style: {}\nStructural Requirements: {}\n",
            ctx.goal, ctx.document_style, ctx.structural_requirements
        );
        if let Some(hint) = non_blank(ctx.outline_format_hint.as_deref()) {
            user_prompt.push_str(&format!("Outline Format: {}\n", hint));
        }
        user_prompt.push_str(&format!(
            "Available Experts:\n{}\n\
             Return a markdown outline with one heading per section and a short \
             rationale for each section.",
            self.roster.describe_team()
        ));

        self.backend
            .generate(&prompt_pair(OUTLINE_SYSTEM_PROMPT, user_prompt), &self.options)
            .await
    }

    #[instrument(skip(self, ctx, notes))]
    pub async fn synthesize_section<I, S>(
        &self,
        ctx: &GenerationContext,
        section_title: &str,
        notes: I,
    ) -> BackendResponse
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let evidence = notes
            .into_iter()
            .map(|note| note.as_ref().to_string())
            .collect::<Vec<_>>()
            .join("\n");
        let language = non_blank(ctx.output_language.as_deref()).unwrap_or(DEFAULT_LANGUAGE_LABEL);
        let outline = non_blank(ctx.outline.as_deref()).unwrap_or("N/A");

        let user_prompt = format!(
            "Section: {section_title}\nGoal: {goal}\nDocument Style: {style}\n\
             Output Language: {language}\nOutline:\n{outline}\n\
             Collected Evidence:\n{evidence}\n\
             Write a concise draft section in markdown. Use bullet points for \
             experimental results and keep terminology precise. Cite only URLs \
             that appear in the collected evidence, and write the whole section \
             in {language} without switching languages.",
            goal = ctx.goal,
            style = ctx.document_style,
        );

        self.backend
            .generate(&prompt_pair(SECTION_SYSTEM_PROMPT, user_prompt), &self.options)
            .await
    }

    /// Ask every expert, the web search, and the local notes about `query`.
    #[instrument(skip(self))]
    pub async fn run_expert_round(&self, query: &str) -> (Evidence, SearchResult) {
        let mut evidence = Evidence::new();
        for expert in self.roster.experts() {
            let user_prompt = format!("As {}, analyze: {}. Return key facts.", expert.name, query);
            let response = self
                .backend
                .generate(&prompt_pair(expert.system_prompt.as_str(), user_prompt), &self.options)
                .await;
            debug!("{} contributed {} characters", expert.name, response.content.len());
            evidence.insert(expert.name.clone(), response.content);
        }

        let search = self.search.search(query).await;
        let search_text = if search.sources.is_empty() {
            NO_SEARCH_RESULTS.to_string()
        } else {
            format_sources(&search.sources)
        };
        evidence.insert(WEB_SEARCH_KEY.to_string(), search_text);

        let hits = self.notes.query(query, self.note_hits);
        let notes_text = if hits.is_empty() {
            NO_NOTE_HITS.to_string()
        } else {
            hits.join("\n")
        };
        evidence.insert(LOCAL_NOTES_KEY.to_string(), notes_text);

        info!("Expert round gathered {} evidence entries", evidence.len());
        (evidence, search)
    }

    /// Round-table discussion: `turns` passes over the roster.
    ///
    /// Each speaker sees only the message immediately before theirs, never the
    /// whole transcript.
    #[instrument(skip(self, human_feedback))]
    pub async fn collaborative_dialogue(
        &self,
        topic: &str,
        human_feedback: Option<&str>,
        turns: usize,
    ) -> Vec<String> {
        let mut latest = match non_blank(human_feedback) {
            Some(feedback) => format!("Topic: {}\nHuman feedback: {}", topic, feedback),
            None => format!("Topic: {}\nHuman feedback: none provided.", topic),
        };

        let mut transcript = Vec::with_capacity(turns * self.roster.len());
        for pass in 1..=turns {
            for expert in self.roster.experts() {
                let user_prompt = format!(
                    "Most recent message:\n{}\n\nAs {}, add, refine, or correct the \
                     discussion in a few sentences.",
                    latest, expert.name
                );
                let response = self
                    .backend
                    .generate(&prompt_pair(expert.system_prompt.as_str(), user_prompt), &self.options)
                    .await;
                let entry = format!("{}: {}", expert.name, response.content);
                debug!(pass, expert = %expert.name, "Dialogue turn recorded");
                latest = entry.clone();
                transcript.push(entry);
            }
        }
        transcript
    }

    pub async fn execute_experiment(&self, hypothesis: &str, code: &str) -> Result<String, ExecutionError> {
        let report = self.execution.run_experiment(hypothesis, code).await?;
        Ok(interpret_result(&report.raw))
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::backend::ChatMessage;
    use crate::config::{ExecutionConfig, SearchConfig};
    use crate::error::BackendError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Replies `reply-{n}` to the n-th call and records every conversation.
    #[derive(Default)]
    pub(crate) struct ScriptedBackend {
        pub calls: Mutex<Vec<Vec<ChatMessage>>>,
    }

    #[async_trait]
    impl ChatBackend for ScriptedBackend {
        async fn try_generate(
            &self,
            messages: &[ChatMessage],
            _options: &GenerationOptions,
        ) -> Result<BackendResponse, BackendError> {
            let mut calls = self.calls.lock().unwrap();
            calls.push(messages.to_vec());
            Ok(BackendResponse {
                content: format!("reply-{}", calls.len()),
                raw: serde_json::Value::Null,
            })
        }
    }

    struct FailingBackend;

    #[async_trait]
    impl ChatBackend for FailingBackend {
        async fn try_generate(
            &self,
            _messages: &[ChatMessage],
            _options: &GenerationOptions,
        ) -> Result<BackendResponse, BackendError> {
            Err(BackendError::Status {
                status: 401,
                body: "invalid key".to_string(),
            })
        }
    }

    pub(crate) fn engine_with(backend: Arc<dyn ChatBackend>, roster: ExpertRoster) -> (InferenceEngine, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let notes = NoteStore::open(dir.path()).unwrap();
        let search = SearchClient::new(&SearchConfig::default());
        let execution = ExecutionClient::new(ExecutionConfig {
            server_url: "http://127.0.0.1:9".to_string(),
            max_retries: 1,
            retry_backoff: 0.0,
            handshake_timeout: 1,
            ..ExecutionConfig::default()
        });
        (InferenceEngine::new(backend, roster, search, notes, execution), dir)
    }

    fn roster_of(names: &[&str]) -> ExpertRoster {
        let mut roster = ExpertRoster::default();
        for name in names {
            roster.register(*name, format!("system prompt of {}", name), "");
        }
        roster
    }

    fn user_text(call: &[ChatMessage]) -> &str {
        &call[1].content
    }

    #[tokio::test]
    async fn test_dialogue_has_n_times_t_entries_in_order() {
        let backend = Arc::new(ScriptedBackend::default());
        let (engine, _dir) = engine_with(backend.clone(), roster_of(&["Ada", "Ben", "Cy"]));

        let transcript = engine.collaborative_dialogue("graphene", None, 2).await;

        assert_eq!(
            transcript,
            vec![
                "Ada: reply-1",
                "Ben: reply-2",
                "Cy: reply-3",
                "Ada: reply-4",
                "Ben: reply-5",
                "Cy: reply-6",
            ]
        );
        assert_eq!(backend.calls.lock().unwrap().len(), 6);
    }

    #[tokio::test]
    async fn test_dialogue_carries_only_the_previous_entry() {
        let backend = Arc::new(ScriptedBackend::default());
        let (engine, _dir) = engine_with(backend.clone(), roster_of(&["Ada", "Ben"]));

        let transcript = engine
            .collaborative_dialogue("graphene", Some("focus on defects"), 2)
            .await;
        let calls = backend.calls.lock().unwrap();

        let first = user_text(&calls[0]);
        assert!(first.contains("Topic: graphene"));
        assert!(first.contains("Human feedback: focus on defects"));

        for (i, call) in calls.iter().enumerate().skip(1) {
            let text = user_text(call);
            assert!(text.contains(&transcript[i - 1]), "call {} misses its predecessor", i);
            for earlier in &transcript[..i - 1] {
                assert!(!text.contains(earlier.as_str()), "call {} saw {}", i, earlier);
            }
            assert!(!text.contains("Topic: graphene"));
        }

        assert_eq!(calls[0][0].content, "system prompt of Ada");
        assert_eq!(calls[1][0].content, "system prompt of Ben");
        assert_eq!(calls[2][0].content, "system prompt of Ada");
    }

    #[tokio::test]
    async fn test_dialogue_with_zero_turns_or_empty_roster() {
        let backend = Arc::new(ScriptedBackend::default());
        let (engine, _dir) = engine_with(backend.clone(), roster_of(&["Ada"]));
        assert!(engine.collaborative_dialogue("t", None, 0).await.is_empty());

        let (engine, _dir) = engine_with(backend.clone(), ExpertRoster::default());
        assert!(engine.collaborative_dialogue("t", None, 3).await.is_empty());
        assert!(backend.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_outline_prompt_embeds_context_and_roster() {
        let backend = Arc::new(ScriptedBackend::default());
        let (engine, _dir) = engine_with(backend.clone(), roster_of(&["Ada"]));
        let mut ctx = GenerationContext::new("Map soil microbes", "Paper", "IMRaD");
        ctx.outline_format_hint = Some("Numbered sections".to_string());

        let response = engine.generate_outline(&ctx).await;
        assert_eq!(response.content, "reply-1");

        let calls = backend.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0][0].content, OUTLINE_SYSTEM_PROMPT);
        let text = user_text(&calls[0]);
        assert!(text.contains("Goal: Map soil microbes\n"));
        assert!(text.contains("Document Style: Paper\n"));
        assert!(text.contains("Structural Requirements: IMRaD\n"));
        assert!(text.contains("Outline Format: Numbered sections\n"));
        assert!(text.contains("Available Experts:\n- Ada: Generalist\nsystem prompt of Ada\n"));
    }

    #[tokio::test]
    async fn test_section_prompt_defaults_and_evidence() {
        let backend = Arc::new(ScriptedBackend::default());
        let (engine, _dir) = engine_with(backend.clone(), ExpertRoster::default());
        let ctx = GenerationContext::new("Goal", "Report", "IMRaD");

        engine
            .synthesize_section(&ctx, "Methods", ["note one", "note two"])
            .await;

        let calls = backend.calls.lock().unwrap();
        let text = user_text(&calls[0]);
        assert!(text.starts_with("Section: Methods\nGoal: Goal\n"));
        assert!(text.contains(&format!("Output Language: {}\n", DEFAULT_LANGUAGE_LABEL)));
        assert!(text.contains("Outline:\nN/A\n"));
        assert!(text.contains("Collected Evidence:\nnote one\nnote two\n"));
        assert!(text.contains("Cite only URLs that appear in the collected evidence"));
    }

    #[tokio::test]
    async fn test_expert_round_uses_placeholders() {
        let backend = Arc::new(ScriptedBackend::default());
        let (engine, _dir) = engine_with(backend.clone(), roster_of(&["Ada", "Ben"]));

        let (evidence, search) = engine.run_expert_round("soil carbon").await;

        let keys: Vec<&str> = evidence.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["Ada", "Ben", WEB_SEARCH_KEY, LOCAL_NOTES_KEY]);
        assert_eq!(evidence["Ada"], "reply-1");
        assert_eq!(evidence[WEB_SEARCH_KEY], NO_SEARCH_RESULTS);
        assert_eq!(evidence[LOCAL_NOTES_KEY], NO_NOTE_HITS);
        assert!(search.error.is_some());

        let calls = backend.calls.lock().unwrap();
        assert_eq!(user_text(&calls[0]), "As Ada, analyze: soil carbon. Return key facts.");
    }

    #[tokio::test]
    async fn test_expert_round_duplicate_names_last_write_wins() {
        let backend = Arc::new(ScriptedBackend::default());
        let (engine, _dir) = engine_with(backend.clone(), roster_of(&["Twin", "Other", "Twin"]));

        let (evidence, _) = engine.run_expert_round("q").await;
        assert_eq!(evidence.len(), 4);
        assert_eq!(evidence["Twin"], "reply-3");
        assert_eq!(evidence.get_index(0).unwrap().0, "Twin");
    }

    #[tokio::test]
    async fn test_expert_round_includes_note_hits() {
        let backend = Arc::new(ScriptedBackend::default());
        let (engine, _dir) = engine_with(backend, ExpertRoster::default());
        let mut engine = engine.with_note_hits(2);
        engine.notes.ingest(["lab note a", "lab note b", "lab note c"]);

        let (evidence, _) = engine.run_expert_round("q").await;
        assert_eq!(evidence[LOCAL_NOTES_KEY], "lab note a\nlab note b");
    }

    #[tokio::test]
    async fn test_failing_backend_degrades_to_text() {
        let (engine, _dir) = engine_with(Arc::new(FailingBackend), roster_of(&["Ada"]));
        let ctx = GenerationContext::new("Goal", "Report", "IMRaD");

        let outline = engine.generate_outline(&ctx).await;
        assert!(outline.is_error());
        assert_eq!(
            outline.content,
            "[Backend error] request rejected with status 401: invalid key"
        );

        let transcript = engine.collaborative_dialogue("t", None, 1).await;
        assert_eq!(
            transcript,
            vec!["Ada: [Backend error] request rejected with status 401: invalid key"]
        );
    }

    #[tokio::test]
    async fn test_experiment_unreachable_is_an_error() {
        let (engine, _dir) = engine_with(Arc::new(ScriptedBackend::default()), ExpertRoster::default());
        let err = engine.execute_experiment("h", "print(1)").await.unwrap_err();
        assert!(matches!(err, ExecutionError::Unreachable(_)));
    }
}
