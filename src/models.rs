use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Evidence gathered in one expert round, keyed by source, in insertion order.
pub type Evidence = IndexMap<String, String>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationContext {
    pub goal: String,
    pub document_style: String,
    pub structural_requirements: String,
    pub outline_format_hint: Option<String>,
    pub output_language: Option<String>,
    /// Attached once the outline has been generated (and approved).
    pub outline: Option<String>,
    pub shared_notebook_uri: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl GenerationContext {
    pub fn new(
        goal: impl Into<String>,
        document_style: impl Into<String>,
        structural_requirements: impl Into<String>,
    ) -> Self {
        Self {
            goal: goal.into(),
            document_style: document_style.into(),
            structural_requirements: structural_requirements.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchSource {
    pub title: String,
    pub url: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub query: String,
    pub sources: Vec<SearchSource>,
    pub error: Option<String>,
}

impl SearchResult {
    pub fn failed(query: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            sources: vec![],
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub max_results: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub results: Vec<SearchHit>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: Option<String>,
    pub url: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperimentRequest {
    pub hypothesis: String,
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentReport {
    pub hypothesis: String,
    pub code: String,
    /// Raw result object returned by the execution service.
    pub raw: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftedSection {
    pub title: String,
    pub content: String,
}

/// Working record shared by the session pipeline tasks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionState {
    pub context: GenerationContext,
    pub human_feedback: Option<String>,
    pub dialogue_turns: usize,
    pub experiment: Option<ExperimentRequest>,
    pub dialogue: Vec<String>,
    pub evidence: Evidence,
    pub search: Option<SearchResult>,
    pub experiment_report: Option<String>,
    pub experiment_error: Option<String>,
    pub sections: Vec<DraftedSection>,
    pub tool_usage: Vec<String>,
}

impl SessionState {
    pub fn new(context: GenerationContext, dialogue_turns: usize) -> Self {
        Self {
            context,
            dialogue_turns,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRequest {
    pub goal: String,
    #[serde(default = "default_style")]
    pub document_style: String,
    #[serde(default = "default_structure")]
    pub structural_requirements: String,
    pub outline_format_hint: Option<String>,
    pub output_language: Option<String>,
    pub human_feedback: Option<String>,
    #[serde(default = "default_turns")]
    pub dialogue_turns: usize,
    pub experiment: Option<ExperimentRequest>,
}

fn default_style() -> String {
    "Report".to_string()
}

fn default_structure() -> String {
    "IMRaD".to_string()
}

fn default_turns() -> usize {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResponse {
    pub session_id: String,
    pub goal: String,
    pub outline: String,
    pub dialogue: Vec<String>,
    pub tool_usage: Vec<String>,
    pub sections: Vec<DraftedSection>,
    pub transcript: String,
    pub total_time_ms: u64,
    pub task_times: HashMap<String, u64>,
}
