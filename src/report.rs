//! Session transcript rendering.

use crate::engine::DEFAULT_LANGUAGE_LABEL;
use crate::models::SessionState;
use chrono::{DateTime, Utc};
use std::path::Path;
use tracing::info;

/// Tool-usage lines for the transcript: search first, then execution.
pub fn tool_usage(state: &SessionState) -> Vec<String> {
    let mut lines = Vec::new();
    match &state.search {
        Some(search) if !search.sources.is_empty() => {
            lines.push(format!("Web search executed: {}", search.query));
            lines.extend(
                search
                    .sources
                    .iter()
                    .map(|source| format!("- {}: {}", source.title, source.url)),
            );
        }
        Some(search) => lines.push(format!(
            "Web search skipped/failed: {}",
            search.error.as_deref().unwrap_or("no sources returned")
        )),
        None => lines.push("Web search: not invoked in this session.".to_string()),
    }

    match (&state.experiment, &state.experiment_error) {
        (_, Some(error)) => lines.push(format!("Execution service failed: {}", error)),
        (Some(request), None) => lines.push(format!(
            "Execution service ran hypothesis: {}",
            request.hypothesis
        )),
        (None, None) => lines.push("Execution service: not invoked in this session.".to_string()),
    }
    lines
}

pub fn render_transcript(state: &SessionState, generated_at: DateTime<Utc>) -> String {
    let ctx = &state.context;
    let language = ctx
        .output_language
        .as_deref()
        .filter(|l| !l.trim().is_empty())
        .unwrap_or(DEFAULT_LANGUAGE_LABEL);

    let dialogue = if state.dialogue.is_empty() {
        "No dialogue captured.".to_string()
    } else {
        state.dialogue.join("\n\n")
    };

    let mut out = String::new();
    out.push_str("# Sci-STORM Session Transcript\n\n");
    out.push_str(&format!("_Generated {}_\n\n", generated_at.to_rfc3339()));
    out.push_str(&format!("## Goal\n\n{}\n\n", ctx.goal));
    out.push_str(&format!("## Output Language\n\n{}\n\n", language));
    out.push_str(&format!(
        "## Outline\n\n{}\n\n",
        ctx.outline.as_deref().unwrap_or("No outline generated.")
    ));
    out.push_str(&format!("## Expert Dialogue\n\n{}\n\n", dialogue));
    out.push_str(&format!("## Tool Usage\n\n{}\n\n", tool_usage(state).join("\n")));
    if let Some(report) = &state.experiment_report {
        out.push_str(&format!("## Experiment Report\n\n{}\n\n", report));
    }
    out.push_str("## Draft\n");
    for section in &state.sections {
        out.push_str(&format!("\n### {}\n\n{}\n", section.title, section.content));
    }
    out
}

/// Write the transcript once, creating parent directories.
pub fn write_transcript(path: impl AsRef<Path>, transcript: &str) -> anyhow::Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, transcript)?;
    info!("Transcript written to {}", path.display());
    Ok(())
}
