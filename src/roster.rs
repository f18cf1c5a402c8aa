//! Expert personas that take part in outline generation and dialogue.

use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpertProfile {
    pub name: String,
    #[serde(default)]
    pub focus: String,
    pub system_prompt: String,
}

impl ExpertProfile {
    fn focus_or(&self, fallback: &str) -> String {
        if self.focus.trim().is_empty() {
            fallback.to_string()
        } else {
            self.focus.clone()
        }
    }
}

/// Ordered roster; order is dialogue turn order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpertRoster {
    experts: Vec<ExpertProfile>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RosterFile {
    Wrapped { experts: Vec<ExpertProfile> },
    List(Vec<ExpertProfile>),
}

impl ExpertRoster {
    pub fn new(experts: Vec<ExpertProfile>) -> Self {
        Self { experts }
    }

    /// The panel used when no roster file is supplied.
    pub fn default_panel() -> Self {
        let mut roster = Self::default();
        roster.register(
            "Literature Reviewer",
            "Act like a meticulous literature reviewer; summarize peer-reviewed \
             evidence, key datasets, and state-of-the-art techniques.",
            "Source recent peer-reviewed findings",
        );
        roster.register(
            "Methodologist",
            "Outline reproducible experimental designs, controls, and evaluation \
             metrics tailored to the research goal.",
            "Design experiments",
        );
        roster.register(
            "Data Engineer",
            "Identify computational constraints, data preprocessing needs, and \
             implementation pitfalls; surface code sketches when helpful.",
            "Implementation constraints",
        );
        roster
    }

    /// Accepts either `experts: [...]` or a bare list.
    pub fn from_yaml_str(raw: &str) -> Result<Self, serde_yaml::Error> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        let experts = match serde_yaml::from_str::<RosterFile>(raw)? {
            RosterFile::Wrapped { experts } | RosterFile::List(experts) => experts,
        };
        Ok(Self { experts })
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read roster {}: {}", path.display(), e))?;
        Self::from_yaml_str(&raw)
            .map_err(|e| anyhow::anyhow!("Failed to parse roster {}: {}", path.display(), e))
    }

    pub fn register(
        &mut self,
        name: impl Into<String>,
        system_prompt: impl Into<String>,
        focus: impl Into<String>,
    ) {
        self.experts.push(ExpertProfile {
            name: name.into(),
            focus: focus.into(),
            system_prompt: system_prompt.into(),
        });
    }

    pub fn clear(&mut self) {
        self.experts.clear();
    }

    pub fn experts(&self) -> &[ExpertProfile] {
        &self.experts
    }

    pub fn len(&self) -> usize {
        self.experts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.experts.is_empty()
    }

    /// One block per persona. This text is embedded verbatim in prompts.
    pub fn describe_team(&self) -> String {
        self.experts
            .iter()
            .map(|expert| {
                format!(
                    "- {}: {}\n{}",
                    expert.name,
                    expert.focus_or("Generalist"),
                    expert.system_prompt
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Discussion seed points: focus, or name when the focus is blank.
    pub fn suggest_outline_hooks(&self) -> Vec<String> {
        self.experts
            .iter()
            .map(|expert| expert.focus_or(&expert.name))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_roster_describes_as_empty_string() {
        assert_eq!(ExpertRoster::default().describe_team(), "");
    }

    #[test]
    fn test_blank_focus_falls_back_to_generalist() {
        let mut roster = ExpertRoster::default();
        roster.register("Statistician", "Check the numbers.", "  ");
        assert_eq!(roster.describe_team(), "- Statistician: Generalist\nCheck the numbers.");
    }

    #[test]
    fn test_describe_team_joins_blocks_in_order() {
        let mut roster = ExpertRoster::default();
        roster.register("A", "prompt a", "focus a");
        roster.register("B", "prompt b", "");
        assert_eq!(
            roster.describe_team(),
            "- A: focus a\nprompt a\n- B: Generalist\nprompt b"
        );
    }

    #[test]
    fn test_outline_hooks_use_name_when_focus_blank() {
        let mut roster = ExpertRoster::default();
        roster.register("Chemist", "p", "Reaction kinetics");
        roster.register("Physicist", "p", "");
        assert_eq!(roster.suggest_outline_hooks(), vec!["Reaction kinetics", "Physicist"]);
    }

    #[test]
    fn test_clear_empties_roster() {
        let mut roster = ExpertRoster::default_panel();
        assert_eq!(roster.len(), 3);
        roster.clear();
        assert!(roster.is_empty());
        assert!(roster.suggest_outline_hooks().is_empty());
    }

    #[test]
    fn test_duplicate_names_are_kept() {
        let mut roster = ExpertRoster::default();
        roster.register("Twin", "first", "");
        roster.register("Twin", "second", "");
        assert_eq!(roster.len(), 2);
    }

    #[test]
    fn test_yaml_wrapped_and_bare_lists() {
        let wrapped = "experts:\n  - name: Ecologist\n    focus: Field data\n    system_prompt: Study habitats.\n";
        let roster = ExpertRoster::from_yaml_str(wrapped).unwrap();
        assert_eq!(roster.experts()[0].name, "Ecologist");
        assert_eq!(roster.experts()[0].focus, "Field data");

        let bare = "- name: Reviewer\n  system_prompt: Be critical.\n";
        let roster = ExpertRoster::from_yaml_str(bare).unwrap();
        assert_eq!(roster.experts()[0].focus, "");
        assert_eq!(roster.describe_team(), "- Reviewer: Generalist\nBe critical.");
    }
}
