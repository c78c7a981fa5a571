use serde::{Deserialize, Serialize};

/// Request used when none is given.
pub const DEFAULT_REQUEST: &str = "Deploy my app";

/// One named stage of the backend pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentDefinition {
    pub name: String,
    pub label: String,
    #[serde(default)]
    pub description: String,
}

impl AgentDefinition {
    pub fn new(name: &str, label: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            description: description.to_string(),
        }
    }

    /// Case-insensitive match against either the short name or the label.
    pub fn matches(&self, key: &str) -> bool {
        self.name.eq_ignore_ascii_case(key) || self.label.eq_ignore_ascii_case(key)
    }
}

struct StaticAgent {
    name: &'static str,
    label: &'static str,
    description: &'static str,
}

static DEVOPS_AGENTS: &[StaticAgent] = &[
    StaticAgent {
        name: "planner",
        label: "PlannerAgent",
        description: "Breaks the request into an ordered deployment plan",
    },
    StaticAgent {
        name: "coder",
        label: "CodeAgent",
        description: "Produces the configuration and code the plan needs",
    },
    StaticAgent {
        name: "reviewer",
        label: "ReviewAgent",
        description: "Checks the generated changes for risk and correctness",
    },
    StaticAgent {
        name: "explainer",
        label: "ExplainerAgent",
        description: "Summarizes the outcome for the operator",
    },
];

static OPS_AGENTS: &[StaticAgent] = &[
    StaticAgent {
        name: "monitor",
        label: "MonitorAgent",
        description: "Collects and classifies infrastructure signals",
    },
    StaticAgent {
        name: "reason",
        label: "ReasonAgent",
        description: "Finds the root cause and proposes an action",
    },
    StaticAgent {
        name: "act",
        label: "ActAgent",
        description: "Applies safe remediations automatically",
    },
    StaticAgent {
        name: "escalate",
        label: "EscalateAgent",
        description: "Routes risky actions to a human reviewer",
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PipelineProfile {
    #[default]
    Devops,
    Ops,
}

impl PipelineProfile {
    pub fn agents(self) -> Vec<AgentDefinition> {
        let table = match self {
            PipelineProfile::Devops => DEVOPS_AGENTS,
            PipelineProfile::Ops => OPS_AGENTS,
        };
        table
            .iter()
            .map(|a| AgentDefinition::new(a.name, a.label, a.description))
            .collect()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PipelineProfile::Devops => "devops",
            PipelineProfile::Ops => "ops",
        }
    }
}

impl std::fmt::Display for PipelineProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profiles_have_four_agents() {
        assert_eq!(PipelineProfile::Devops.agents().len(), 4);
        let ops: Vec<String> = PipelineProfile::Ops.agents().into_iter().map(|a| a.name).collect();
        assert_eq!(ops, vec!["monitor", "reason", "act", "escalate"]);
    }

    #[test]
    fn test_matches_name_or_label() {
        let agent = AgentDefinition::new("coder", "CodeAgent", "");
        assert!(agent.matches("CODER"));
        assert!(agent.matches("codeagent"));
        assert!(!agent.matches("reviewer"));
    }
}
