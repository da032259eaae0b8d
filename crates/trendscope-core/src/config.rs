use std::path::Path;

use serde::Deserialize;
use tokio::fs;

use crate::{
    error::{Result, TrendscopeError},
    types::Stage,
};

pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    pub role: String,
    pub goal: String,
    pub backstory: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TaskConfig {
    pub description: String,
    pub expected_output: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StageConfig {
    pub agent: AgentConfig,
    pub task: TaskConfig,
}

/// Agent personas and tasks for both report stages.
#[derive(Debug, Clone, Deserialize)]
pub struct PromptConfig {
    pub analysis: StageConfig,
    pub synthesis: StageConfig,
}

/// Accepted file shapes: named stages, or parallel `agents` / `task` lists where
/// entry 0 is the analysis stage and entry 1 the synthesis stage.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawConfig {
    Named(PromptConfig),
    Positional {
        agents: Vec<AgentConfig>,
        task: Vec<TaskConfig>,
    },
}

impl TryFrom<RawConfig> for PromptConfig {
    type Error = TrendscopeError;

    fn try_from(raw: RawConfig) -> Result<Self> {
        match raw {
            RawConfig::Named(config) => Ok(config),
            RawConfig::Positional { agents, task } => {
                if agents.len() < 2 || task.len() < 2 {
                    return Err(TrendscopeError::Config(format!(
                        "positional config needs 2 agents and 2 tasks, found {} and {}",
                        agents.len(),
                        task.len()
                    )));
                }
                if agents.len() > 2 || task.len() > 2 {
                    tracing::warn!(
                        agents = agents.len(),
                        tasks = task.len(),
                        "Ignoring config entries past the second"
                    );
                }
                let mut stages = agents
                    .into_iter()
                    .zip(task)
                    .map(|(agent, task)| StageConfig { agent, task });
                match (stages.next(), stages.next()) {
                    (Some(analysis), Some(synthesis)) => Ok(PromptConfig {
                        analysis,
                        synthesis,
                    }),
                    _ => Err(TrendscopeError::Config(
                        "positional config needs 2 agents and 2 tasks".to_string(),
                    )),
                }
            }
        }
    }
}

impl PromptConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let raw: RawConfig = serde_yaml::from_str(yaml).map_err(|e| {
            TrendscopeError::Config(format!(
                "expected `analysis`/`synthesis` stages or `agents`/`task` lists: {}",
                e
            ))
        })?;
        let config = PromptConfig::try_from(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let yaml = fs::read_to_string(path)
            .await
            .map_err(|e| TrendscopeError::file_io(path, e))?;
        Self::from_yaml(&yaml)
    }

    pub fn stage(&self, stage: Stage) -> &StageConfig {
        match stage {
            Stage::Analysis => &self.analysis,
            Stage::Synthesis => &self.synthesis,
        }
    }

    fn validate(&self) -> Result<()> {
        for stage in [Stage::Analysis, Stage::Synthesis] {
            let cfg = self.stage(stage);
            let fields = [
                ("agent.role", &cfg.agent.role),
                ("agent.goal", &cfg.agent.goal),
                ("agent.backstory", &cfg.agent.backstory),
                ("task.description", &cfg.task.description),
                ("task.expected_output", &cfg.task.expected_output),
            ];
            if let Some((name, _)) = fields.iter().find(|(_, v)| v.trim().is_empty()) {
                return Err(TrendscopeError::Config(format!("{}.{} is empty", stage, name)));
            }
        }
        Ok(())
    }
}

impl AgentConfig {
    pub fn system_prompt(&self) -> String {
        format!(
            "You are {}. {}\n\nYour personal goal is: {}",
            self.role.trim(),
            self.backstory.trim(),
            self.goal.trim()
        )
    }
}

impl TaskConfig {
    /// Task text with `{name}` placeholders filled in, followed by the expected output.
    pub fn render(&self, inputs: &[(&str, &str)]) -> String {
        let mut description = self.description.trim().to_string();
        for (name, value) in inputs {
            description = description.replace(&format!("{{{}}}", name), value);
        }
        format!(
            "{}\n\nThis is the expected criteria for your final answer: {}",
            description,
            self.expected_output.trim()
        )
    }
}
