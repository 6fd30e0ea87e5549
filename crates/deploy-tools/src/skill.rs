//! Skill tool - register reusable project automations.
//!
//! Skills live in `.agent/skills.json` under the working directory as a map
//! from name to `{description, command}`.

use crate::{parse_args, Tool, ToolContext, ToolOutput, ToolResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// A registered skill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Skill {
    /// Human-readable description.
    pub description: String,
    /// Shell command the skill runs.
    pub command: String,
}

/// Skills keyed by name.
pub type Skills = BTreeMap<String, Skill>;

/// Location of the skills file for a workspace.
pub fn skills_path(cwd: &Path) -> PathBuf {
    cwd.join(".agent").join("skills.json")
}

/// Load the workspace's skills; a missing file is an empty set.
pub async fn load_skills(cwd: &Path) -> ToolResult<Skills> {
    match fs::read_to_string(skills_path(cwd)).await {
        Ok(content) => Ok(serde_json::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Skills::new()),
        Err(e) => Err(e.into()),
    }
}

/// Register a skill.
pub struct SkillTool;

#[derive(Debug, Deserialize)]
struct SkillArgs {
    name: String,
    description: String,
    command: String,
}

#[async_trait]
impl Tool for SkillTool {
    fn id(&self) -> &str {
        "skill"
    }

    fn description(&self) -> &str {
        "Register a reusable automation skill for the project."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["name", "description", "command"],
            "properties": {
                "name": {
                    "type": "string",
                    "description": "Name of the skill (e.g., deploy, test-all)"
                },
                "description": {
                    "type": "string",
                    "description": "What the skill does"
                },
                "command": {
                    "type": "string",
                    "description": "The shell command to run"
                }
            }
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> ToolResult<ToolOutput> {
        let args: SkillArgs = parse_args(args)?;

        let mut skills = load_skills(&ctx.cwd).await?;
        skills.insert(
            args.name.clone(),
            Skill {
                description: args.description,
                command: args.command,
            },
        );

        let path = skills_path(&ctx.cwd);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, serde_json::to_string_pretty(&skills)?).await?;
        debug!(skill = %args.name, path = %path.display(), "Registered skill");

        Ok(ToolOutput::new(
            format!("Skill {}", args.name),
            format!("SUCCESS: Skill \"{}\" registered.", args.name),
        )
        .with_metadata(json!({ "count": skills.len() })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_register_and_replace() {
        let dir = TempDir::new().unwrap();
        let ctx = ToolContext::new(dir.path());

        let result = SkillTool
            .execute(
                json!({"name": "test", "description": "run tests", "command": "make test"}),
                &ctx,
            )
            .await
            .unwrap();
        assert_eq!(result.output, "SUCCESS: Skill \"test\" registered.");

        SkillTool
            .execute(
                json!({"name": "test", "description": "run all tests", "command": "make check"}),
                &ctx,
            )
            .await
            .unwrap();
        SkillTool
            .execute(
                json!({"name": "fmt", "description": "format", "command": "make fmt"}),
                &ctx,
            )
            .await
            .unwrap();

        let skills = load_skills(dir.path()).await.unwrap();
        assert_eq!(skills.len(), 2);
        assert_eq!(skills["test"].command, "make check");
    }

    #[tokio::test]
    async fn test_load_missing_is_empty() {
        let dir = TempDir::new().unwrap();
        assert!(load_skills(dir.path()).await.unwrap().is_empty());
    }
}
