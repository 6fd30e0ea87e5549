//! Question tool - ask the user for clarification.

use crate::{parse_args, Tool, ToolContext, ToolOutput, ToolResult};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

/// Surface a clarifying question in the transcript.
pub struct QuestionTool;

#[derive(Debug, Deserialize)]
struct QuestionArgs {
    text: String,
}

#[async_trait]
impl Tool for QuestionTool {
    fn id(&self) -> &str {
        "question"
    }

    fn description(&self) -> &str {
        "Ask the user for clarification or missing information."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["text"],
            "properties": {
                "text": {
                    "type": "string",
                    "description": "The question to ask the user"
                }
            }
        })
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> ToolResult<ToolOutput> {
        let args: QuestionArgs = parse_args(args)?;
        Ok(ToolOutput::new("Question", format!("QUESTION: {}", args.text)))
    }
}
