//! The manager's closed tool surface.

use foreman_llm::ToolDefinition;
use serde_json::{Value, json};
use thiserror::Error;

pub const ADD_FILE_TOOL: &str = "add_file";
pub const REMOVE_FILE_TOOL: &str = "remove_file";
pub const CHECK_FILES_TOOL: &str = "check_files";
pub const MAKE_EDITS_TOOL: &str = "make_edits";
pub const STOP_EDITS_TOOL: &str = "stop_edits";

/// Malformed tool arguments. Recoverable: dispatch reports the description
/// back to the model as an error tool result and the conversation
/// continues.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("invalid arguments: {0}")]
pub struct ArgumentError(pub String);

#[derive(Debug, Error)]
pub enum ToolParseError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),
    #[error(transparent)]
    Arguments(#[from] ArgumentError),
}

/// A fully parsed tool invocation. Unknown names cannot construct a
/// variant, so dispatch exhaustively matches a closed set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ManagerTool {
    AddFile {
        explanation: String,
        filepath: String,
    },
    RemoveFile {
        explanation: String,
        filepath: String,
    },
    CheckFiles {
        explanation: Option<String>,
    },
    MakeEdits {
        explanation: String,
        filepath: String,
    },
    StopEdits,
}

impl ManagerTool {
    pub fn parse(name: &str, raw_arguments: &str) -> Result<Self, ToolParseError> {
        match name {
            STOP_EDITS_TOOL => Ok(Self::StopEdits),
            ADD_FILE_TOOL => {
                let args = parse_object(raw_arguments)?;
                Ok(Self::AddFile {
                    explanation: required_string(&args, "explanation")?,
                    filepath: required_string(&args, "filepath")?,
                })
            }
            REMOVE_FILE_TOOL => {
                let args = parse_object(raw_arguments)?;
                Ok(Self::RemoveFile {
                    explanation: required_string(&args, "explanation")?,
                    filepath: required_string(&args, "filepath")?,
                })
            }
            CHECK_FILES_TOOL => {
                let args = parse_object(raw_arguments)?;
                Ok(Self::CheckFiles {
                    explanation: optional_string(&args, "explanation")?,
                })
            }
            MAKE_EDITS_TOOL => {
                let args = parse_object(raw_arguments)?;
                Ok(Self::MakeEdits {
                    explanation: required_string(&args, "explanation")?,
                    filepath: required_string(&args, "filepath")?,
                })
            }
            other => Err(ToolParseError::UnknownTool(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::AddFile { .. } => ADD_FILE_TOOL,
            Self::RemoveFile { .. } => REMOVE_FILE_TOOL,
            Self::CheckFiles { .. } => CHECK_FILES_TOOL,
            Self::MakeEdits { .. } => MAKE_EDITS_TOOL,
            Self::StopEdits => STOP_EDITS_TOOL,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::StopEdits)
    }
}

fn parse_object(raw_arguments: &str) -> Result<Value, ArgumentError> {
    let trimmed = raw_arguments.trim();
    if trimmed.is_empty() {
        return Ok(json!({}));
    }
    let value: Value = serde_json::from_str(trimmed)
        .map_err(|error| ArgumentError(format!("arguments are not valid JSON: {error}")))?;
    if !value.is_object() {
        return Err(ArgumentError("arguments must be a JSON object".to_string()));
    }
    Ok(value)
}

fn required_string(args: &Value, key: &str) -> Result<String, ArgumentError> {
    optional_string(args, key)?
        .ok_or_else(|| ArgumentError(format!("missing required argument '{key}'")))
}

fn optional_string(args: &Value, key: &str) -> Result<Option<String>, ArgumentError> {
    let Some(value) = args.get(key) else {
        return Ok(None);
    };
    let Some(value) = value.as_str() else {
        return Err(ArgumentError(format!("argument '{key}' must be a string")));
    };
    Ok(Some(value.to_string()))
}

/// The wire schema advertised to the completion service.
///
/// `check_files` is deliberately absent: the manager may still issue it and
/// dispatch honors it, but it is not part of the advertised contract.
pub fn tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: ADD_FILE_TOOL.to_string(),
            description: "add a file to the chat context".to_string(),
            parameters: Some(json!({
                "type": "object",
                "properties": {
                    "explanation": {
                        "type": "string",
                        "description": "Short explanation of why the file should be added to the chat context."
                    },
                    "filepath": {
                        "type": "string",
                        "description": "Path to the file to add to the chat context."
                    }
                },
                "required": ["explanation", "filepath"],
                "additionalProperties": false
            })),
        },
        ToolDefinition {
            name: REMOVE_FILE_TOOL.to_string(),
            description: "remove a file from the chat context".to_string(),
            parameters: Some(json!({
                "type": "object",
                "properties": {
                    "explanation": {
                        "type": "string",
                        "description": "Short explanation of why the file should be removed from the chat context."
                    },
                    "filepath": {
                        "type": "string",
                        "description": "Path to the file to remove from the chat context."
                    }
                },
                "required": ["explanation", "filepath"],
                "additionalProperties": false
            })),
        },
        ToolDefinition {
            name: MAKE_EDITS_TOOL.to_string(),
            description: "instruct the editor engineer to plan and make changes to the code"
                .to_string(),
            parameters: Some(json!({
                "type": "object",
                "properties": {
                    "explanation": {
                        "type": "string",
                        "description": "A thorough explanation of the changes that need to be made."
                    },
                    "filepath": {
                        "type": "string",
                        "description": "Path to the file to which the changes must be made."
                    }
                },
                "required": ["explanation", "filepath"],
                "additionalProperties": false
            })),
        },
        ToolDefinition {
            name: STOP_EDITS_TOOL.to_string(),
            description: "declare the end of the editing process".to_string(),
            parameters: None,
        },
    ]
}
