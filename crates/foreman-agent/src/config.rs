use foreman_llm::{RetryPolicy, Usage};
use serde::{Deserialize, Serialize};

/// Runtime configuration for one agent session.
///
/// `repo_map_tokens`, `cache_prompts`, and `suggest_shell_commands` are
/// honored by external collaborators (repository map, prompt cache, commit
/// surface); they live here because the delegation spawner must override
/// them when constructing an editor session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub max_tool_rounds_per_input: usize,
    pub retry: RetryPolicy,
    pub temperature: Option<f32>,
    pub repo_map_tokens: usize,
    pub cache_prompts: bool,
    pub suggest_shell_commands: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_tool_rounds_per_input: 200,
            retry: RetryPolicy::default(),
            temperature: Some(1.0),
            repo_map_tokens: 1024,
            cache_prompts: false,
            suggest_shell_commands: true,
        }
    }
}

/// Model parameters resolved from static settings by the embedding harness.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub name: String,
    pub context_window_tokens: u64,
    pub max_output_tokens: Option<u32>,
    pub supports_assistant_prefill: bool,
    pub input_cost_per_mtok: f64,
    pub output_cost_per_mtok: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: "gpt-4o".to_string(),
            context_window_tokens: 128_000,
            max_output_tokens: Some(4_096),
            supports_assistant_prefill: false,
            input_cost_per_mtok: 0.0,
            output_cost_per_mtok: 0.0,
        }
    }
}

impl ModelConfig {
    /// Dollar cost of one response's token usage.
    pub fn cost_of(&self, usage: &Usage) -> f64 {
        let input = usage.prompt_tokens as f64 * self.input_cost_per_mtok / 1_000_000.0;
        let output = usage.completion_tokens as f64 * self.output_cost_per_mtok / 1_000_000.0;
        input + output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_config_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.max_tool_rounds_per_input, 200);
        assert_eq!(config.temperature, Some(1.0));
        assert_eq!(config.repo_map_tokens, 1024);
        assert!(!config.cache_prompts);
        assert!(config.suggest_shell_commands);
    }

    #[test]
    fn cost_uses_per_million_token_prices() {
        let model = ModelConfig {
            input_cost_per_mtok: 5.0,
            output_cost_per_mtok: 15.0,
            ..ModelConfig::default()
        };
        let usage = Usage {
            prompt_tokens: 1_000_000,
            completion_tokens: 200_000,
            total_tokens: 1_200_000,
        };
        assert!((model.cost_of(&usage) - 8.0).abs() < 1e-9);
    }
}
