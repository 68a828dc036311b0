use std::{fmt, str::FromStr};

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

/// Single-turn prompt templates applied in chat mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptTemplate {
    /// Prompt is sent verbatim.
    #[default]
    Plain,
    Gemma,
    ChatMl,
    Llama3,
}

impl PromptTemplate {
    pub fn render(&self, prompt: &str) -> String {
        match self {
            Self::Plain => prompt.to_string(),
            Self::Gemma => {
                format!("<start_of_turn>user\n{prompt}<end_of_turn>\n<start_of_turn>model\n")
            }
            Self::ChatMl => {
                format!("<|im_start|>user\n{prompt}<|im_end|>\n<|im_start|>assistant\n")
            }
            Self::Llama3 => format!(
                "<|start_header_id|>user<|end_header_id|>\n\n{prompt}<|eot_id|><|start_header_id|>assistant<|end_header_id|>\n\n"
            ),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::Gemma => "gemma",
            Self::ChatMl => "chatml",
            Self::Llama3 => "llama3",
        }
    }
}

impl fmt::Display for PromptTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PromptTemplate {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "plain" | "raw" => Ok(Self::Plain),
            "gemma" => Ok(Self::Gemma),
            "chatml" => Ok(Self::ChatMl),
            "llama3" => Ok(Self::Llama3),
            other => bail!("unknown prompt template `{other}`"),
        }
    }
}
