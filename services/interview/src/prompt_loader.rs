use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Prompt texts that can replace the built-in defaults.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PromptOverrides {
    /// `interviewer_system.md`: system prompt for question generation.
    pub interviewer_system: Option<String>,
    /// `chat_priming.md`: first user turn of every chat session.
    pub chat_priming: Option<String>,
}

/// Reads known `.md` prompt files from `dir_path`. A missing directory simply
/// means no overrides.
pub fn load_prompt_overrides(dir_path: &Path) -> Result<PromptOverrides> {
    let mut overrides = PromptOverrides::default();
    if !dir_path.exists() {
        tracing::debug!("No prompts directory at {}", dir_path.display());
        return Ok(overrides);
    }

    for entry in fs::read_dir(dir_path)
        .with_context(|| format!("Failed to read prompts directory: {}", dir_path.display()))?
    {
        let path = entry?.path();
        if !path.is_file() || path.extension().and_then(|s| s.to_str()) != Some("md") {
            continue;
        }

        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .context("Could not get file stem for prompt file")?;
        let slot = match stem {
            "interviewer_system" => &mut overrides.interviewer_system,
            "chat_priming" => &mut overrides.chat_priming,
            other => {
                tracing::warn!("Ignoring unknown prompt file '{other}.md'");
                continue;
            }
        };

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read prompt file: {}", path.display()))?;
        let content = content.trim();
        if !content.is_empty() {
            *slot = Some(content.to_string());
        }
    }

    Ok(overrides)
}
