use anyhow::{Context, Result};
use interview_core::agent::Persona;
use std::fs;
use std::path::Path;

const INSTRUCTIONS_FILE: &str = "instructions.md";
const GREETING_FILE: &str = "greeting.md";

/// Loads the persona from `dir`, falling back to the built-in text for missing files.
pub fn load_persona(dir_path: &Path) -> Result<Persona> {
    if !dir_path.is_dir() {
        anyhow::bail!("Prompts directory not found: {}", dir_path.display());
    }

    let mut persona = Persona::default();
    if let Some(instructions) = read_prompt(&dir_path.join(INSTRUCTIONS_FILE))? {
        persona.instructions = instructions;
    }
    if let Some(greeting) = read_prompt(&dir_path.join(GREETING_FILE))? {
        persona.greeting = greeting;
    }
    Ok(persona)
}

fn read_prompt(path: &Path) -> Result<Option<String>> {
    if !path.is_file() {
        tracing::debug!("No prompt at {}, using the built-in text", path.display());
        return Ok(None);
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read prompt file: {}", path.display()))?;
    let content = content.trim();
    if content.is_empty() {
        return Ok(None);
    }
    Ok(Some(content.to_string()))
}
