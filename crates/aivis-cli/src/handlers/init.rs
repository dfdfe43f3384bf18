//! `init`: interactively save the API key and default voice model.

use aivis_core::{DEFAULT_MODEL_UUID, UserSettings, paths};

use crate::error::CliError;
use crate::utils::input::prompt_string_with_default;

/// Merge answers into `settings`; an empty answer keeps the saved value.
fn apply_answers(mut settings: UserSettings, api_key: String, model_uuid: String) -> UserSettings {
    if !api_key.is_empty() {
        settings.api_key = Some(api_key);
    }
    if !model_uuid.is_empty() {
        settings.model_uuid = Some(model_uuid);
    }
    settings
}

/// Show only the last four characters of a saved key.
fn mask(key: &str) -> String {
    let tail: String = key
        .chars()
        .rev()
        .take(4)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("****{tail}")
}

pub fn execute() -> Result<(), CliError> {
    let path = paths::settings_path()?;
    let current = UserSettings::load_from(&path);

    println!("aivis-mcp setup");
    println!("Get an API key at https://hub.aivis-project.com/cloud-api/api-keys");
    println!();

    let masked = current.api_key.as_deref().map(mask);
    let api_key = prompt_string_with_default("Aivis API key", masked.as_deref())?;
    // Accepting the masked default means "keep the saved key".
    let api_key = if masked.as_deref() == Some(api_key.as_str()) {
        String::new()
    } else {
        api_key
    };
    let model_default = current.model_uuid.as_deref().unwrap_or(DEFAULT_MODEL_UUID);
    let model_uuid = prompt_string_with_default("Voice model UUID", Some(model_default))?;

    let settings = apply_answers(current, api_key, model_uuid);
    if settings.api_key.is_none() {
        println!("No API key given; speech will fail until one is set.");
    }
    settings.save_to(&path)?;
    println!("Saved {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn empty_answers_keep_saved_values() {
        let saved = UserSettings {
            api_key: Some("old-key".to_string()),
            redis_url: Some("redis://h:1".to_string()),
            ..UserSettings::default()
        };
        let merged = apply_answers(saved, String::new(), "model-2".to_string());
        assert_eq!(merged.api_key.as_deref(), Some("old-key"));
        assert_eq!(merged.model_uuid.as_deref(), Some("model-2"));
        assert_eq!(merged.redis_url.as_deref(), Some("redis://h:1"));
    }

    #[test]
    fn answers_are_persisted() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        apply_answers(UserSettings::default(), "k".to_string(), "m".to_string())
            .save_to(&path)
            .unwrap();
        let loaded = UserSettings::load_from(&path);
        assert_eq!(loaded.api_key.as_deref(), Some("k"));
        assert_eq!(loaded.model_uuid.as_deref(), Some("m"));
    }

    #[test]
    fn mask_keeps_the_tail() {
        assert_eq!(mask("abcdefgh"), "****efgh");
        assert_eq!(mask("ab"), "****ab");
    }
}
