use serde::Deserialize;
use std::path::Path;
use tokio::fs;

use crate::error::{CatalogError, Result};
use crate::safety::SafetyPhrases;

// Accepted layouts of the phrases file:
//   ["prompt blocked", "safety policies"]
//   {"phrases": ["prompt blocked", "safety policies"]}
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PhraseFile {
    List(Vec<String>),
    Table { phrases: Vec<String> },
}

pub struct PhraseRegistry;

impl PhraseRegistry {
    // Reads the phrase list that drives the text fallback of safety detection.
    pub async fn load(path: impl AsRef<Path>) -> Result<SafetyPhrases> {
        let path = path.as_ref();

        let content = fs::read_to_string(path)
            .await
            .map_err(|source| CatalogError::ReadPhrases { path: path.to_path_buf(), source })?;

        let file: PhraseFile = serde_json::from_str(&content)
            .map_err(|source| CatalogError::ParsePhrases { path: path.to_path_buf(), source })?;

        let phrases = match file {
            PhraseFile::List(phrases) | PhraseFile::Table { phrases } => {
                SafetyPhrases::new(phrases)
            }
        };

        if phrases.is_empty() {
            tracing::warn!(
                path = %path.display(),
                "safety phrase file is empty; text fallback disabled"
            );
        }

        Ok(phrases)
    }
}
