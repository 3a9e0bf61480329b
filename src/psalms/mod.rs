// src/psalms/mod.rs — Canonical item texts (Psalm number -> formatted text)

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use anyhow::Context;
use serde::Deserialize;

/// Formats an item number into the canonical text embedded in prompts.
pub trait ItemSource: Send + Sync {
    fn format_item(&self, number: u16) -> anyhow::Result<String>;
}

#[derive(Debug, Deserialize)]
struct PsalmFile {
    #[serde(default)]
    verses: Vec<Verse>,
}

#[derive(Debug, Deserialize)]
struct Verse {
    v: serde_json::Value,
    #[serde(default)]
    text_he: String,
}

/// Reads `psalm_NNN.json` files from a directory, caching formatted text.
pub struct PsalmLibrary {
    dir: PathBuf,
    cache: Mutex<HashMap<u16, String>>,
}

impl PsalmLibrary {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn path_for(&self, number: u16) -> PathBuf {
        self.dir.join(format!("psalm_{:03}.json", number))
    }

    /// Psalm numbers with a file present, ascending.
    pub fn available(&self) -> anyhow::Result<Vec<u16>> {
        let mut numbers = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let name = entry?.file_name();
            let name = name.to_string_lossy();
            if let Some(n) = name
                .strip_prefix("psalm_")
                .and_then(|s| s.strip_suffix(".json"))
                .and_then(|s| s.parse::<u16>().ok())
            {
                numbers.push(n);
            }
        }
        numbers.sort_unstable();
        Ok(numbers)
    }

    fn load(&self, path: &Path, number: u16) -> anyhow::Result<String> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Could not find {}", path.display()))?;
        let data: PsalmFile = serde_json::from_str(&content)
            .with_context(|| format!("Malformed psalm file {}", path.display()))?;
        Ok(format_verses(number, &data.verses))
    }
}

fn format_verses(number: u16, verses: &[Verse]) -> String {
    let mut lines = vec![format!("Psalm {}", number)];
    for verse in verses {
        let v = match &verse.v {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        lines.push(format!("{}. {}", v, verse.text_he));
    }
    lines.join("\n")
}

impl ItemSource for PsalmLibrary {
    fn format_item(&self, number: u16) -> anyhow::Result<String> {
        // A poisoned lock still holds only complete entries.
        if let Some(text) = self
            .cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&number)
        {
            return Ok(text.clone());
        }
        let text = self.load(&self.path_for(number), number)?;
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(number, text.clone());
        Ok(text)
    }
}
