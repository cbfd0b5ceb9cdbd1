//! Instruction content lookup

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::Config;
use crate::{Error, Result};

/// Instruction texts keyed by name.
pub type Instructions = BTreeMap<String, String>;

/// Directory holding instructions shared by every experiment.
pub const GENERAL_SECTION: &str = "__general__";

/// Source of instruction text.
pub trait ContentProvider {
    /// All instructions for `experiment` in `language`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Content`] if the experiment has no instructions in
    /// that language.
    fn get_instructions(&self, experiment: &str, language: &str) -> Result<Instructions>;
}

/// Static instructions, returned for every experiment and language.
impl ContentProvider for Instructions {
    fn get_instructions(&self, _experiment: &str, _language: &str) -> Result<Instructions> {
        Ok(self.clone())
    }
}

/// Reads HTML instruction files from [`Config::instructions_dir`].
///
/// `<root>/<experiment>/<lang>/<key>.html` becomes `key`, and
/// `<root>/__general__/<lang>/<key>.html` becomes `__key__`.
#[derive(Debug, Clone)]
pub struct FsContentProvider {
    root: PathBuf,
}

impl FsContentProvider {
    /// Create a provider from the shared configuration.
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            root: config.instructions_dir.clone(),
        }
    }

    fn read_section(dir: &Path) -> Result<Instructions> {
        let entries = fs::read_dir(dir)
            .map_err(|e| Error::Content(format!("cannot read {}: {e}", dir.display())))?;

        let mut section = Instructions::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("html") {
                continue;
            }
            let Some(key) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let text = fs::read_to_string(&path)?;
            section.insert(key.to_string(), text.trim_end().to_string());
        }
        Ok(section)
    }
}

impl ContentProvider for FsContentProvider {
    fn get_instructions(&self, experiment: &str, language: &str) -> Result<Instructions> {
        let mut instructions = Self::read_section(&self.root.join(experiment).join(language))?;

        let general_dir = self.root.join(GENERAL_SECTION).join(language);
        if general_dir.is_dir() {
            for (key, text) in Self::read_section(&general_dir)? {
                instructions.insert(format!("__{key}__"), text);
            }
        }

        debug!(experiment, language, keys = instructions.len(), "loaded instructions");
        Ok(instructions)
    }
}
