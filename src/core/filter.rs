use crate::config::ConfigError;
use glob::Pattern;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

static SETTINGS_FILE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(\..+|.+\.(toml|md|txt|cfg|in|ini|ya?ml|json|lock))$").unwrap()
});

/// Decides which changed files are sent for review.
#[derive(Debug, Clone, Default)]
pub struct FileFilter {
    pub ignore_settings_files: bool,
    exclude: Vec<Pattern>,
}

impl FileFilter {
    pub fn new(ignore_settings_files: bool, exclude: &[String]) -> Result<Self, ConfigError> {
        let exclude = exclude
            .iter()
            .map(|pattern| {
                Pattern::new(pattern).map_err(|source| ConfigError::InvalidExclude {
                    pattern: pattern.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            ignore_settings_files,
            exclude,
        })
    }

    /// Returns why `file_path` should be skipped, or `None` to review it.
    pub fn skip_reason(&self, file_path: &str) -> Option<&'static str> {
        if self.exclude.iter().any(|pattern| pattern.matches(file_path)) {
            return Some("excluded by configuration");
        }
        if self.should_ignore_file(file_path) {
            return Some("settings file");
        }
        None
    }

    pub fn should_ignore_file(&self, file_path: &str) -> bool {
        if !self.ignore_settings_files {
            return false;
        }
        Path::new(file_path)
            .file_name()
            .and_then(|name| name.to_str())
            .map_or(false, |name| SETTINGS_FILE.is_match(name))
    }
}
