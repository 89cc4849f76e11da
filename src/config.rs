use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while assembling the reviewer, before any request is made.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Vendor '{0}' is not supported.")]
    UnsupportedVendor(String),

    #[error("API key must be provided either via --api-key option or {0} environment variable.")]
    MissingApiKey(&'static str),

    #[error("model name must not be empty")]
    MissingModel,

    #[error("temperature must be between 0.0 and 1.0, got {0}")]
    InvalidTemperature(f32),

    #[error("batch size must be greater than zero")]
    InvalidBatchSize,

    #[error("at least one program language is required")]
    NoProgramLanguage,

    #[error("invalid exclude pattern '{pattern}': {source}")]
    InvalidExclude {
        pattern: String,
        source: glob::PatternError,
    },

    #[error("cannot read repository at {path}: {source}")]
    RepoPath {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_vendor")]
    pub vendor: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default)]
    pub code_depth: usize,

    #[serde(default = "default_program_languages")]
    pub program_languages: Vec<String>,

    #[serde(default = "default_output_language")]
    pub output_language: String,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    pub timeout_secs: Option<u64>,

    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    pub max_tokens: Option<usize>,
    pub base_url: Option<String>,

    #[serde(default = "default_true")]
    pub ignore_settings_files: bool,

    #[serde(default)]
    pub exclude: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            vendor: default_vendor(),
            model: default_model(),
            temperature: default_temperature(),
            code_depth: 0,
            program_languages: default_program_languages(),
            output_language: default_output_language(),
            batch_size: default_batch_size(),
            timeout_secs: None,
            max_retries: default_max_retries(),
            max_tokens: None,
            base_url: None,
            ignore_settings_files: true,
            exclude: Vec::new(),
        }
    }
}

/// Values given on the command line. `None` keeps the file or default value.
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    pub vendor: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub code_depth: Option<usize>,
    pub program_languages: Option<Vec<String>>,
    pub output_language: Option<String>,
    pub batch_size: Option<usize>,
    pub timeout_secs: Option<u64>,
    pub max_retries: Option<usize>,
    pub review_all_files: bool,
}

impl Config {
    pub fn load() -> Result<Self> {
        for name in [".ai-review.yml", ".ai-review.yaml"] {
            let path = PathBuf::from(name);
            if path.exists() {
                return Self::from_file(&path);
            }
        }

        if let Some(home_dir) = dirs::home_dir() {
            let home_config = home_dir.join(".ai-review.yml");
            if home_config.exists() {
                return Self::from_file(&home_config);
            }
        }

        Ok(Config::default())
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    pub fn merge_with_cli(&mut self, cli: CliOverrides) {
        if let Some(vendor) = cli.vendor {
            self.vendor = vendor;
        }
        if let Some(model) = cli.model {
            self.model = model;
        }
        if let Some(temperature) = cli.temperature {
            self.temperature = temperature;
        }
        if let Some(depth) = cli.code_depth {
            self.code_depth = depth;
        }
        if let Some(languages) = cli.program_languages {
            self.program_languages = languages;
        }
        if let Some(language) = cli.output_language {
            self.output_language = language;
        }
        if let Some(batch_size) = cli.batch_size {
            self.batch_size = batch_size;
        }
        if let Some(timeout) = cli.timeout_secs {
            self.timeout_secs = Some(timeout);
        }
        if let Some(retries) = cli.max_retries {
            self.max_retries = retries;
        }
        if cli.review_all_files {
            self.ignore_settings_files = false;
        }
    }
}

/// Splits a comma separated language list, trimming blanks.
pub fn parse_languages(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|lang| !lang.is_empty())
        .map(str::to_string)
        .collect()
}

fn default_vendor() -> String {
    "openai".to_string()
}

fn default_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_temperature() -> f32 {
    0.1
}

fn default_program_languages() -> Vec<String> {
    vec!["Python".to_string()]
}

fn default_output_language() -> String {
    "English".to_string()
}

fn default_batch_size() -> usize {
    100_000
}

fn default_max_retries() -> usize {
    2
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_languages_splits_and_trims() {
        assert_eq!(parse_languages("Python"), vec!["Python"]);
        assert_eq!(parse_languages("Python,JavaScript"), vec!["Python", "JavaScript"]);
        assert_eq!(
            parse_languages("Python, JavaScript, TypeScript"),
            vec!["Python", "JavaScript", "TypeScript"]
        );
        assert!(parse_languages(" , ").is_empty());
    }

    #[test]
    fn partial_yaml_falls_back_to_defaults() {
        let config: Config = serde_yaml::from_str("vendor: anthropic\nbatch_size: 50\n").unwrap();
        assert_eq!(config.vendor, "anthropic");
        assert_eq!(config.batch_size, 50);
        assert_eq!(config.model, "gpt-3.5-turbo");
        assert_eq!(config.program_languages, vec!["Python"]);
        assert!(config.ignore_settings_files);
    }

    #[test]
    fn from_file_reads_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".ai-review.yml");
        std::fs::write(&path, "model: gpt-4o\nexclude:\n  - \"vendor/**\"\n").unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.model, "gpt-4o");
        assert_eq!(config.exclude, vec!["vendor/**"]);
    }

    #[test]
    fn cli_values_override_file_values() {
        let mut config = Config::default();
        config.merge_with_cli(CliOverrides {
            model: Some("gpt-4".to_string()),
            temperature: Some(0.5),
            program_languages: Some(vec!["Rust".to_string()]),
            review_all_files: true,
            ..Default::default()
        });

        assert_eq!(config.model, "gpt-4");
        assert_eq!(config.temperature, 0.5);
        assert_eq!(config.program_languages, vec!["Rust"]);
        assert_eq!(config.vendor, "openai");
        assert!(!config.ignore_settings_files);
    }
}
