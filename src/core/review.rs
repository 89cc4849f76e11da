//! Review orchestration: decides per file between a single request and a
//! sequence of chunked requests, and collects one result per changed file.

use crate::adapters::llm::{create_adapter, LLMAdapter, LLMRequest, ProviderConfig, Vendor};
use crate::config::ConfigError;
use crate::core::filter::FileFilter;
use crate::core::git::ChangeSet;
use crate::core::prompt::PromptBuilder;
use crate::core::structure::project_structure;
use crate::core::tokenizer::TokenCounter;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Separator placed between the responses for consecutive chunks.
const CHUNK_SEPARATOR: &str = "\n\n";

#[derive(Error, Debug)]
pub enum ReviewError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to initialise {vendor} client: {source}")]
    Client {
        vendor: &'static str,
        source: anyhow::Error,
    },

    #[error("review request for {file} (part {chunk} of {total}) failed: {source:#}")]
    Request {
        file: String,
        chunk: usize,
        total: usize,
        source: anyhow::Error,
    },
}

#[derive(Debug, Clone)]
pub struct ReviewSettings {
    pub repo_path: PathBuf,
    pub code_depth: usize,
    pub program_languages: Vec<String>,
    pub output_language: String,
    /// Token budget for a single request, also used as the chunk length in characters.
    pub batch_size: usize,
    pub ignore_settings_files: bool,
    pub exclude: Vec<String>,
}

impl Default for ReviewSettings {
    fn default() -> Self {
        Self {
            repo_path: PathBuf::from("."),
            code_depth: 0,
            program_languages: vec!["Python".to_string()],
            output_language: "English".to_string(),
            batch_size: 100_000,
            ignore_settings_files: true,
            exclude: Vec::new(),
        }
    }
}

/// One provider call. Lives only until its response has been captured.
#[derive(Debug, Clone)]
pub struct ReviewRequest {
    pub prompt: String,
    pub file_path: String,
    /// 1-based.
    pub chunk_index: usize,
    pub total_chunks: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewOutcome {
    Reviewed(String),
    Skipped(&'static str),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReview {
    pub path: String,
    pub outcome: ReviewOutcome,
}

pub struct ReviewOrchestrator {
    settings: ReviewSettings,
    vendor: Vendor,
    adapter: Box<dyn LLMAdapter>,
    tokens: TokenCounter,
    prompts: PromptBuilder,
    filter: FileFilter,
}

impl ReviewOrchestrator {
    /// Builds an orchestrator around an already constructed adapter.
    pub fn new(
        settings: ReviewSettings,
        vendor: Vendor,
        adapter: Box<dyn LLMAdapter>,
        tokens: TokenCounter,
    ) -> Result<Self, ConfigError> {
        if settings.batch_size == 0 {
            return Err(ConfigError::InvalidBatchSize);
        }
        if settings.program_languages.is_empty() {
            return Err(ConfigError::NoProgramLanguage);
        }
        if settings.code_depth > 0 {
            std::fs::read_dir(&settings.repo_path).map_err(|source| ConfigError::RepoPath {
                path: settings.repo_path.clone(),
                source,
            })?;
        }

        let filter = FileFilter::new(settings.ignore_settings_files, &settings.exclude)?;
        let structure = project_structure(&settings.repo_path, settings.code_depth);
        let prompts = PromptBuilder::new(
            &settings.program_languages,
            &settings.output_language,
            structure,
        );

        Ok(Self {
            settings,
            vendor,
            adapter,
            tokens,
            prompts,
            filter,
        })
    }

    /// Validates the provider settings and builds the vendor client and
    /// tokenizer for it.
    pub fn from_config(settings: ReviewSettings, provider: &ProviderConfig) -> Result<Self, ReviewError> {
        provider.validate()?;

        let adapter = create_adapter(provider).map_err(|source| ReviewError::Client {
            vendor: provider.vendor.as_str(),
            source,
        })?;
        let tokens = TokenCounter::for_provider(provider.vendor, &provider.model_name)
            .map_err(|source| ReviewError::Client {
                vendor: provider.vendor.as_str(),
                source,
            })?;

        Ok(Self::new(settings, provider.vendor, adapter, tokens)?)
    }

    pub fn count_tokens(&self, text: &str) -> usize {
        self.tokens.count(text)
    }

    /// Reviews one file. Files whose combined token count exceeds the batch
    /// size are split into character slices and reviewed part by part; the
    /// responses are joined in part order.
    pub async fn review_file(&self, path: &str, before: &str, after: &str) -> Result<String, ReviewError> {
        let batch_size = self.settings.batch_size;
        let token_total = self.count_tokens(before) + self.count_tokens(after);

        if token_total <= batch_size {
            info!("Reviewing {} ({} tokens)", path, token_total);
            let request = ReviewRequest {
                prompt: self.prompts.build_prompt(path, before, after),
                file_path: path.to_string(),
                chunk_index: 1,
                total_chunks: 1,
            };
            return self.send(request).await;
        }

        let chunks = split_into_chunks(before, after, batch_size);
        let total = chunks.len();
        info!(
            "Reviewing {} in {} parts ({} tokens exceed batch size {})",
            path, total, token_total, batch_size
        );

        let mut responses = Vec::with_capacity(total);
        for (index, (before_part, after_part)) in chunks.into_iter().enumerate() {
            let request = ReviewRequest {
                prompt: self.prompts.build_chunk_prompt(path, before_part, after_part, index + 1, total),
                file_path: path.to_string(),
                chunk_index: index + 1,
                total_chunks: total,
            };
            responses.push(self.send(request).await?);
        }

        Ok(responses.join(CHUNK_SEPARATOR))
    }

    /// Reviews every file of `changes` in order. Each file yields exactly one
    /// entry; failures are reported in place rather than dropped.
    pub async fn review_changes(&self, changes: &ChangeSet) -> Vec<FileReview> {
        let mut reviews = Vec::with_capacity(changes.len());

        for (path, change) in changes {
            let outcome = match self.filter.skip_reason(path) {
                Some(reason) => {
                    info!("Skipping {}: {}", path, reason);
                    ReviewOutcome::Skipped(reason)
                }
                None => match self.review_file(path, &change.before, &change.after).await {
                    Ok(text) => ReviewOutcome::Reviewed(text),
                    Err(err) => {
                        warn!("{}", err);
                        ReviewOutcome::Failed(err.to_string())
                    }
                },
            };

            reviews.push(FileReview {
                path: path.clone(),
                outcome,
            });
        }

        reviews
    }

    async fn send(&self, request: ReviewRequest) -> Result<String, ReviewError> {
        debug!(
            "Sending {} part {}/{} ({} prompt chars)",
            request.file_path,
            request.chunk_index,
            request.total_chunks,
            request.prompt.len()
        );

        match self.adapter.complete(LLMRequest::new(request.prompt)).await {
            Ok(response) => Ok(response.content),
            Err(source) => Err(ReviewError::Request {
                file: request.file_path,
                chunk: request.chunk_index,
                total: request.total_chunks,
                source,
            }),
        }
    }
}

impl fmt::Display for ReviewOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Code Review Assistant for {} using {} with model {} (output in {})",
            self.settings.program_languages.join(", "),
            self.vendor,
            self.adapter.model_name(),
            self.settings.output_language
        )
    }
}

impl fmt::Debug for ReviewOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReviewOrchestrator")
            .field("repo_path", &self.settings.repo_path)
            .field("vendor", &self.vendor.as_str())
            .field("model_name", &self.adapter.model_name())
            .field("code_depth", &self.settings.code_depth)
            .field("program_languages", &self.settings.program_languages)
            .field("output_language", &self.settings.output_language)
            .field("batch_size", &self.settings.batch_size)
            .finish()
    }
}

/// Pairs fixed-length character slices of `before` and `after`.
///
/// The number of parts follows `before` (at least one). Slices of `after`
/// beyond that count are folded into the last part so none of it is lost.
pub fn split_into_chunks<'a>(before: &'a str, after: &'a str, size: usize) -> Vec<(&'a str, &'a str)> {
    let before_starts = slice_starts(before, size);
    let after_starts = slice_starts(after, size);
    let total = before_starts.len().max(1);

    (0..total)
        .map(|index| {
            let before_part = slice_at(before, &before_starts, index);
            let after_part = if index + 1 == total {
                after_starts.get(index).map_or("", |&start| &after[start..])
            } else {
                slice_at(after, &after_starts, index)
            };
            (before_part, after_part)
        })
        .collect()
}

// Byte offsets at which each `size`-character slice begins.
fn slice_starts(text: &str, size: usize) -> Vec<usize> {
    text.char_indices().step_by(size).map(|(offset, _)| offset).collect()
}

fn slice_at<'a>(text: &'a str, starts: &[usize], index: usize) -> &'a str {
    match starts.get(index) {
        Some(&start) => {
            let end = starts.get(index + 1).copied().unwrap_or(text.len());
            &text[start..end]
        }
        None => "",
    }
}
