use crate::adapters::llm::Vendor;
use anyhow::Result;
use tiktoken_rs::tokenizer::{get_tokenizer, Tokenizer};
use tiktoken_rs::CoreBPE;
use tracing::warn;

/// Client-side token estimate used to decide whether a file needs chunking.
///
/// This approximates the vendor's server-side accounting; it only has to be
/// consistent for a given model, not exact. Anthropic publishes no tokenizer,
/// so it shares the `cl100k_base` fallback.
pub struct TokenCounter {
    bpe: CoreBPE,
    tokenizer: Tokenizer,
}

impl TokenCounter {
    pub fn for_provider(vendor: Vendor, model_name: &str) -> Result<Self> {
        match vendor {
            Vendor::OpenAi => match get_tokenizer(model_name) {
                Some(tokenizer) => Ok(Self {
                    bpe: tiktoken_rs::get_bpe_from_tokenizer(tokenizer)?,
                    tokenizer,
                }),
                None => {
                    warn!(
                        "No tokenizer registered for model {}, using cl100k_base",
                        model_name
                    );
                    Self::fallback()
                }
            },
            Vendor::Anthropic => Self::fallback(),
        }
    }

    pub fn fallback() -> Result<Self> {
        Ok(Self {
            bpe: tiktoken_rs::cl100k_base()?,
            tokenizer: Tokenizer::Cl100kBase,
        })
    }

    pub fn count(&self, text: &str) -> usize {
        self.bpe.encode_with_special_tokens(text).len()
    }

    pub fn tokenizer(&self) -> Tokenizer {
        self.tokenizer
    }
}
