pub mod llm;
pub mod openai;
pub mod anthropic;

pub use openai::OpenAIAdapter;
pub use anthropic::AnthropicAdapter;
