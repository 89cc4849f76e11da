pub mod filter;
pub mod git;
pub mod prompt;
pub mod review;
pub mod structure;
pub mod tokenizer;

pub use git::{ChangeSet, GitIntegration};
pub use review::{FileReview, ReviewOrchestrator, ReviewOutcome, ReviewSettings};
