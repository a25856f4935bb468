//! The closed set of pipeline stages.

mod classify;
mod direct;
mod docs;
mod generate;
mod retrieve;

pub use classify::ClassifyStage;
pub use direct::DirectReplyStage;
pub use docs::AnalyzeDocsStage;
pub use generate::GenerateCodeStage;
pub use retrieve::RetrieveStage;
