use thiserror::Error;

/// Failure taxonomy for the question-answering pipeline.
///
/// Every variant is recoverable at the agent boundary: `answer_question`
/// converts each into a short user-facing string instead of propagating.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Missing credentials or connection string at startup.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The LLM call exhausted its retries or returned unusable text.
    #[error("SQL generation failed: {0}")]
    Generation(String),

    /// The candidate SQL was rejected by static validation. The payload is
    /// the user-facing reason, already actionable (e.g. names the table).
    #[error("{0}")]
    ValidationRejected(String),

    /// The store rejected a validated statement. Never swallowed: a
    /// validated-but-failing query is a validator/catalog gap worth seeing.
    #[error("query execution failed: {0}")]
    Execution(String),

    /// The narration LLM call failed after the query already ran.
    #[error("result interpretation failed: {0}")]
    Interpretation(String),
}
