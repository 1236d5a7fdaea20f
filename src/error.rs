use thiserror::Error;

/// Fatal configuration errors that terminate a run before any iteration executes.
///
/// Every other failure mode in this crate (generator, judge, reflection failures) is
/// recovered locally and never reaches this type — only a configuration problem that
/// makes the run itself meaningless surfaces as `Result::Err`.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("no samples provided")]
    NoSamples,

    #[error("structured output requested but no schema was supplied")]
    MissingSchema,

    #[error("batchSize must be >= 1")]
    InvalidBatchSize,

    #[error("invalid dimension configuration: {0}")]
    InvalidDimensions(String),

    #[error("optimization cancelled")]
    Cancelled,
}

impl CoreError {
    /// All variants of `CoreError` are fatal by construction, since recoverable
    /// failures never reach this enum.
    pub fn event_reason(&self) -> &'static str {
        match self {
            Self::NoSamples => "no_samples",
            Self::MissingSchema => "missing_schema",
            Self::InvalidBatchSize => "invalid_batch_size",
            Self::InvalidDimensions(_) => "invalid_dimensions",
            Self::Cancelled => "cancelled",
        }
    }
}

impl From<ConfigError> for CoreError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::BatchSizeZero => Self::InvalidBatchSize,
            ConfigError::StructuredOutputMissingSchema => Self::MissingSchema,
            ConfigError::NegativeWeight(name) => Self::InvalidDimensions(name),
        }
    }
}

/// Errors raised while constructing or validating an [`crate::config::OptimizeConfig`]
/// or [`crate::config::DimensionSet`] before a run starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("batchSize must be >= 1")]
    BatchSizeZero,

    #[error("dimension `{0}` has a negative weight")]
    NegativeWeight(String),

    #[error("useStructuredOutput is set but no JSON schema was supplied")]
    StructuredOutputMissingSchema,
}
