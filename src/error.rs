pub type AugmentResult<T> = Result<T, AugmentError>;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum AugmentError {
    /// Inputs which can never produce a result,
    /// e.g. mismatched ranks or an ROI larger than its volume.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Neither foreground nor background holds a single candidate location.
    #[error("no sampling location available: foreground and background are both empty")]
    SamplingExhausted,
}

impl AugmentError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}
