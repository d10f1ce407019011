pub type StageResult<T> = Result<T, StageError>;

/// Crate-wide error type.
///
/// Export failures carry a distinct category (spawn / runtime / stream) so
/// callers can decide whether a retry makes sense.
#[derive(thiserror::Error, Debug)]
pub enum StageError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("render error: {0}")]
    Render(String),

    #[error("could not start encoder: {0}")]
    SpawnEncoder(String),

    #[error("encoder runtime error: {0}")]
    EncoderRuntime(String),

    #[error("encoder stream write error: {0}")]
    StreamWrite(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StageError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    pub fn spawn_encoder(msg: impl Into<String>) -> Self {
        Self::SpawnEncoder(msg.into())
    }

    pub fn encoder_runtime(msg: impl Into<String>) -> Self {
        Self::EncoderRuntime(msg.into())
    }

    pub fn stream_write(msg: impl Into<String>) -> Self {
        Self::StreamWrite(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(
            StageError::config("x")
                .to_string()
                .contains("configuration error:")
        );
        assert!(
            StageError::validation("x")
                .to_string()
                .contains("validation error:")
        );
        assert!(
            StageError::spawn_encoder("x")
                .to_string()
                .contains("could not start encoder:")
        );
        assert!(
            StageError::encoder_runtime("x")
                .to_string()
                .contains("encoder runtime error:")
        );
        assert!(
            StageError::stream_write("x")
                .to_string()
                .contains("encoder stream write error:")
        );
    }

    #[test]
    fn other_preserves_source() {
        let base = std::io::Error::other("boom");
        let err = StageError::Other(anyhow::Error::new(base));
        assert!(err.to_string().contains("boom"));
    }
}
