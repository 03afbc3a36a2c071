use crate::capability::BackendKind;
use draftwise_core::EditorError;
use draftwise_types::GenerationId;

/// Errors reported by a generation backend.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CapabilityError {
    #[error("{0} does not support {1}")]
    Unsupported(BackendKind, &'static str),

    #[error("{0}")]
    Failed(String),
}

/// Errors that end a generation. Every variant except `Editor` leaves the
/// document as it was before the request.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PipelineError {
    #[error("{backend} is not {reason}")]
    CapabilityUnavailable {
        backend: BackendKind,
        reason: &'static str,
    },

    #[error("Generation stream failed: {0}")]
    StreamFailure(String),

    #[error("An AI operation is already in progress ({0})")]
    OperationInProgress(GenerationId),

    #[error("The generation placeholder was removed before the operation finished")]
    PlaceholderLost,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Editor(EditorError),
}

impl PipelineError {
    pub(crate) fn unavailable(backend: BackendKind) -> Self {
        PipelineError::CapabilityUnavailable {
            backend,
            reason: "available",
        }
    }

    pub(crate) fn not_enabled(backend: BackendKind) -> Self {
        PipelineError::CapabilityUnavailable {
            backend,
            reason: "properly enabled",
        }
    }
}

impl From<EditorError> for PipelineError {
    fn from(err: EditorError) -> Self {
        match err {
            EditorError::OperationInProgress(id) => PipelineError::OperationInProgress(id),
            EditorError::UnknownGeneration(_) => PipelineError::PlaceholderLost,
            other => PipelineError::Editor(other),
        }
    }
}

impl From<CapabilityError> for PipelineError {
    fn from(err: CapabilityError) -> Self {
        PipelineError::StreamFailure(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_messages() {
        assert_eq!(
            PipelineError::unavailable(BackendKind::Writer).to_string(),
            "writer is not available"
        );
        assert_eq!(
            PipelineError::not_enabled(BackendKind::LanguageDetector).to_string(),
            "languageDetector is not properly enabled"
        );
    }

    #[test]
    fn test_editor_errors_map_onto_pipeline_errors() {
        let id = GenerationId::new();
        assert_eq!(
            PipelineError::from(EditorError::OperationInProgress(id)),
            PipelineError::OperationInProgress(id)
        );
        assert_eq!(
            PipelineError::from(EditorError::UnknownGeneration(id)),
            PipelineError::PlaceholderLost
        );
    }
}
