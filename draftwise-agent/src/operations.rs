//! Routing of AI operations onto backends.

use crate::capability::{BackendKind, Length, SessionOptions, Tone};
use crate::error::{PipelineError, Result};
use draftwise_core::AiConfig;
use draftwise_types::OperationKind;

/// Everything needed to open a session and feed it.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationPlan {
    pub kind: OperationKind,
    pub backend: BackendKind,
    pub options: SessionOptions,
    /// Text handed to the backend.
    pub input: String,
}

impl OperationPlan {
    /// Translation needs the source language detected first.
    pub fn needs_detection(&self) -> bool {
        self.backend == BackendKind::Translator && self.options.source_language.is_none()
    }
}

/// Context used when the configuration supplies none.
pub fn default_context(kind: OperationKind) -> &'static str {
    match kind {
        OperationKind::Generate => {
            "Generate professional, well-structured content in blog or article format"
        }
        OperationKind::Improve => {
            "Enhance the given text through advanced vocabulary and error correction"
        }
        OperationKind::Fix => "Fix grammar and spelling errors in the text",
        OperationKind::Longer => "Make the given text longer by adding more details and elaboration",
        OperationKind::Shorter => "Make the given text shorter while preserving key information",
        OperationKind::Summarize => "Create a concise summary of the main points from the given text",
        OperationKind::ToneFormal | OperationKind::ToneCasual => "Change the tone of the text",
        OperationKind::Translate => "Translate the text",
    }
}

/// Build the plan for `kind` over the selected `text`.
///
/// `generate` writes from the prompt when nothing is selected and rewrites
/// the selection with the prompt as context otherwise. All other kinds need
/// a selection.
pub fn plan(
    kind: OperationKind,
    text: &str,
    prompt: Option<&str>,
    target_language: Option<&str>,
    config: &AiConfig,
) -> Result<OperationPlan> {
    let selected = !text.trim().is_empty();
    if kind.requires_selection() && !selected {
        return Err(PipelineError::InvalidRequest(format!(
            "{kind} needs selected text"
        )));
    }
    let prompt = prompt.map(str::trim).filter(|p| !p.is_empty());
    let context = config
        .shared_context(kind)
        .unwrap_or_else(|| default_context(kind))
        .to_string();
    let mut options = SessionOptions {
        shared_context: Some(context),
        format: config.output_format,
        ..SessionOptions::default()
    };

    let (backend, input) = match kind {
        OperationKind::Generate if selected => {
            if let Some(prompt) = prompt {
                options.shared_context = Some(prompt.to_string());
            }
            (BackendKind::Rewriter, text.to_string())
        }
        OperationKind::Generate => {
            let prompt = prompt.ok_or_else(|| {
                PipelineError::InvalidRequest("generate needs a prompt or selected text".into())
            })?;
            (BackendKind::Writer, prompt.to_string())
        }
        OperationKind::Summarize => (BackendKind::Summarizer, text.to_string()),
        OperationKind::Longer => {
            options.length = Some(Length::Longer);
            (BackendKind::Rewriter, text.to_string())
        }
        OperationKind::Shorter => {
            options.length = Some(Length::Shorter);
            (BackendKind::Rewriter, text.to_string())
        }
        OperationKind::ToneFormal => {
            options.tone = Some(Tone::MoreFormal);
            (BackendKind::Rewriter, text.to_string())
        }
        OperationKind::ToneCasual => {
            options.tone = Some(Tone::MoreCasual);
            (BackendKind::Rewriter, text.to_string())
        }
        OperationKind::Improve | OperationKind::Fix => (BackendKind::Rewriter, text.to_string()),
        OperationKind::Translate => {
            let target = target_language
                .or(config.translate_to.as_deref())
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .ok_or_else(|| {
                    PipelineError::InvalidRequest("translate needs a target language".into())
                })?;
            options.shared_context = None;
            options.target_language = Some(target.to_string());
            (BackendKind::Translator, text.to_string())
        }
    };

    Ok(OperationPlan {
        kind,
        backend,
        options,
        input,
    })
}
