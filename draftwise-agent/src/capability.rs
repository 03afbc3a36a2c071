//! Generation backends as the pipeline sees them.
//!
//! A [`Capabilities`] provider reports which backends are usable and opens
//! [`Session`]s on them. Sessions stream *cumulative* text: every item is
//! the whole output so far, not a delta. Providers whose model emits
//! deltas can wrap their stream with [`accumulate`].

use crate::error::CapabilityError;
use async_trait::async_trait;
use draftwise_core::OutputFormat;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::pin::Pin;
use tokio_stream::StreamExt;

/// Stream of cumulative generated text.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, CapabilityError>> + Send>>;

/// The kinds of backend an operation can be routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BackendKind {
    Summarizer,
    Rewriter,
    Writer,
    LanguageDetector,
    Translator,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Summarizer => "summarizer",
            BackendKind::Rewriter => "rewriter",
            BackendKind::Writer => "writer",
            BackendKind::LanguageDetector => "languageDetector",
            BackendKind::Translator => "translator",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a provider reports for a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Availability {
    /// Usable right away.
    Readily,
    /// Present but needs a model download first.
    AfterDownload,
    /// Present but switched off.
    No,
    /// The provider has no such backend.
    Missing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Tone {
    MoreFormal,
    MoreCasual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Length {
    Shorter,
    Longer,
}

/// Options a session is created with.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionOptions {
    pub shared_context: Option<String>,
    pub format: OutputFormat,
    pub tone: Option<Tone>,
    pub length: Option<Length>,
    pub source_language: Option<String>,
    pub target_language: Option<String>,
}

#[async_trait]
pub trait Capabilities: Send + Sync {
    async fn availability(&self, backend: BackendKind) -> Availability;

    async fn create(
        &self,
        backend: BackendKind,
        options: SessionOptions,
    ) -> Result<Box<dyn Session>, CapabilityError>;
}

#[async_trait]
pub trait Session: Send + Sync {
    fn backend(&self) -> BackendKind;

    /// Start generating from `input`.
    async fn stream(&self, input: &str) -> Result<TextStream, CapabilityError>;

    /// Best guess at the language of `input`, as a BCP 47 tag.
    async fn detect_language(&self, _input: &str) -> Result<String, CapabilityError> {
        Err(CapabilityError::Unsupported(
            self.backend(),
            "language detection",
        ))
    }
}

/// Turn a stream of text deltas into a stream of cumulative text.
pub fn accumulate(deltas: TextStream) -> TextStream {
    Box::pin(async_stream::stream! {
        let mut deltas = deltas;
        let mut text = String::new();
        while let Some(delta) = deltas.next().await {
            match delta {
                Ok(delta) => {
                    text.push_str(&delta);
                    yield Ok(text.clone());
                }
                Err(err) => {
                    yield Err(err);
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_accumulate_concatenates_deltas() {
        let deltas: TextStream = Box::pin(tokio_stream::iter(vec![
            Ok("Hel".to_string()),
            Ok("lo".to_string()),
            Ok(" world".to_string()),
        ]));
        let chunks: Vec<_> = accumulate(deltas).collect().await;
        assert_eq!(
            chunks,
            vec![
                Ok("Hel".to_string()),
                Ok("Hello".to_string()),
                Ok("Hello world".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn test_accumulate_stops_after_error() {
        let deltas: TextStream = Box::pin(tokio_stream::iter(vec![
            Ok("a".to_string()),
            Err(CapabilityError::Failed("boom".into())),
            Ok("b".to_string()),
        ]));
        let chunks: Vec<_> = accumulate(deltas).collect().await;
        assert_eq!(chunks.len(), 2);
        assert!(chunks[1].is_err());
    }

    #[test]
    fn test_backend_names() {
        assert_eq!(BackendKind::LanguageDetector.to_string(), "languageDetector");
        assert_eq!(BackendKind::Summarizer.as_str(), "summarizer");
    }
}
