//! The streaming generation pipeline.
//!
//! A run moves through `Requesting -> Streaming -> Finalizing` and back to
//! `Idle`. Failures and cancellations pass through `Failed` or `Cancelled`
//! and always put the document back the way it was. The editor lock is
//! only ever taken between awaits.

use crate::capability::{Availability, BackendKind, Capabilities, Session, SessionOptions};
use crate::error::{PipelineError, Result};
use crate::operations::{self, OperationPlan};
use draftwise_core::format::markdown;
use draftwise_core::{AiConfig, Editor, Fragment, OutputFormat, Schema};
use draftwise_types::{GenerationId, OperationKind};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Requesting,
    Streaming,
    Finalizing,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub kind: OperationKind,
    pub prompt: Option<String>,
    /// Only read by `translate`.
    pub target_language: Option<String>,
}

impl GenerationRequest {
    pub fn new(kind: OperationKind) -> Self {
        Self {
            kind,
            prompt: None,
            target_language: None,
        }
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    pub fn with_target_language(mut self, language: impl Into<String>) -> Self {
        self.target_language = Some(language.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The output replaced the selection as one undoable edit.
    Completed { id: GenerationId, text: String },
    /// Stopped by [`Pipeline::cancel`]; nothing changed.
    Cancelled { id: GenerationId },
}

pub struct Pipeline {
    editor: Arc<Mutex<Editor>>,
    capabilities: Arc<dyn Capabilities>,
    config: AiConfig,
    state: watch::Sender<PipelineState>,
    cancel: Mutex<Option<watch::Sender<bool>>>,
}

impl Pipeline {
    /// A pipeline using the editor's own AI configuration.
    pub fn new(editor: Arc<Mutex<Editor>>, capabilities: Arc<dyn Capabilities>) -> Self {
        let config = editor.lock().config().ai.clone();
        Self::with_config(editor, capabilities, config)
    }

    pub fn with_config(
        editor: Arc<Mutex<Editor>>,
        capabilities: Arc<dyn Capabilities>,
        config: AiConfig,
    ) -> Self {
        let (state, _) = watch::channel(PipelineState::Idle);
        Self {
            editor,
            capabilities,
            config,
            state,
            cancel: Mutex::new(None),
        }
    }

    pub fn editor(&self) -> &Arc<Mutex<Editor>> {
        &self.editor
    }

    pub fn state(&self) -> PipelineState {
        *self.state.borrow()
    }

    /// Watch state transitions.
    pub fn subscribe(&self) -> watch::Receiver<PipelineState> {
        self.state.subscribe()
    }

    /// Ask the running generation to stop. Returns false when nothing is
    /// running.
    pub fn cancel(&self) -> bool {
        match self.cancel.lock().as_ref() {
            Some(cancel) => {
                cancel.send_replace(true);
                info!("generation cancellation requested");
                true
            }
            None => false,
        }
    }

    /// Run one generation to completion, cancellation or failure.
    pub async fn run(&self, request: GenerationRequest) -> Result<Outcome> {
        let (id, plan) = {
            let mut editor = self.editor.lock();
            if let Some(active) = editor.active_generation() {
                return Err(PipelineError::OperationInProgress(active.id));
            }
            let selection = editor.selection();
            let text = editor.doc().text_between(selection.from(), selection.to())?;
            let plan = operations::plan(
                request.kind,
                &text,
                request.prompt.as_deref(),
                request.target_language.as_deref(),
                &self.config,
            )?;
            let snapshot = editor.begin_generation(request.kind, request.prompt.clone())?;
            (snapshot.id, plan)
        };

        let (cancel_tx, mut cancel_rx) = watch::channel(false);
        *self.cancel.lock() = Some(cancel_tx);
        self.set_state(PipelineState::Requesting);
        info!(generation = %id, kind = %plan.kind, backend = %plan.backend, "generation started");

        let result = self.drive(id, plan, &mut cancel_rx).await;
        *self.cancel.lock() = None;

        match result {
            Ok(Some(text)) => {
                info!(generation = %id, chars = text.len(), "generation completed");
                self.set_state(PipelineState::Idle);
                Ok(Outcome::Completed { id, text })
            }
            Ok(None) => {
                self.release(id);
                info!(generation = %id, "generation cancelled");
                self.set_state(PipelineState::Cancelled);
                self.set_state(PipelineState::Idle);
                Ok(Outcome::Cancelled { id })
            }
            Err(err) => {
                self.release(id);
                warn!(generation = %id, error = %err, "generation failed");
                self.set_state(PipelineState::Failed);
                self.set_state(PipelineState::Idle);
                Err(err)
            }
        }
    }

    /// `Ok(None)` means cancelled.
    async fn drive(
        &self,
        id: GenerationId,
        plan: OperationPlan,
        cancel: &mut watch::Receiver<bool>,
    ) -> Result<Option<String>> {
        let Some(opened) = until_cancelled(cancel, self.open(plan)).await else {
            return Ok(None);
        };
        let (session, input) = opened?;
        let Some(stream) = until_cancelled(cancel, session.stream(&input)).await else {
            return Ok(None);
        };
        let mut stream = stream?;

        let pos = self.editor.lock().install_placeholder(id)?;
        self.set_state(PipelineState::Streaming);
        debug!(generation = %id, pos, "streaming into placeholder");

        let mut text = String::new();
        loop {
            tokio::select! {
                biased;
                _ = cancelled(cancel) => return Ok(None),
                chunk = stream.next() => match chunk {
                    Some(Ok(chunk)) => {
                        self.editor.lock().update_placeholder(id, &chunk)?;
                        text = chunk;
                    }
                    Some(Err(err)) => return Err(PipelineError::StreamFailure(err.to_string())),
                    None => break,
                },
            }
        }

        self.set_state(PipelineState::Finalizing);
        let mut editor = self.editor.lock();
        let content = parse_output(editor.schema(), &text, self.config.output_format)?;
        editor.finalize_generation(id, content)?;
        Ok(Some(text))
    }

    /// Open the session the plan routes to, detecting the source language
    /// first for translations.
    async fn open(&self, mut plan: OperationPlan) -> Result<(Box<dyn Session>, String)> {
        if plan.needs_detection() {
            let detector = self
                .session(BackendKind::LanguageDetector, SessionOptions::default())
                .await?;
            let language = detector.detect_language(&plan.input).await?;
            debug!(language = %language, "source language detected");
            plan.options.source_language = Some(language);
        }
        let session = self.session(plan.backend, plan.options).await?;
        Ok((session, plan.input))
    }

    async fn session(
        &self,
        backend: BackendKind,
        options: SessionOptions,
    ) -> Result<Box<dyn Session>> {
        match self.capabilities.availability(backend).await {
            Availability::Readily => {}
            Availability::Missing => return Err(PipelineError::unavailable(backend)),
            Availability::AfterDownload | Availability::No => {
                return Err(PipelineError::not_enabled(backend))
            }
        }
        self.capabilities
            .create(backend, options)
            .await
            .map_err(|err| {
                warn!(backend = %backend, error = %err, "session creation failed");
                PipelineError::not_enabled(backend)
            })
    }

    fn release(&self, id: GenerationId) {
        let mut editor = self.editor.lock();
        if editor.active_generation().map(|g| g.id) != Some(id) {
            return;
        }
        if let Err(err) = editor.abort_generation(id) {
            warn!(generation = %id, error = %err, "failed to restore content");
        }
    }

    fn set_state(&self, state: PipelineState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!(from = ?previous, to = ?state, "pipeline state");
        }
    }
}

/// Resolves once cancellation has been requested.
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    while !*cancel.borrow_and_update() {
        if cancel.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

async fn until_cancelled<F: Future>(
    cancel: &mut watch::Receiver<bool>,
    fut: F,
) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = cancelled(cancel) => None,
        out = fut => Some(out),
    }
}

/// Convert the final generator output into block content.
fn parse_output(schema: &Schema, text: &str, format: OutputFormat) -> Result<Fragment> {
    match format {
        OutputFormat::Markdown => match markdown::parse_fragment(schema, text) {
            Ok(content) => Ok(content),
            Err(err) => {
                warn!(error = %err, "generated markdown did not parse; inserting as text");
                text_blocks(schema, text)
            }
        },
        OutputFormat::Text => text_blocks(schema, text),
    }
}

/// One paragraph per non-empty line.
fn text_blocks(schema: &Schema, text: &str) -> Result<Fragment> {
    let paragraph = schema.default_textblock()?.name().to_string();
    let blocks = text
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.is_empty())
        .map(|line| {
            let text = schema.text(line, vec![])?;
            schema.node_with_defaults(&paragraph, text)
        })
        .collect::<draftwise_core::Result<Vec<_>>>()?;
    Ok(Fragment::from_vec(blocks))
}
