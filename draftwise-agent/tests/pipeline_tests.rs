//! Pipeline runs against scripted backends.

use async_trait::async_trait;
use draftwise_agent::{
    Availability, BackendKind, Capabilities, CapabilityError, GenerationRequest, Outcome,
    Pipeline, PipelineError, PipelineState, Session, SessionOptions, TextStream,
};
use draftwise_core::{format, standard, Editor, FormatKind, Metadata, Selection};
use draftwise_types::OperationKind;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Notify;

type Chunk = Result<String, CapabilityError>;

/// Backends that replay a fixed script. With a gate set, the stream pauses
/// after its first chunk until the gate is notified.
#[derive(Default)]
struct Scripted {
    availability: HashMap<BackendKind, Availability>,
    chunks: Vec<Chunk>,
    gate: Option<Arc<Notify>>,
    detected: String,
    created: Mutex<Vec<(BackendKind, SessionOptions)>>,
}

impl Scripted {
    fn streaming(chunks: &[&str]) -> Self {
        Self {
            chunks: chunks.iter().map(|c| Ok(c.to_string())).collect(),
            ..Self::default()
        }
    }

    fn gated(mut self, gate: &Arc<Notify>) -> Self {
        self.gate = Some(gate.clone());
        self
    }

    fn created(&self) -> Vec<(BackendKind, SessionOptions)> {
        self.created.lock().clone()
    }
}

#[async_trait]
impl Capabilities for Scripted {
    async fn availability(&self, backend: BackendKind) -> Availability {
        self.availability
            .get(&backend)
            .copied()
            .unwrap_or(Availability::Readily)
    }

    async fn create(
        &self,
        backend: BackendKind,
        options: SessionOptions,
    ) -> Result<Box<dyn Session>, CapabilityError> {
        self.created.lock().push((backend, options));
        Ok(Box::new(ScriptedSession {
            backend,
            chunks: self.chunks.clone(),
            gate: self.gate.clone(),
            detected: self.detected.clone(),
        }))
    }
}

struct ScriptedSession {
    backend: BackendKind,
    chunks: Vec<Chunk>,
    gate: Option<Arc<Notify>>,
    detected: String,
}

#[async_trait]
impl Session for ScriptedSession {
    fn backend(&self) -> BackendKind {
        self.backend
    }

    async fn stream(&self, _input: &str) -> Result<TextStream, CapabilityError> {
        let chunks = self.chunks.clone();
        let gate = self.gate.clone();
        Ok(Box::pin(async_stream::stream! {
            for (i, chunk) in chunks.into_iter().enumerate() {
                if i == 1 {
                    if let Some(gate) = &gate {
                        gate.notified().await;
                    }
                }
                yield chunk;
            }
        }))
    }

    async fn detect_language(&self, _input: &str) -> Result<String, CapabilityError> {
        if self.backend != BackendKind::LanguageDetector {
            return Err(CapabilityError::Unsupported(self.backend, "language detection"));
        }
        Ok(self.detected.clone())
    }
}

fn editor_with(markdown: &str) -> Arc<Mutex<Editor>> {
    let (doc, _) = format::import(&standard(), FormatKind::Markdown, markdown.as_bytes()).unwrap();
    Arc::new(Mutex::new(Editor::new(doc)))
}

fn export(editor: &Editor, kind: FormatKind) -> String {
    String::from_utf8(editor.export(kind, &Metadata::default()).unwrap().bytes).unwrap()
}

fn placeholder_text(editor: &Editor) -> Option<String> {
    let id = editor.active_generation()?.id;
    let pos = editor.placeholder_pos(id)?;
    let node = editor.doc().node_at(pos).ok()??;
    node.attr_str("text").map(str::to_string)
}

async fn wait_for_streaming(pipeline: &Pipeline) {
    let mut states = pipeline.subscribe();
    states
        .wait_for(|state| *state == PipelineState::Streaming)
        .await
        .map(|_| ())
        .unwrap();
}

#[tokio::test]
async fn test_streamed_output_is_one_undo_step() {
    let editor = editor_with("before\n\ntarget text\n\nafter\n");
    editor.lock().set_selection(Selection::range(9, 20)).unwrap();
    let original = editor.lock().doc().clone();
    let depth = editor.lock().history().undo_depth();

    let scripted = Arc::new(Scripted::streaming(&["Hel", "Hello", "Hello world"]));
    let pipeline = Pipeline::new(editor.clone(), scripted.clone());
    let outcome = pipeline
        .run(GenerationRequest::new(OperationKind::Improve))
        .await
        .unwrap();

    assert!(matches!(outcome, Outcome::Completed { ref text, .. } if text == "Hello world"));
    assert_eq!(pipeline.state(), PipelineState::Idle);

    let mut editor = editor.lock();
    assert!(!editor.is_generating());
    editor.doc().validate().unwrap();
    assert_eq!(
        export(&editor, FormatKind::Markdown),
        "before\n\nHello world\n\nafter\n"
    );
    assert_eq!(editor.history().undo_depth(), depth + 1);

    assert!(editor.undo().unwrap());
    assert_eq!(editor.doc(), &original);
    assert_eq!(editor.selection(), Selection::range(9, 20));

    let created = scripted.created();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].0, BackendKind::Rewriter);
}

#[tokio::test]
async fn test_generate_from_prompt_inserts_markdown_structure() {
    let editor = editor_with("intro\n");
    editor.lock().set_selection(Selection::caret(6)).unwrap();
    let scripted = Arc::new(Scripted::streaming(&["# Ti", "# Title\n\nBody"]));
    let pipeline = Pipeline::new(editor.clone(), scripted.clone());

    pipeline
        .run(GenerationRequest::new(OperationKind::Generate).with_prompt("an essay"))
        .await
        .unwrap();

    let editor = editor.lock();
    editor.doc().validate().unwrap();
    let markdown = export(&editor, FormatKind::Markdown);
    assert!(markdown.starts_with("intro\n\n"), "{markdown}");
    assert!(markdown.contains("# Title\n\nBody"), "{markdown}");
    assert_eq!(scripted.created()[0].0, BackendKind::Writer);
}

#[tokio::test]
async fn test_generate_at_paragraph_start_inserts_before() {
    let editor = editor_with("intro\n");
    editor.lock().set_selection(Selection::caret(1)).unwrap();
    let scripted = Arc::new(Scripted::streaming(&["Bo", "Body"]));
    let pipeline = Pipeline::new(editor.clone(), scripted);

    pipeline
        .run(GenerationRequest::new(OperationKind::Generate).with_prompt("an opener"))
        .await
        .unwrap();

    let mut editor = editor.lock();
    editor.doc().validate().unwrap();
    assert_eq!(export(&editor, FormatKind::Markdown), "Body\n\nintro\n");
    assert!(editor.undo().unwrap());
    assert_eq!(export(&editor, FormatKind::Markdown), "intro\n");
}

#[tokio::test]
async fn test_rewrite_inside_sentence_keeps_one_paragraph() {
    let editor = editor_with("The quick brown fox jumps.\n");
    editor.lock().set_selection(Selection::range(5, 16)).unwrap();
    let original = editor.lock().doc().clone();
    let scripted = Arc::new(Scripted::streaming(&["slow", "slow red"]));
    let pipeline = Pipeline::new(editor.clone(), scripted);

    pipeline
        .run(GenerationRequest::new(OperationKind::Improve))
        .await
        .unwrap();

    let mut editor = editor.lock();
    editor.doc().validate().unwrap();
    assert_eq!(
        export(&editor, FormatKind::Markdown),
        "The slow red fox jumps.\n"
    );
    assert!(editor.undo().unwrap());
    assert_eq!(editor.doc(), &original);
    assert_eq!(editor.selection(), Selection::range(5, 16));
}

#[tokio::test]
async fn test_cancel_mid_stream_restores_document() {
    let editor = editor_with("one\n\ntwo\n");
    {
        let mut editor = editor.lock();
        let mut tr = editor.transaction();
        tr.insert_text(4, "!").unwrap();
        editor.dispatch(tr).unwrap();
        editor.set_selection(Selection::range(7, 10)).unwrap();
    }
    let before = editor.lock().doc().clone();
    let depth = editor.lock().history().undo_depth();

    let gate = Arc::new(Notify::new());
    let scripted = Arc::new(Scripted::streaming(&["Hel", "Hello"]).gated(&gate));
    let pipeline = Pipeline::new(editor.clone(), scripted);

    let (outcome, _) = tokio::join!(
        pipeline.run(GenerationRequest::new(OperationKind::Longer)),
        async {
            wait_for_streaming(&pipeline).await;
            assert_eq!(placeholder_text(&editor.lock()).as_deref(), Some("Hel"));
            assert!(pipeline.cancel());
        }
    );

    assert!(matches!(outcome, Ok(Outcome::Cancelled { .. })));
    assert_eq!(pipeline.state(), PipelineState::Idle);
    assert!(!pipeline.cancel());

    let mut editor = editor.lock();
    assert!(!editor.is_generating());
    assert_eq!(editor.doc(), &before);
    assert_eq!(editor.selection(), Selection::range(7, 10));
    assert_eq!(editor.history().undo_depth(), depth);

    // Undo reaches the edit made before the generation.
    assert!(editor.undo().unwrap());
    assert_eq!(export(&editor, FormatKind::Markdown), "one\n\ntwo\n");
}

#[tokio::test]
async fn test_concurrent_request_is_rejected() {
    let editor = editor_with("alpha\n\nbeta\n");
    editor.lock().set_selection(Selection::range(1, 6)).unwrap();
    let gate = Arc::new(Notify::new());
    let scripted = Arc::new(Scripted::streaming(&["A", "ALPHA"]).gated(&gate));
    let pipeline = Pipeline::new(editor.clone(), scripted);

    let (first, _) = tokio::join!(
        pipeline.run(GenerationRequest::new(OperationKind::Fix)),
        async {
            wait_for_streaming(&pipeline).await;
            let err = pipeline
                .run(GenerationRequest::new(OperationKind::Summarize))
                .await
                .unwrap_err();
            assert!(matches!(err, PipelineError::OperationInProgress(_)));
            assert_eq!(pipeline.state(), PipelineState::Streaming);
            gate.notify_one();
        }
    );

    assert!(matches!(first, Ok(Outcome::Completed { .. })));
    assert_eq!(
        export(&editor.lock(), FormatKind::Markdown),
        "ALPHA\n\nbeta\n"
    );
}

#[tokio::test]
async fn test_exports_mid_stream_exclude_placeholder() {
    let editor = editor_with("draft text\n");
    editor.lock().set_selection(Selection::range(1, 11)).unwrap();
    let gate = Arc::new(Notify::new());
    let scripted = Arc::new(Scripted::streaming(&["Zebra", "Zebra crossing"]).gated(&gate));
    let pipeline = Pipeline::new(editor.clone(), scripted);

    let (outcome, _) = tokio::join!(
        pipeline.run(GenerationRequest::new(OperationKind::Improve)),
        async {
            wait_for_streaming(&pipeline).await;
            {
                let editor = editor.lock();
                for kind in FormatKind::ALL {
                    let out = export(&editor, kind);
                    assert!(!out.contains("Zebra"), "{kind} leaked stream text: {out}");
                    assert!(!out.contains("aiGeneration"), "{kind} leaked placeholder");
                    assert!(!out.contains("ai-generation"), "{kind} leaked placeholder");
                }
            }
            gate.notify_one();
        }
    );

    assert!(outcome.is_ok());
    assert_eq!(
        export(&editor.lock(), FormatKind::Markdown),
        "Zebra crossing\n"
    );
}

#[tokio::test]
async fn test_unavailable_backend_leaves_document_unchanged() {
    let editor = editor_with("keep\n");
    let before = editor.lock().doc().clone();
    let mut scripted = Scripted::streaming(&["never"]);
    scripted
        .availability
        .insert(BackendKind::Writer, Availability::Missing);
    let pipeline = Pipeline::new(editor.clone(), Arc::new(scripted));

    let err = pipeline
        .run(GenerationRequest::new(OperationKind::Generate).with_prompt("x"))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "writer is not available");
    assert!(matches!(
        err,
        PipelineError::CapabilityUnavailable {
            backend: BackendKind::Writer,
            ..
        }
    ));

    let editor = editor.lock();
    assert_eq!(editor.doc(), &before);
    assert!(!editor.is_generating());
    assert!(!editor.can_undo());
    assert_eq!(pipeline.state(), PipelineState::Idle);
}

#[tokio::test]
async fn test_backend_switched_off_is_not_enabled() {
    let editor = editor_with("text\n");
    editor.lock().set_selection(Selection::range(1, 5)).unwrap();
    let mut scripted = Scripted::streaming(&["x"]);
    scripted
        .availability
        .insert(BackendKind::Summarizer, Availability::AfterDownload);
    let pipeline = Pipeline::new(editor, Arc::new(scripted));

    let err = pipeline
        .run(GenerationRequest::new(OperationKind::Summarize))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "summarizer is not properly enabled");
}

#[tokio::test]
async fn test_stream_failure_restores_document() {
    let editor = editor_with("first\n\nsecond\n");
    editor.lock().set_selection(Selection::range(8, 14)).unwrap();
    let before = editor.lock().doc().clone();
    let scripted = Scripted {
        chunks: vec![
            Ok("Par".into()),
            Err(CapabilityError::Failed("connection reset".into())),
        ],
        ..Scripted::default()
    };
    let pipeline = Pipeline::new(editor.clone(), Arc::new(scripted));

    let err = pipeline
        .run(GenerationRequest::new(OperationKind::Shorter))
        .await
        .unwrap_err();
    assert_eq!(err, PipelineError::StreamFailure("connection reset".into()));

    let editor = editor.lock();
    assert_eq!(editor.doc(), &before);
    assert_eq!(editor.selection(), Selection::range(8, 14));
    assert!(!editor.can_undo());
}

#[tokio::test]
async fn test_translate_detects_source_language_first() {
    let editor = editor_with("hola mundo\n");
    editor.lock().set_selection(Selection::range(1, 11)).unwrap();
    let scripted = Arc::new(Scripted {
        detected: "es".into(),
        ..Scripted::streaming(&["hello world"])
    });
    let pipeline = Pipeline::new(editor.clone(), scripted.clone());

    pipeline
        .run(GenerationRequest::new(OperationKind::Translate).with_target_language("en"))
        .await
        .unwrap();

    let created = scripted.created();
    assert_eq!(created.len(), 2);
    assert_eq!(created[0].0, BackendKind::LanguageDetector);
    assert_eq!(created[1].0, BackendKind::Translator);
    assert_eq!(created[1].1.source_language.as_deref(), Some("es"));
    assert_eq!(created[1].1.target_language.as_deref(), Some("en"));
    assert_eq!(
        export(&editor.lock(), FormatKind::Markdown),
        "hello world\n"
    );
}

#[tokio::test]
async fn test_operation_without_selection_is_rejected_up_front() {
    let editor = editor_with("text\n");
    let pipeline = Pipeline::new(editor.clone(), Arc::new(Scripted::streaming(&["x"])));
    let err = pipeline
        .run(GenerationRequest::new(OperationKind::Improve))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::InvalidRequest(_)));
    assert!(!editor.lock().is_generating());
}
