//! # draftwise-agent
//!
//! Drives AI generations against a draftwise [`Editor`](draftwise_core::Editor).
//!
//! A [`Pipeline`] takes an operation request, routes it to a backend through
//! a [`Capabilities`] provider, streams cumulative output into the editor's
//! placeholder and commits the final text as a single undoable edit.
//! Backends are supplied by the embedding application.

pub mod capability;
pub mod error;
pub mod operations;
pub mod pipeline;

pub use capability::{
    accumulate, Availability, BackendKind, Capabilities, Length, Session, SessionOptions,
    TextStream, Tone,
};
pub use error::{CapabilityError, PipelineError, Result};
pub use operations::{default_context, plan, OperationPlan};
pub use pipeline::{GenerationRequest, Outcome, Pipeline, PipelineState};
