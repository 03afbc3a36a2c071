//! Named, composable editing operations.
//!
//! A command reads an [`EditorState`] and either builds a transaction or
//! reports that it does not apply (`Ok(None)`). Commands never touch the
//! editor themselves, so the same logic serves both `Editor::run` and the
//! `Editor::can_apply` dry run.

mod blocks;
mod insert;
mod marks;

pub use blocks::{
    SetBlockType, ToggleBlockquote, ToggleBulletList, ToggleCodeBlock, ToggleHeading,
    ToggleOrderedList,
};
pub use insert::{
    Content, DeleteSelection, InsertContent, InsertContentAt, InsertHorizontalRule, InsertIframe,
    InsertImage, InsertMention, InsertText, InsertTweet, InsertYoutube, SelectAll,
};
pub use marks::{active_link, SetLink, SetMark, ToggleMark, UnsetLink, UnsetMark};

use crate::editor::EditorState;
use crate::error::Result;
use crate::transaction::Transaction;

pub trait Command {
    fn name(&self) -> &'static str;

    /// Build the transaction for this command, or `None` when it cannot
    /// apply to the state.
    fn build(&self, state: &EditorState) -> Result<Option<Transaction>>;
}

/// Run commands one after another as a single transaction. Each command
/// sees the state produced by the ones before it; if any of them does not
/// apply, neither does the chain.
pub struct Chain {
    commands: Vec<Box<dyn Command>>,
}

pub fn chain(commands: Vec<Box<dyn Command>>) -> Chain {
    Chain { commands }
}

impl Command for Chain {
    fn name(&self) -> &'static str {
        "chain"
    }

    fn build(&self, state: &EditorState) -> Result<Option<Transaction>> {
        let mut tr = state.tr();
        let mut current = state.clone();
        for command in &self.commands {
            let Some(step) = command.build(&current)? else {
                return Ok(None);
            };
            current = current.apply(&step.clone().commit()?);
            tr.append(step)?;
        }
        Ok(Some(tr))
    }
}

/// Use the first command that applies.
pub struct FirstOf {
    commands: Vec<Box<dyn Command>>,
}

pub fn first_of(commands: Vec<Box<dyn Command>>) -> FirstOf {
    FirstOf { commands }
}

impl Command for FirstOf {
    fn name(&self) -> &'static str {
        "firstOf"
    }

    fn build(&self, state: &EditorState) -> Result<Option<Transaction>> {
        for command in &self.commands {
            if let Some(tr) = command.build(state)? {
                return Ok(Some(tr));
            }
        }
        Ok(None)
    }
}
