//! Steps, position maps and the helpers that turn edits into steps.

mod fit;
mod map;
mod mark;
mod step;

pub use fit::{fit_replacement, wrap_inline_runs, Fitted};
pub use map::{MapRange, MapResult, Mapping, StepMap};
pub use mark::{add_mark_steps, remove_mark_steps};
pub use step::Step;
