//! HTML codec.
//!
//! The serializer emits the same markup the editor's views render, so
//! exported HTML can be pasted back in. The parser accepts arbitrary
//! (including sloppy) HTML and keeps whatever maps onto the schema.

pub mod lexer;
mod parse;
mod serialize;

pub use parse::{parse, parse_fragment};
pub use serialize::{escape_text, serialize, serialize_block, serialize_inline};
