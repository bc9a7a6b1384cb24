//! Variable-reference resolution against layered namespaces.

mod html_text;
mod path;
mod resolve;

pub use html_text::html_to_text;
pub use path::dotted_lookup;
pub use resolve::{
    flatten_chat_history, question_with_files, resolve_node_inputs, resolve_string, ResolveContext,
};
