//! Working-directory context: "am I inside a fork, and where did it come from?"

mod detect;

pub use detect::{detect_context, origin_project, Context, ForkContext};
