//! The `render` module turns the rolling buffer into bordered, word-wrapped
//! text.
//!
//! Two variants share one layout: a plain rendering for the console and a
//! bold-author rendering for subscribers. Both wrap identically, so the
//! bold variant differs from the plain one only by the `<b>`/`</b>` markers.

pub mod renderer;
pub mod wrap;

pub use renderer::Renderer;
pub use wrap::wrap_text;
