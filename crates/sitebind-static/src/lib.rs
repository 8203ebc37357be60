//! Site assembler for sitebind.
//!
//! Merges every page of a source tree into the `template.html` beside it,
//! together with a shared language menu, and writes the result to a mirrored
//! output tree. Directories named `root` are flattened into their parent.

pub mod assets;
pub mod builder;
pub mod discover;
pub mod flatten;

pub use builder::{BuildConfig, BuildError, BuildResult, StaticBuilder};
pub use discover::{AssetInfo, PageInfo, SitePlan};
