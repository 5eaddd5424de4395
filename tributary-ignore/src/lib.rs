//! Gitignore-style path filtering shared by every content provider.
//!
//! Patterns are loaded into an [`IgnorePatternSet`] (comments and blank lines dropped), then
//! compiled once into an [`IgnoreMatcher`]. Matching is a pure function of the pattern list and
//! the path: the last pattern that matches decides, so a later `!negation` re-includes a path
//! that an earlier pattern excluded.

mod defaults;
mod matcher;
mod pattern;

pub use defaults::DEFAULT_PATTERNS;
pub use matcher::{IgnoreError, IgnoreMatcher, should_ignore};
pub use pattern::IgnorePatternSet;
