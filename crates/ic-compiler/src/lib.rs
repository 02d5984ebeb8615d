//! Intercept Profile Compiler
//!
//! This crate compiles a profile into the native declarative rule set and
//! converts between the profile export formats.

pub mod compiler;
pub mod import;

pub use compiler::{compile, compile_with_stats, CompileStats, RuleIdAllocator};
pub use import::{export_profiles, parse_import, ImportError};
