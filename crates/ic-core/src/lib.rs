//! Intercept Core Library
//!
//! This crate holds everything that must agree between the rule compiler, the
//! validator and the simulator: the profile data model, the native rule model,
//! the pattern classifier and the filter scoping rules.
//!
//! # Architecture
//!
//! A profile is a user-edited bundle of header overrides, redirects, blocks
//! and URL filters. The compiler (in `ic-compiler`) turns the active profile
//! into declarative native rules. The validator and simulator in this crate
//! reuse the same classifier and scope resolution so their answers never
//! drift from what the compiler emits.
//!
//! # Modules
//!
//! - `types`: Profiles, rule items and factories
//! - `rule`: Native declarative rule model (ids, priorities, conditions, actions)
//! - `pattern`: Literal-glob vs regex classification and pattern compilation
//! - `scope`: Active filter resolution shared by compiler and simulator
//! - `url`: Allocation-free URL helpers
//! - `validator`: Static profile checks
//! - `simulator`: Per-URL match preview

pub mod pattern;
pub mod rule;
pub mod scope;
pub mod simulator;
pub mod types;
pub mod url;
pub mod validator;

// Re-export commonly used types
pub use pattern::{classify, PatternKind};
pub use rule::{NativeRule, ResourceTypes, RuleAction, RuleCondition, RuleUpdate};
pub use scope::{resolve_scope, CompileOptions, DisabledFiltersPolicy, Scope};
pub use simulator::{simulate, SimulationReport};
pub use types::{Block, Filter, HeaderRule, Profile, ProfileSet, Redirect};
pub use validator::{validate, Issue, ValidationReport};
