//! Athena Core - agent-language syntax, directive classification, the mind seam and errors

pub mod directive;
pub mod error;
pub mod mind;
pub mod syntax;
pub mod types;

pub use directive::{classify, filter_directive_lines, goal_command, is_directive_line, Directive};
pub use error::{Error, Result};
pub use mind::{AgentMind, InMemoryMind};
pub use syntax::{normalize_goal_marker, EventKind, Literal, Operator, PlanRule, Trigger};
pub use types::*;
