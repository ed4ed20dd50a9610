//! Directive classification and the line-shape filter
//!
//! Every non-empty line of model output becomes exactly one [`Directive`].
//! Matchers are tried in a fixed order; the first one that recognizes the
//! line wins and the raw line is the fallback.

use crate::syntax::{normalize_goal_marker, PlanRule, Trigger};
use regex::Regex;
use std::sync::OnceLock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// A reusable rule, installed into the plan library.
    PlanRule(PlanRule),
    /// A one-shot belief or goal change.
    Event(Trigger),
    /// Unrecognized line, kept verbatim.
    BareBelief { literal: String },
}

type Matcher = fn(&str) -> Option<Directive>;

const MATCHERS: [Matcher; 3] = [match_plan_rule, match_event, match_implicit_goal];

/// Classify one line. Total: never fails, never panics.
pub fn classify(line: &str) -> Directive {
    let line = line.trim();
    MATCHERS
        .iter()
        .find_map(|matcher| matcher(line))
        .unwrap_or_else(|| Directive::BareBelief {
            literal: line.to_string(),
        })
}

fn match_plan_rule(line: &str) -> Option<Directive> {
    if !line.contains("<-") {
        return None;
    }
    PlanRule::parse(line).ok().map(Directive::PlanRule)
}

fn match_event(line: &str) -> Option<Directive> {
    if !line.starts_with(['+', '-', '!']) {
        return None;
    }
    let mut trigger = Trigger::parse(&normalize_goal_marker(line)).ok()?;
    trigger.literal.annotate_provenance();
    Some(Directive::Event(trigger))
}

/// Command lines default to goals to pursue.
fn match_implicit_goal(line: &str) -> Option<Directive> {
    let mut trigger = Trigger::parse(&format!("+!{}", line)).ok()?;
    trigger.literal.annotate_provenance();
    Some(Directive::Event(trigger))
}

/// Turn a configured goal into an add-goal command: `x`, `!x` and `+!x` all
/// become `+!x`.
pub fn goal_command(goal: &str) -> String {
    let goal = goal.trim();
    if goal.starts_with("+!") {
        goal.to_string()
    } else if let Some(rest) = goal.strip_prefix('!') {
        format!("+!{}", rest)
    } else {
        format!("+!{}", goal)
    }
}

fn directive_shape() -> Option<&'static Regex> {
    static SHAPE: OnceLock<Option<Regex>> = OnceLock::new();
    SHAPE
        .get_or_init(|| Regex::new(r"^\s*([-+!]+|[a-z_])\w*.*$").ok())
        .as_ref()
}

/// Whether a line looks like agent code rather than prose or markdown.
pub fn is_directive_line(line: &str) -> bool {
    directive_shape()
        .map(|re| re.is_match(line))
        .unwrap_or(false)
}

/// Trim each line and keep only directive-shaped ones, newline-joined.
pub fn filter_directive_lines<I, S>(lines: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    lines
        .into_iter()
        .filter_map(|l| {
            let line = l.as_ref().trim();
            is_directive_line(line).then(|| line.to_string())
        })
        .collect::<Vec<_>>()
        .join("\n")
}
