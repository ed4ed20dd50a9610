//! Agent-language syntax: literals, triggers and plan rules
//!
//! Only the outer shape is parsed (functor, terms, annotations, plan
//! sections). Terms stay as source text, but their nesting is validated so a
//! malformed line never passes as a structured directive.

use crate::error::{Error, Result};
use crate::types::{EPHEMERAL_ANNOTATION, RATIONALE_ANNOTATION, SOURCE_ANNOTATION};
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

type Parse<T> = std::result::Result<T, String>;

// ---------------------------------------------------------------------------
// Scanning helpers
// ---------------------------------------------------------------------------

/// Byte offsets of every occurrence of `pat` at bracket depth zero, outside quotes.
fn find_top_level(s: &str, pat: &str) -> Parse<Vec<usize>> {
    let mut depth = 0i32;
    let mut in_quote = false;
    let mut escaped = false;
    let mut hits = Vec::new();

    for (i, c) in s.char_indices() {
        if in_quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_quote = false;
            }
            continue;
        }
        match c {
            '"' => in_quote = true,
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => {
                depth -= 1;
                if depth < 0 {
                    return Err(format!("unexpected '{}'", c));
                }
            }
            _ if depth == 0 && s[i..].starts_with(pat) => hits.push(i),
            _ => {}
        }
    }

    if in_quote {
        return Err("unterminated string".into());
    }
    if depth != 0 {
        return Err("unbalanced brackets".into());
    }
    Ok(hits)
}

fn split_top_level<'a>(s: &'a str, sep: &str) -> Parse<Vec<&'a str>> {
    let mut parts = Vec::new();
    let mut start = 0;
    for idx in find_top_level(s, sep)? {
        parts.push(&s[start..idx]);
        start = idx + sep.len();
    }
    parts.push(&s[start..]);
    Ok(parts)
}

/// `s` starts with an opening bracket; returns the byte index of its partner.
fn closing_index(s: &str) -> Parse<usize> {
    let mut depth = 0i32;
    let mut in_quote = false;
    let mut escaped = false;

    for (i, c) in s.char_indices() {
        if in_quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_quote = false;
            }
            continue;
        }
        match c {
            '"' => in_quote = true,
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(i);
                }
            }
            _ => {}
        }
    }
    Err("missing closing bracket".into())
}

/// Index of the first whitespace at depth zero (end of a plan label).
fn label_end(s: &str) -> Parse<usize> {
    let mut depth = 0i32;
    let mut in_quote = false;
    for (i, c) in s.char_indices() {
        match c {
            '"' => in_quote = !in_quote,
            _ if in_quote => {}
            '(' | '[' => depth += 1,
            ')' | ']' => depth -= 1,
            c if c.is_whitespace() && depth == 0 => return Ok(i),
            _ => {}
        }
    }
    Err("plan label without a plan".into())
}

/// Collapse whitespace runs outside quotes to a single space.
fn canonical(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_quote = false;
    let mut pending_space = false;
    for c in text.trim().chars() {
        if !in_quote && c.is_whitespace() {
            pending_space = true;
            continue;
        }
        if pending_space {
            out.push(' ');
            pending_space = false;
        }
        if c == '"' {
            in_quote = !in_quote;
        }
        out.push(c);
    }
    out
}

fn atom_len(s: &str) -> usize {
    match s.chars().next() {
        Some(c) if c.is_ascii_lowercase() => {}
        _ => return 0,
    }
    s.char_indices()
        .skip(1)
        .find(|(_, c)| !(c.is_ascii_alphanumeric() || *c == '_'))
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

fn is_variable(term: &str) -> bool {
    term.starts_with(|c: char| c.is_ascii_uppercase() || c == '_')
}

fn check_term(raw: &str) -> Parse<()> {
    let t = raw.trim();
    let first = t.chars().next().ok_or_else(|| "empty term".to_string())?;
    match first {
        '"' => {
            let mut escaped = false;
            for (i, c) in t.char_indices().skip(1) {
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == '"' {
                    return if i == t.len() - 1 {
                        Ok(())
                    } else {
                        Err(format!("unexpected text after string in '{}'", t))
                    };
                }
            }
            Err("unterminated string".into())
        }
        '[' => {
            let close = closing_index(t)?;
            if close != t.len() - 1 {
                return Err(format!("unexpected text after list in '{}'", t));
            }
            let inner = &t[1..close];
            if inner.trim().is_empty() {
                return Ok(());
            }
            for item in split_top_level(inner, ",")? {
                for part in split_top_level(item, "|")? {
                    check_term(part)?;
                }
            }
            Ok(())
        }
        c if c.is_ascii_digit() || (c == '-' && t.len() > 1) => t
            .parse::<f64>()
            .map(|_| ())
            .map_err(|_| format!("invalid number '{}'", t)),
        c if c.is_ascii_uppercase() || c == '_' => {
            if t.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                Ok(())
            } else {
                Err(format!("invalid variable '{}'", t))
            }
        }
        c if c.is_ascii_lowercase() || c == '~' => parse_literal(t).map(|_| ()),
        _ => Err(format!("unexpected term '{}'", t)),
    }
}

fn split_args(inner: &str) -> Parse<Vec<String>> {
    if inner.trim().is_empty() {
        return Ok(Vec::new());
    }
    split_top_level(inner, ",")?
        .into_iter()
        .map(|t| {
            check_term(t)?;
            Ok(canonical(t))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Literal
// ---------------------------------------------------------------------------

/// `[~]functor[(terms)][[annotations]]`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Literal {
    negated: bool,
    functor: String,
    terms: Vec<String>,
    annotations: Vec<String>,
}

fn parse_literal(src: &str) -> Parse<Literal> {
    let s = src.trim();
    let (negated, s) = match s.strip_prefix('~') {
        Some(rest) => (true, rest),
        None => (false, s),
    };

    let len = atom_len(s);
    if len == 0 {
        return Err(format!("expected a lowercase functor at '{}'", s));
    }
    let functor = s[..len].to_string();
    let mut rest = &s[len..];

    let mut terms = Vec::new();
    if rest.starts_with('(') {
        let close = closing_index(rest)?;
        terms = split_args(&rest[1..close])?;
        if terms.is_empty() {
            return Err("empty argument list".into());
        }
        rest = &rest[close + 1..];
    }

    let mut annotations = Vec::new();
    if rest.starts_with('[') {
        let close = closing_index(rest)?;
        annotations = split_args(&rest[1..close])?;
        rest = &rest[close + 1..];
    }

    if !rest.trim().is_empty() {
        return Err(format!("unexpected '{}'", rest.trim()));
    }

    Ok(Literal {
        negated,
        functor,
        terms,
        annotations,
    })
}

impl Literal {
    pub fn new(functor: impl Into<String>) -> Self {
        Self {
            negated: false,
            functor: functor.into(),
            terms: Vec::new(),
            annotations: Vec::new(),
        }
    }

    /// Parse a literal; a single trailing period is tolerated.
    pub fn parse(src: &str) -> Result<Self> {
        let trimmed = src.trim();
        let body = trimmed.strip_suffix('.').unwrap_or(trimmed);
        parse_literal(body).map_err(|reason| Error::malformed(trimmed, reason))
    }

    pub fn is_negated(&self) -> bool {
        self.negated
    }

    pub fn functor(&self) -> &str {
        &self.functor
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    pub fn arity(&self) -> usize {
        self.terms.len()
    }

    pub fn annotations(&self) -> &[String] {
        &self.annotations
    }

    pub fn has_annotation(&self, annotation: &str) -> bool {
        self.annotations.iter().any(|a| a == annotation)
    }

    /// Add an annotation unless it is already present.
    pub fn annotate(&mut self, annotation: &str) {
        if !self.has_annotation(annotation) {
            self.annotations.push(annotation.to_string());
        }
    }

    pub fn with_annotation(mut self, annotation: &str) -> Self {
        self.annotate(annotation);
        self
    }

    pub fn remove_annotation(&mut self, annotation: &str) -> bool {
        let before = self.annotations.len();
        self.annotations.retain(|a| a != annotation);
        self.annotations.len() != before
    }

    /// Mark as machine-inferred.
    pub fn annotate_provenance(&mut self) {
        self.annotate(SOURCE_ANNOTATION);
        self.annotate(RATIONALE_ANNOTATION);
    }

    /// Condition test: variables in `self` match any term, and every
    /// annotation of `self` must be present on `belief`.
    pub fn matches(&self, belief: &Literal) -> bool {
        self.negated == belief.negated
            && self.functor == belief.functor
            && self.terms.len() == belief.terms.len()
            && self
                .terms
                .iter()
                .zip(&belief.terms)
                .all(|(c, b)| is_variable(c) || c == b)
            && self
                .annotations
                .iter()
                .all(|a| belief.has_annotation(a))
    }
}

impl FromStr for Literal {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negated {
            write!(f, "~")?;
        }
        write!(f, "{}", self.functor)?;
        if !self.terms.is_empty() {
            write!(f, "({})", self.terms.join(","))?;
        }
        if !self.annotations.is_empty() {
            write!(f, "[{}]", self.annotations.join(","))?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Trigger
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Add,
    Remove,
}

impl Operator {
    pub fn symbol(self) -> char {
        match self {
            Operator::Add => '+',
            Operator::Remove => '-',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Belief,
    Goal,
}

/// `+lit`, `-lit`, `+!lit`, `-!lit`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Trigger {
    pub operator: Operator,
    pub kind: EventKind,
    pub literal: Literal,
}

/// `!goal` is not a trigger on its own; it means "add this goal".
pub fn normalize_goal_marker(line: &str) -> Cow<'_, str> {
    let trimmed = line.trim();
    if trimmed.starts_with('!') {
        Cow::Owned(format!("+{}", trimmed))
    } else {
        Cow::Borrowed(trimmed)
    }
}

fn parse_trigger(src: &str) -> Parse<Trigger> {
    let s = src.trim();
    let (operator, rest) = if let Some(rest) = s.strip_prefix('+') {
        (Operator::Add, rest)
    } else if let Some(rest) = s.strip_prefix('-') {
        (Operator::Remove, rest)
    } else {
        return Err("trigger must start with '+' or '-'".into());
    };
    let (kind, rest) = match rest.strip_prefix('!') {
        Some(rest) => (EventKind::Goal, rest),
        None => (EventKind::Belief, rest),
    };
    if rest.starts_with(char::is_whitespace) {
        return Err("whitespace after trigger operator".into());
    }

    let literal = parse_literal(rest)?;
    if kind == EventKind::Goal && literal.is_negated() {
        return Err("goals cannot be strongly negated".into());
    }
    Ok(Trigger {
        operator,
        kind,
        literal,
    })
}

impl Trigger {
    pub fn new(operator: Operator, kind: EventKind, literal: Literal) -> Self {
        Self {
            operator,
            kind,
            literal,
        }
    }

    pub fn add_goal(literal: Literal) -> Self {
        Self::new(Operator::Add, EventKind::Goal, literal)
    }

    pub fn add_belief(literal: Literal) -> Self {
        Self::new(Operator::Add, EventKind::Belief, literal)
    }

    /// Parse a trigger; a single trailing period is tolerated.
    pub fn parse(src: &str) -> Result<Self> {
        let trimmed = src.trim();
        let body = trimmed.strip_suffix('.').unwrap_or(trimmed);
        parse_trigger(body).map_err(|reason| Error::malformed(trimmed, reason))
    }
}

impl FromStr for Trigger {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.operator.symbol())?;
        if self.kind == EventKind::Goal {
            write!(f, "!")?;
        }
        write!(f, "{}", self.literal)
    }
}

// ---------------------------------------------------------------------------
// PlanRule
// ---------------------------------------------------------------------------

/// `[@label] trigger [: context] <- body.`
///
/// Context and body are stored in canonical form (whitespace collapsed
/// outside quotes, `true` meaning "no context" / "empty body"), so equality
/// on the struct is structural equality of the plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanRule {
    pub label: Option<Literal>,
    pub trigger: Trigger,
    pub context: Option<String>,
    pub body: Vec<String>,
}

fn parse_plan(src: &str) -> Parse<PlanRule> {
    let s = src.trim();
    let s = s.strip_suffix('.').unwrap_or(s).trim_end();

    let (label, rest) = match s.strip_prefix('@') {
        Some(after) => {
            let end = label_end(after)?;
            (Some(parse_literal(&after[..end])?), after[end..].trim_start())
        }
        None => (None, s),
    };

    let arrow = *find_top_level(rest, "<-")?
        .first()
        .ok_or_else(|| "missing '<-'".to_string())?;
    let head = rest[..arrow].trim();
    let body_src = rest[arrow + 2..].trim();

    let colon = find_top_level(head, ":")?
        .into_iter()
        .find(|&i| !head[i + 1..].starts_with('-'));
    let (trigger_src, context_src) = match colon {
        Some(i) => (head[..i].trim(), Some(head[i + 1..].trim())),
        None => (head, None),
    };

    let trigger = parse_trigger(&normalize_goal_marker(trigger_src))?;

    let context = match context_src {
        Some("") => return Err("empty plan context".into()),
        Some(c) => Some(canonical(c)).filter(|c| c != "true"),
        None => None,
    };

    let body = if body_src.is_empty() || body_src == "true" {
        Vec::new()
    } else {
        split_top_level(body_src, ";")?
            .into_iter()
            .map(|step| {
                let step = step.trim();
                if step.is_empty() {
                    Err("empty body step".to_string())
                } else {
                    Ok(canonical(step))
                }
            })
            .collect::<Parse<Vec<_>>>()?
    };

    Ok(PlanRule {
        label,
        trigger,
        context,
        body,
    })
}

impl PlanRule {
    pub fn parse(src: &str) -> Result<Self> {
        parse_plan(src).map_err(|reason| Error::malformed(src.trim(), reason))
    }

    pub fn label_name(&self) -> Option<&str> {
        self.label.as_ref().map(|l| l.functor())
    }

    pub fn is_ephemeral(&self) -> bool {
        self.label
            .as_ref()
            .is_some_and(|l| l.has_annotation(EPHEMERAL_ANNOTATION))
    }

    /// Same trigger, same context (absent on both or equal) and same body.
    pub fn is_equivalent(&self, other: &PlanRule) -> bool {
        self.trigger == other.trigger && self.context == other.context && self.body == other.body
    }
}

impl FromStr for PlanRule {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for PlanRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(label) = &self.label {
            write!(f, "@{} ", label)?;
        }
        write!(f, "{}", self.trigger)?;
        if let Some(context) = &self.context {
            write!(f, " : {}", context)?;
        }
        if self.body.is_empty() {
            write!(f, " <- true.")
        } else {
            write!(f, " <- {}.", self.body.join("; "))
        }
    }
}
