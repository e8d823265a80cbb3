//! Raw and resolved configuration
//!
//! A raw configuration is a flat map from key (`id`, `tags.Owner`, ...) to a
//! [`Template`]: a string with embedded `${...}` references. Interpolation
//! turns it into a [`ResolvedConfig`] of plain strings.
//!
//! Reference forms:
//! - `${var.NAME}` - a walk-wide variable
//! - `${self.KEY}` - another key of the same configuration
//! - `${NODE.KEY}` - a key of another, already evaluated node
//!
//! `$${` produces a literal `${`.

use crate::error::{InterpolationError, TemplateError};
use reconcile::AttributeSet;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, btree_map};
use std::fmt;
use std::sync::LazyLock;

static REFERENCE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\$\{|\$\{([^}]*)\}").unwrap());

static NODE_NAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_-]*$").unwrap());

// ============================================================================
// References and templates
// ============================================================================

/// A parsed `${...}` reference
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Reference {
    /// `var.NAME`
    Var(String),
    /// `self.KEY`
    SelfKey(String),
    /// `NODE.KEY`
    Node { name: String, key: String },
}

impl Reference {
    fn parse(expr: &str) -> Result<Self, String> {
        let expr = expr.trim();
        if expr.is_empty() {
            return Err("empty reference".to_string());
        }
        if expr.contains(['$', '{', '}']) {
            return Err(format!("reference {expr:?} contains a nested reference"));
        }

        let (head, rest) = expr
            .split_once('.')
            .ok_or_else(|| format!("reference {expr:?} has no attribute part"))?;

        if rest.is_empty() || rest.chars().any(char::is_whitespace) {
            return Err(format!("reference {expr:?} has an invalid attribute part"));
        }

        match head {
            "var" => Ok(Self::Var(rest.to_string())),
            "self" => Ok(Self::SelfKey(rest.to_string())),
            name if NODE_NAME_REGEX.is_match(name) => Ok(Self::Node {
                name: name.to_string(),
                key: rest.to_string(),
            }),
            name => Err(format!("invalid node name {name:?}")),
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Var(name) => write!(f, "var.{name}"),
            Self::SelfKey(key) => write!(f, "self.{key}"),
            Self::Node { name, key } => write!(f, "{name}.{key}"),
        }
    }
}

/// A piece of a template
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Ref(Reference),
}

/// A configuration string split into literal text and references
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

impl Template {
    /// Parse a configuration string
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let fail = |reason: String| TemplateError {
            template: source.to_string(),
            reason,
        };

        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut last = 0;

        for caps in REFERENCE_REGEX.captures_iter(source) {
            let Some(whole) = caps.get(0) else { continue };
            let between = &source[last..whole.start()];
            if between.contains("${") {
                return Err(fail("unterminated reference".to_string()));
            }
            literal.push_str(between);
            last = whole.end();

            match caps.get(1) {
                Some(expr) => {
                    let reference = Reference::parse(expr.as_str()).map_err(fail)?;
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Ref(reference));
                }
                // escaped `$${`
                None => literal.push_str("${"),
            }
        }

        let tail = &source[last..];
        if tail.contains("${") {
            return Err(fail("unterminated reference".to_string()));
        }
        literal.push_str(tail);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    /// A template that resolves to `text` verbatim
    pub fn literal(text: &str) -> Self {
        let segments = if text.is_empty() {
            Vec::new()
        } else {
            vec![Segment::Literal(text.to_string())]
        };
        Self {
            source: text.replace("${", "$${"),
            segments,
        }
    }

    /// The original string
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// References in order of appearance
    pub fn references(&self) -> impl Iterator<Item = &Reference> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Ref(reference) => Some(reference),
            Segment::Literal(_) => None,
        })
    }

    /// Whether the template contains no references
    pub fn is_literal(&self) -> bool {
        self.references().next().is_none()
    }
}

// ============================================================================
// RawConfig
// ============================================================================

/// Unresolved configuration of one node
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawConfig {
    fields: BTreeMap<String, Template>,
}

impl RawConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse every `(key, template)` entry
    pub fn parse<I, K, S>(entries: I) -> Result<Self, TemplateError>
    where
        I: IntoIterator<Item = (K, S)>,
        K: Into<String>,
        S: AsRef<str>,
    {
        let mut config = Self::new();
        for (key, source) in entries {
            config.insert(key, Template::parse(source.as_ref())?);
        }
        Ok(config)
    }

    pub fn insert(&mut self, key: impl Into<String>, template: Template) {
        self.fields.insert(key.into(), template);
    }

    pub fn get(&self, key: &str) -> Option<&Template> {
        self.fields.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, Template> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Names of other nodes this configuration references.
    ///
    /// References to `own_name` count as self references and are excluded.
    pub fn node_references(&self, own_name: &str) -> BTreeSet<String> {
        self.fields
            .values()
            .flat_map(Template::references)
            .filter_map(|reference| match reference {
                Reference::Node { name, .. } if name != own_name => Some(name.clone()),
                _ => None,
            })
            .collect()
    }
}

// ============================================================================
// ResolvedConfig
// ============================================================================

/// Fully materialized configuration of one node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResolvedConfig(BTreeMap<String, String>);

impl ResolvedConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Value of a key that must be present and non-empty
    pub fn require(&self, key: &str) -> Result<&str, InterpolationError> {
        self.get(key)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| InterpolationError::MissingKey {
                key: key.to_string(),
            })
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, String> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Project every `PREFIX.KEY` entry into an attribute set keyed by `KEY`
    pub fn section(&self, prefix: &str) -> AttributeSet {
        self.0
            .iter()
            .filter_map(|(key, value)| {
                key.strip_prefix(prefix)
                    .and_then(|rest| rest.strip_prefix('.'))
                    .filter(|rest| !rest.is_empty())
                    .map(|rest| (rest.to_string(), value.clone()))
            })
            .collect()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ResolvedConfig {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

// ============================================================================
// Resource
// ============================================================================

/// The node currently being acted upon
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    /// Node name in the graph
    pub name: String,
    /// Name of the provider managing it
    pub provider: String,
}

impl Resource {
    pub fn new(name: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            provider: provider.into(),
        }
    }
}
