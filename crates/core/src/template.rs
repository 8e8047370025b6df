//! Template resolution for login and search inputs.
//!
//! Definitions write request parameters as small templates, for example
//! `{{ .Query.Keywords }}` or `{{ range .Categories }}cat[]={{ . }}&{{ end }}`.
//! The supported language is a subset of Go's text/template: field access,
//! `range`, `if`/`else`, and `{{-`/`-}}` whitespace trimming. Every template is
//! evaluated against an explicit [`TemplateContext`] built by the operation
//! that needs it; referencing a field the context lacks is an error.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use thiserror::Error;

use crate::query::Query;

/// Errors that can occur while parsing or rendering a template.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Template {template:?}: {reason}")]
    Parse { template: String, reason: String },

    #[error("Template {template:?}: field {field} is not present in the context")]
    MissingField { template: String, field: String },

    #[error("Template {template:?}: cannot range over {field}")]
    NotIterable { template: String, field: String },
}

/// A value templates can read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateValue {
    Str(String),
    Int(i64),
    List(Vec<TemplateValue>),
    Map(BTreeMap<String, TemplateValue>),
}

impl TemplateValue {
    fn truthy(&self) -> bool {
        match self {
            TemplateValue::Str(s) => !s.is_empty(),
            TemplateValue::Int(n) => *n != 0,
            TemplateValue::List(items) => !items.is_empty(),
            TemplateValue::Map(map) => !map.is_empty(),
        }
    }
}

impl fmt::Display for TemplateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateValue::Str(s) => f.write_str(s),
            TemplateValue::Int(n) => write!(f, "{n}"),
            TemplateValue::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            TemplateValue::Map(map) => {
                f.write_str("map[")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{k}:{v}")?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<&str> for TemplateValue {
    fn from(s: &str) -> Self {
        TemplateValue::Str(s.to_string())
    }
}

impl From<String> for TemplateValue {
    fn from(s: String) -> Self {
        TemplateValue::Str(s)
    }
}

impl From<i64> for TemplateValue {
    fn from(n: i64) -> Self {
        TemplateValue::Int(n)
    }
}

impl From<&[i64]> for TemplateValue {
    fn from(items: &[i64]) -> Self {
        TemplateValue::List(items.iter().copied().map(TemplateValue::Int).collect())
    }
}

impl From<&Query> for TemplateValue {
    fn from(query: &Query) -> Self {
        let mut map = BTreeMap::new();
        map.insert("Type".to_string(), query.mode.as_str().into());
        map.insert("Q".to_string(), query.keywords.as_str().into());
        map.insert("Keywords".to_string(), query.keywords.as_str().into());
        map.insert("Categories".to_string(), query.categories.as_slice().into());
        if let Some(limit) = query.limit {
            map.insert("Limit".to_string(), TemplateValue::Int(limit as i64));
        }
        if let Some(offset) = query.offset {
            map.insert("Offset".to_string(), TemplateValue::Int(offset as i64));
        }
        if let Some(season) = &query.season {
            map.insert("Season".to_string(), season.as_str().into());
        }
        if let Some(episode) = &query.episode {
            map.insert("Ep".to_string(), episode.as_str().into());
        }
        if let Some(imdb_id) = &query.imdb_id {
            map.insert("ImdbID".to_string(), imdb_id.as_str().into());
        }
        TemplateValue::Map(map)
    }
}

/// The data a template is evaluated against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateContext {
    root: TemplateValue,
}

impl TemplateContext {
    pub fn new(root: BTreeMap<String, TemplateValue>) -> Self {
        Self {
            root: TemplateValue::Map(root),
        }
    }

    /// Context for search inputs: `.Query` and the site-local `.Categories`.
    pub fn search(query: &Query, local_categories: &[i64]) -> Self {
        let mut root = BTreeMap::new();
        root.insert("Query".to_string(), TemplateValue::from(query));
        root.insert("Categories".to_string(), local_categories.into());
        Self::new(root)
    }

    /// Context for login inputs: the site's configuration section as `.Config`.
    pub fn login(config: &HashMap<String, String>) -> Self {
        let section = config
            .iter()
            .map(|(k, v)| (k.clone(), TemplateValue::Str(v.clone())))
            .collect();
        let mut root = BTreeMap::new();
        root.insert("Config".to_string(), TemplateValue::Map(section));
        Self::new(root)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Node {
    Text(String),
    Field(Vec<String>),
    Range {
        path: Vec<String>,
        body: Vec<Node>,
        otherwise: Vec<Node>,
    },
    If {
        path: Vec<String>,
        then: Vec<Node>,
        otherwise: Vec<Node>,
    },
}

#[derive(Debug)]
enum BlockKind {
    Root,
    Range(Vec<String>),
    If(Vec<String>),
}

#[derive(Debug)]
struct Block {
    kind: BlockKind,
    body: Vec<Node>,
    otherwise: Option<Vec<Node>>,
}

impl Block {
    fn new(kind: BlockKind) -> Self {
        Self {
            kind,
            body: Vec::new(),
            otherwise: None,
        }
    }

    fn push(&mut self, node: Node) {
        match &mut self.otherwise {
            Some(nodes) => nodes.push(node),
            None => self.body.push(node),
        }
    }
}

fn path_label(path: &[String]) -> String {
    if path.is_empty() {
        ".".to_string()
    } else {
        path.iter().map(|p| format!(".{p}")).collect()
    }
}

/// A parsed template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    name: String,
    nodes: Vec<Node>,
}

impl Template {
    /// Parse `src`; `name` identifies the template in errors.
    pub fn parse(name: &str, src: &str) -> Result<Self, TemplateError> {
        let parse_err = |reason: String| TemplateError::Parse {
            template: name.to_string(),
            reason,
        };

        let mut stack = vec![Block::new(BlockKind::Root)];
        let mut rest = src;
        let mut trim_next = false;

        loop {
            let (text, after) = match rest.find("{{") {
                Some(start) => (&rest[..start], Some(&rest[start + 2..])),
                None => (rest, None),
            };

            let mut text = if trim_next { text.trim_start() } else { text };

            let Some(after) = after else {
                if !text.is_empty() {
                    current(&mut stack).push(Node::Text(text.to_string()));
                }
                break;
            };

            let end = after
                .find("}}")
                .ok_or_else(|| parse_err("unclosed action".to_string()))?;
            let mut action = &after[..end];
            rest = &after[end + 2..];

            if let Some(stripped) = action.strip_prefix('-') {
                if stripped.is_empty() || stripped.starts_with(char::is_whitespace) {
                    text = text.trim_end();
                    action = stripped;
                }
            }
            trim_next = false;
            if let Some(stripped) = action.strip_suffix('-') {
                if stripped.is_empty() || stripped.ends_with(char::is_whitespace) {
                    trim_next = true;
                    action = stripped;
                }
            }

            if !text.is_empty() {
                current(&mut stack).push(Node::Text(text.to_string()));
            }

            let action = action.trim();
            let mut words = action.split_whitespace();
            match words.next() {
                Some("range") => {
                    let path = parse_path(words.next(), action).map_err(parse_err)?;
                    stack.push(Block::new(BlockKind::Range(path)));
                }
                Some("if") => {
                    let path = parse_path(words.next(), action).map_err(parse_err)?;
                    stack.push(Block::new(BlockKind::If(path)));
                }
                Some("else") => {
                    let block = current(&mut stack);
                    if matches!(block.kind, BlockKind::Root) || block.otherwise.is_some() {
                        return Err(parse_err("unexpected {{else}}".to_string()));
                    }
                    block.otherwise = Some(Vec::new());
                }
                Some("end") => {
                    if stack.len() < 2 {
                        return Err(parse_err("unexpected {{end}}".to_string()));
                    }
                    let block = stack
                        .pop()
                        .ok_or_else(|| parse_err("unexpected {{end}}".to_string()))?;
                    let otherwise = block.otherwise.unwrap_or_default();
                    let node = match block.kind {
                        BlockKind::Range(path) => Node::Range {
                            path,
                            body: block.body,
                            otherwise,
                        },
                        BlockKind::If(path) => Node::If {
                            path,
                            then: block.body,
                            otherwise,
                        },
                        BlockKind::Root => {
                            return Err(parse_err("unexpected {{end}}".to_string()));
                        }
                    };
                    current(&mut stack).push(node);
                }
                Some(word) if word.starts_with('.') => {
                    if words.next().is_some() {
                        return Err(parse_err(format!("unsupported action {{{{{action}}}}}")));
                    }
                    let path = parse_path(Some(word), action).map_err(parse_err)?;
                    current(&mut stack).push(Node::Field(path));
                }
                _ => {
                    return Err(parse_err(format!("unsupported action {{{{{action}}}}}")));
                }
            }
        }

        if stack.len() != 1 {
            return Err(parse_err("missing {{end}}".to_string()));
        }

        let root = stack.pop().map(|b| b.body).unwrap_or_default();
        Ok(Self {
            name: name.to_string(),
            nodes: root,
        })
    }

    /// Render against `ctx`.
    pub fn render(&self, ctx: &TemplateContext) -> Result<String, TemplateError> {
        let mut out = String::new();
        self.render_nodes(&self.nodes, &ctx.root, &mut out)?;
        Ok(out)
    }

    fn render_nodes(
        &self,
        nodes: &[Node],
        dot: &TemplateValue,
        out: &mut String,
    ) -> Result<(), TemplateError> {
        for node in nodes {
            match node {
                Node::Text(text) => out.push_str(text),
                Node::Field(path) => {
                    let value = self.lookup(dot, path)?;
                    out.push_str(&value.to_string());
                }
                Node::Range {
                    path,
                    body,
                    otherwise,
                } => {
                    let items: Vec<&TemplateValue> = match self.lookup(dot, path)? {
                        TemplateValue::List(items) => items.iter().collect(),
                        TemplateValue::Map(map) => map.values().collect(),
                        _ => {
                            return Err(TemplateError::NotIterable {
                                template: self.name.clone(),
                                field: path_label(path),
                            });
                        }
                    };
                    if items.is_empty() {
                        self.render_nodes(otherwise, dot, out)?;
                    }
                    for item in items {
                        self.render_nodes(body, item, out)?;
                    }
                }
                Node::If {
                    path,
                    then,
                    otherwise,
                } => {
                    if self.lookup(dot, path)?.truthy() {
                        self.render_nodes(then, dot, out)?;
                    } else {
                        self.render_nodes(otherwise, dot, out)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn lookup<'v>(
        &self,
        dot: &'v TemplateValue,
        path: &[String],
    ) -> Result<&'v TemplateValue, TemplateError> {
        path.iter().try_fold(dot, |value, segment| match value {
            TemplateValue::Map(map) => map.get(segment).ok_or_else(|| TemplateError::MissingField {
                template: self.name.clone(),
                field: path_label(path),
            }),
            _ => Err(TemplateError::MissingField {
                template: self.name.clone(),
                field: path_label(path),
            }),
        })
    }
}

fn current(stack: &mut [Block]) -> &mut Block {
    // the root block is never popped
    let last = stack.len() - 1;
    &mut stack[last]
}

fn parse_path(word: Option<&str>, action: &str) -> Result<Vec<String>, String> {
    let word = word.ok_or_else(|| format!("missing field in {{{{{action}}}}}"))?;
    if word == "." {
        return Ok(Vec::new());
    }
    let rest = word
        .strip_prefix('.')
        .ok_or_else(|| format!("expected a field reference, found {word:?}"))?;
    let segments: Vec<String> = rest.split('.').map(str::to_string).collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(format!("malformed field reference {word:?}"));
    }
    Ok(segments)
}

/// Parse and render `src` in one step.
pub fn resolve(name: &str, src: &str, ctx: &TemplateContext) -> Result<String, TemplateError> {
    Template::parse(name, src)?.render(ctx)
}
