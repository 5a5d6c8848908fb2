//! Prompt templates.
//!
//! A small Handlebars-flavoured language, just enough for prompt text:
//!
//! | Form | Meaning |
//! |------|---------|
//! | `{{field}}`, `{{{field}}}` | interpolate a field (raw; prompts are not HTML) |
//! | `{{#if field}}...{{/if}}` | emit the body only when the field is truthy |
//! | `{{#each field}}...{{/each}}` | emit the body once per array element |
//! | `{{this}}`, `{{this.sub}}` | the current element inside `#each` |
//! | `{{! comment }}` | dropped |
//!
//! Templates are compiled against the flow's input schema, so a reference to
//! a field that does not exist fails at start-up instead of at render time.
//! A block tag standing alone on its line removes that whole line, which
//! keeps `#each` output to exactly one line per element.

use serde_json::Value;
use thiserror::Error;

use crate::schema::{Kind, ObjectSchema};

/// Template compilation error
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("unterminated tag starting at byte {0}")]
    Unterminated(usize),

    #[error("empty tag at byte {0}")]
    EmptyTag(usize),

    #[error("unknown block helper `{0}`")]
    UnknownHelper(String),

    #[error("closing tag /{0} without a matching opening tag")]
    UnexpectedClose(String),

    #[error("block #{0} is never closed")]
    Unclosed(String),

    #[error("cannot resolve `{reference}`: {reason}")]
    Unresolved { reference: String, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockKind {
    If,
    Each,
}

impl BlockKind {
    fn as_str(&self) -> &'static str {
        match self {
            BlockKind::If => "if",
            BlockKind::Each => "each",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Text(String),
    Var(String),
    Open(BlockKind, String),
    Close(BlockKind),
    Comment,
}

impl Token {
    fn is_block(&self) -> bool {
        matches!(self, Token::Open(..) | Token::Close(_) | Token::Comment)
    }
}

/// Where a reference starts.
#[derive(Debug, Clone, PartialEq)]
enum Base {
    Root,
    This,
}

/// A resolved field reference.
#[derive(Debug, Clone, PartialEq)]
struct Ref {
    base: Base,
    segments: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Text(String),
    Var(Ref),
    If(Ref, Vec<Node>),
    Each(Ref, Vec<Node>),
}

/// A compiled prompt template.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    nodes: Vec<Node>,
}

impl Template {
    /// Compile `text`, resolving every reference against `input`.
    pub fn compile(text: &str, input: &ObjectSchema) -> Result<Self, TemplateError> {
        let mut tokens = tokenize(text)?;
        strip_standalone_lines(&mut tokens);
        let root = Kind::Object(input.clone());
        let mut iter = tokens.into_iter();
        let nodes = parse_block(&mut iter, None, &root, None)?;
        Ok(Self { nodes })
    }

    /// Render against a value that satisfies the input schema.
    pub fn render(&self, input: &Value) -> String {
        let mut out = String::new();
        render_nodes(&self.nodes, input, None, &mut out);
        out
    }
}

fn tokenize(text: &str) -> Result<Vec<Token>, TemplateError> {
    let mut tokens = Vec::new();
    let mut rest = text;
    let mut offset = 0;

    while let Some(start) = rest.find("{{") {
        if start > 0 {
            tokens.push(Token::Text(rest[..start].to_string()));
        }
        let triple = rest[start..].starts_with("{{{");
        let (open_len, close) = if triple { (3, "}}}") } else { (2, "}}") };
        let after_open = &rest[start + open_len..];
        let end = after_open
            .find(close)
            .ok_or(TemplateError::Unterminated(offset + start))?;
        let inner = after_open[..end].trim();
        if inner.is_empty() {
            return Err(TemplateError::EmptyTag(offset + start));
        }

        tokens.push(classify_tag(inner, triple)?);

        let consumed = start + open_len + end + close.len();
        offset += consumed;
        rest = &rest[consumed..];
    }

    if !rest.is_empty() {
        tokens.push(Token::Text(rest.to_string()));
    }
    Ok(tokens)
}

fn classify_tag(inner: &str, triple: bool) -> Result<Token, TemplateError> {
    if triple {
        return Ok(Token::Var(inner.to_string()));
    }
    if inner.starts_with('!') {
        return Ok(Token::Comment);
    }
    if let Some(helper) = inner.strip_prefix('#') {
        let mut parts = helper.splitn(2, char::is_whitespace);
        let name = parts.next().unwrap_or_default();
        let arg = parts.next().map(str::trim).unwrap_or_default();
        let kind = match name {
            "if" => BlockKind::If,
            "each" => BlockKind::Each,
            other => return Err(TemplateError::UnknownHelper(other.to_string())),
        };
        if arg.is_empty() {
            return Err(TemplateError::Unresolved {
                reference: format!("#{}", name),
                reason: "block helper needs a field".to_string(),
            });
        }
        return Ok(Token::Open(kind, arg.to_string()));
    }
    if let Some(name) = inner.strip_prefix('/') {
        return match name.trim() {
            "if" => Ok(Token::Close(BlockKind::If)),
            "each" => Ok(Token::Close(BlockKind::Each)),
            other => Err(TemplateError::UnknownHelper(other.to_string())),
        };
    }
    Ok(Token::Var(inner.to_string()))
}

/// Remove the line of every block tag that is alone on its line.
///
/// Decisions are taken on the untouched token list first, then applied, so a
/// text token shared by two standalone tags is trimmed on both ends.
fn strip_standalone_lines(tokens: &mut [Token]) {
    let len = tokens.len();
    let mut trim_leading = vec![false; len];
    let mut trim_trailing = vec![false; len];

    for i in 0..len {
        if !tokens[i].is_block() {
            continue;
        }

        let prev_ok = match i.checked_sub(1).map(|p| &tokens[p]) {
            None => true,
            Some(Token::Text(t)) => {
                let tail = t.rsplit('\n').next().unwrap_or_default();
                tail.chars().all(|c| c == ' ' || c == '\t') && (t.contains('\n') || i == 1)
            }
            Some(_) => false,
        };
        let next_ok = match tokens.get(i + 1) {
            None => true,
            Some(Token::Text(t)) => {
                let head = t.split('\n').next().unwrap_or_default();
                head.chars().all(char::is_whitespace) && (t.contains('\n') || i + 2 == len)
            }
            Some(_) => false,
        };

        if prev_ok && next_ok {
            if i > 0 {
                trim_trailing[i - 1] = true;
            }
            if i + 1 < len {
                trim_leading[i + 1] = true;
            }
        }
    }

    for (i, token) in tokens.iter_mut().enumerate() {
        if let Token::Text(text) = token {
            let mut s = text.as_str();
            if trim_leading[i] {
                s = s.find('\n').map(|pos| &s[pos + 1..]).unwrap_or("");
            }
            if trim_trailing[i] {
                s = s.trim_end_matches([' ', '\t']);
            }
            *text = s.to_string();
        }
    }
}

fn parse_block(
    tokens: &mut std::vec::IntoIter<Token>,
    open: Option<BlockKind>,
    root: &Kind,
    this: Option<&Kind>,
) -> Result<Vec<Node>, TemplateError> {
    let mut nodes = Vec::new();

    while let Some(token) = tokens.next() {
        match token {
            Token::Text(text) => {
                if !text.is_empty() {
                    nodes.push(Node::Text(text));
                }
            }
            Token::Comment => {}
            Token::Var(reference) => {
                let (r, _) = resolve(&reference, root, this)?;
                nodes.push(Node::Var(r));
            }
            Token::Open(BlockKind::If, reference) => {
                let (r, _) = resolve(&reference, root, this)?;
                let body = parse_block(tokens, Some(BlockKind::If), root, this)?;
                nodes.push(Node::If(r, body));
            }
            Token::Open(BlockKind::Each, reference) => {
                let (r, kind) = resolve(&reference, root, this)?;
                let Kind::Array(item) = kind else {
                    return Err(TemplateError::Unresolved {
                        reference,
                        reason: format!("#each needs an array, found {}", kind.type_name()),
                    });
                };
                let body = parse_block(tokens, Some(BlockKind::Each), root, Some(item.as_ref()))?;
                nodes.push(Node::Each(r, body));
            }
            Token::Close(kind) => {
                return if open == Some(kind) {
                    Ok(nodes)
                } else {
                    Err(TemplateError::UnexpectedClose(kind.as_str().to_string()))
                };
            }
        }
    }

    match open {
        Some(kind) => Err(TemplateError::Unclosed(kind.as_str().to_string())),
        None => Ok(nodes),
    }
}

/// Resolve a dotted reference to its base, path and declared kind.
fn resolve<'k>(
    reference: &str,
    root: &'k Kind,
    this: Option<&'k Kind>,
) -> Result<(Ref, &'k Kind), TemplateError> {
    let unresolved = |reason: String| TemplateError::Unresolved {
        reference: reference.to_string(),
        reason,
    };

    let mut segments: Vec<&str> = reference.split('.').collect();
    let (base, mut kind) = if segments.first() == Some(&"this") {
        segments.remove(0);
        let kind = this.ok_or_else(|| unresolved("`this` is only valid inside #each".to_string()))?;
        (Base::This, kind)
    } else if let Some(element) = this {
        // Bare names inside #each refer to fields of the current element.
        (Base::This, element)
    } else {
        (Base::Root, root)
    };

    for segment in &segments {
        if segment.is_empty() {
            return Err(unresolved("empty path segment".to_string()));
        }
        let Kind::Object(object) = kind else {
            return Err(unresolved(format!(
                "`{}` is looked up on a {}",
                segment,
                kind.type_name()
            )));
        };
        let field = object
            .field(segment)
            .ok_or_else(|| unresolved(format!("no field named `{}`", segment)))?;
        kind = &field.kind;
    }

    Ok((
        Ref {
            base,
            segments: segments.into_iter().map(ToString::to_string).collect(),
        },
        kind,
    ))
}

fn lookup<'v>(r: &Ref, root: &'v Value, this: Option<&'v Value>) -> Option<&'v Value> {
    let mut value = match r.base {
        Base::Root => root,
        Base::This => this?,
    };
    for segment in &r.segments {
        value = value.get(segment)?;
    }
    Some(value)
}

fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::Object(_)) => true,
    }
}

fn render_nodes(nodes: &[Node], root: &Value, this: Option<&Value>, out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Var(r) => match lookup(r, root, this) {
                None | Some(Value::Null) => {}
                Some(Value::String(s)) => out.push_str(s),
                Some(other) => out.push_str(&other.to_string()),
            },
            Node::If(r, body) => {
                if is_truthy(lookup(r, root, this)) {
                    render_nodes(body, root, this, out);
                }
            }
            Node::Each(r, body) => {
                if let Some(Value::Array(items)) = lookup(r, root, this) {
                    for item in items {
                        render_nodes(body, root, Some(item), out);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldSchema;
    use serde_json::json;

    fn milestones_schema() -> ObjectSchema {
        ObjectSchema::closed(vec![
            FieldSchema::string("title", ""),
            FieldSchema::string("description", "").optional(),
        ])
    }

    #[test]
    fn test_interpolation_forms() {
        let t = Template::compile("A {{title}} B {{{title}}}", &milestones_schema()).unwrap();
        assert_eq!(t.render(&json!({"title": "x<y"})), "A x<y B x<y");
    }

    #[test]
    fn test_if_block_inline() {
        let t = Template::compile(
            "Title: {{title}}\n{{#if description}}Description: {{description}}{{/if}}\nEnd",
            &milestones_schema(),
        )
        .unwrap();
        assert_eq!(t.render(&json!({"title": "a"})), "Title: a\n\nEnd");
        assert_eq!(
            t.render(&json!({"title": "a", "description": "b"})),
            "Title: a\nDescription: b\nEnd"
        );
        assert_eq!(t.render(&json!({"title": "a", "description": ""})), "Title: a\n\nEnd");
    }

    #[test]
    fn test_each_standalone_lines() {
        let schema = ObjectSchema::closed(vec![FieldSchema::new(
            "items",
            Kind::array(Kind::string()),
            "",
        )]);
        let t = Template::compile("List:\n  {{#each items}}\n  - {{this}}\n  {{/each}}\nDone", &schema)
            .unwrap();
        assert_eq!(t.render(&json!({"items": ["a", "b"]})), "List:\n  - a\n  - b\nDone");
        assert_eq!(t.render(&json!({"items": []})), "List:\nDone");
    }

    #[test]
    fn test_each_over_objects() {
        let schema = ObjectSchema::closed(vec![FieldSchema::new(
            "tasks",
            Kind::array(Kind::object(ObjectSchema::closed(vec![
                FieldSchema::string("title", ""),
                FieldSchema::string("deadline", "").optional(),
            ]))),
            "",
        )]);
        let t = Template::compile(
            "{{#each tasks}}\n- {{this.title}} ({{deadline}})\n{{/each}}\n",
            &schema,
        )
        .unwrap();
        let out = t.render(&json!({"tasks": [{"title": "a", "deadline": "mon"}, {"title": "b"}]}));
        assert_eq!(out, "- a (mon)\n- b ()\n");
    }

    #[test]
    fn test_unknown_field_fails_at_compile_time() {
        let err = Template::compile("{{missing}}", &milestones_schema()).unwrap_err();
        assert!(matches!(err, TemplateError::Unresolved { .. }));

        let err = Template::compile("{{this}}", &milestones_schema()).unwrap_err();
        assert!(matches!(err, TemplateError::Unresolved { .. }));

        let err = Template::compile("{{#each title}}x{{/each}}", &milestones_schema()).unwrap_err();
        assert!(matches!(err, TemplateError::Unresolved { .. }));
    }

    #[test]
    fn test_structural_errors() {
        let schema = milestones_schema();
        assert_eq!(
            Template::compile("{{title", &schema).unwrap_err(),
            TemplateError::Unterminated(0)
        );
        assert_eq!(
            Template::compile("{{#if title}}x", &schema).unwrap_err(),
            TemplateError::Unclosed("if".to_string())
        );
        assert_eq!(
            Template::compile("x{{/each}}", &schema).unwrap_err(),
            TemplateError::UnexpectedClose("each".to_string())
        );
        assert_eq!(
            Template::compile("{{#unless title}}x{{/unless}}", &schema).unwrap_err(),
            TemplateError::UnknownHelper("unless".to_string())
        );
    }

    #[test]
    fn test_comments_are_dropped() {
        let t = Template::compile("a{{! note }}b", &milestones_schema()).unwrap();
        assert_eq!(t.render(&json!({"title": "t"})), "ab");
    }
}
