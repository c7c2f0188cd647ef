//! # Template Rendering
//!
//! The chart materializer never depends on a concrete template language: it hands each
//! template file to a [`Renderer`] together with the resolved values. [`TemplateEngine`]
//! is the default renderer and understands the subset of Go template syntax that test
//! charts use in practice:
//!
//! - field access: `{{ .Values.image.tag }}`, `{{ .Chart.Name }}`, `{{ .Chart.Version }}`
//! - literals: `"double"`, `` `raw` ``, numbers, `true`, `false`, `nil`
//! - whitespace trimming with `{{-` and `-}}`, comments with `{{/* ... */}}`
//! - pipelines and function calls: `quote`, `squote`, `upper`, `lower`, `trim`,
//!   `default`, `required`, `toYaml`, `toJson`, `indent`, `nindent`
//!
//! A value that does not exist renders as the empty string. Control structures
//! (`if`, `range`, ...) are rejected with an error instead of being silently ignored.

use crate::models::ChartMetadata;
use lazy_static::lazy_static;
use regex::Regex;
use serde_yaml::{Mapping, Number, Value};
use thiserror::Error;

lazy_static! {
    // Anything that starts like a number must parse as one.
    static ref NUMBER_RE: Regex = Regex::new(r"^-?[0-9]").unwrap();
    static ref FIELD_RE: Regex = Regex::new(r"^(\.[A-Za-z_][A-Za-z0-9_]*)+$|^\.$").unwrap();
    static ref IDENT_RE: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap();
}

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("line {line}: unclosed action, missing '}}}}'")]
    Unclosed { line: usize },
    #[error("line {line}: empty action")]
    EmptyAction { line: usize },
    #[error("line {line}: {reason}")]
    Syntax { line: usize, reason: String },
    #[error("line {line}: '{action}' is not supported by this renderer")]
    Unsupported { line: usize, action: String },
    #[error("line {line}: function '{name}' not defined")]
    UnknownFunction { line: usize, name: String },
    #[error("line {line}: error calling {name}: {reason}")]
    Function {
        line: usize,
        name: String,
        reason: String,
    },
    #[error(transparent)]
    External(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Everything a template can see.
#[derive(Debug, Clone, Copy)]
pub struct RenderContext<'a> {
    pub values: &'a Mapping,
    pub chart: &'a ChartMetadata,
}

/// Turns template text into rendered text. Implementations must be deterministic:
/// the same template and context always produce the same output.
pub trait Renderer {
    fn render(&self, template: &str, context: &RenderContext<'_>) -> Result<String, RenderError>;
}

/// Closures can stand in for a renderer, which keeps tests independent of any template language.
impl<F> Renderer for F
where
    F: Fn(&str, &RenderContext<'_>) -> Result<String, RenderError>,
{
    fn render(&self, template: &str, context: &RenderContext<'_>) -> Result<String, RenderError> {
        self(template, context)
    }
}

/// The built-in Go-template-style renderer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateEngine;

impl Renderer for TemplateEngine {
    fn render(&self, template: &str, context: &RenderContext<'_>) -> Result<String, RenderError> {
        let root = scope(context);
        render_text(template, &root)
    }
}

const CONTROL_KEYWORDS: &[&str] = &[
    "if", "else", "end", "range", "with", "define", "template", "include", "block", "break",
    "continue",
];

/// Builds the `.` object: `{ Values: ..., Chart: { Name, Version } }`.
fn scope(context: &RenderContext<'_>) -> Value {
    let mut chart = Mapping::new();
    chart.insert(Value::from("Name"), Value::from(context.chart.name.as_str()));
    chart.insert(
        Value::from("Version"),
        Value::from(context.chart.version.as_str()),
    );

    let mut root = Mapping::new();
    root.insert(Value::from("Values"), Value::Mapping(context.values.clone()));
    root.insert(Value::from("Chart"), Value::Mapping(chart));
    Value::Mapping(root)
}

fn line_of(template: &str, offset: usize) -> usize {
    template
        .get(..offset)
        .map_or(1, |before| before.matches('\n').count() + 1)
}

fn render_text(template: &str, root: &Value) -> Result<String, RenderError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find("{{") {
        let offset = template.len() - rest.len() + open;
        let line = line_of(template, offset);
        let (text, action) = rest.split_at(open);
        out.push_str(text);

        let inner = action.strip_prefix("{{").unwrap_or(action);
        let (trim_left, inner) = match inner.strip_prefix('-') {
            Some(r) if r.starts_with(char::is_whitespace) => (true, r),
            _ => (false, inner),
        };
        let close = find_close(inner).ok_or(RenderError::Unclosed { line })?;
        let (body, after) = inner.split_at(close);
        let after = after.strip_prefix("}}").unwrap_or(after);
        let (trim_right, body) = match body.strip_suffix('-') {
            Some(b) if b.ends_with(char::is_whitespace) => (true, b),
            _ => (false, body),
        };

        if trim_left {
            let kept = out.trim_end().len();
            out.truncate(kept);
        }
        out.push_str(&evaluate_action(body.trim(), root, line)?);
        rest = if trim_right { after.trim_start() } else { after };
    }

    out.push_str(rest);
    Ok(out)
}

/// Finds the `}}` closing an action, ignoring any inside string literals or comments.
fn find_close(inner: &str) -> Option<usize> {
    if inner.trim_start().starts_with("/*") {
        let end = inner.find("*/")? + 2;
        return inner.get(end..)?.find("}}").map(|i| i + end);
    }
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (i, c) in inner.char_indices() {
        match quote {
            Some('"') if escaped => escaped = false,
            Some('"') if c == '\\' => escaped = true,
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '"' || c == '`' => quote = Some(c),
            None if inner.get(i..).is_some_and(|t| t.starts_with("}}")) => return Some(i),
            None => {}
        }
    }
    None
}

// --- Expression evaluation ---

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Field(String),
    Str(String),
    Num(Value),
    Ident(String),
    Pipe,
}

fn tokenize(body: &str, line: usize) -> Result<Vec<Token>, RenderError> {
    let chars: Vec<char> = body.chars().collect();
    let mut tokens = Vec::new();
    let mut pos = 0;
    let syntax = |reason: String| RenderError::Syntax { line, reason };

    while let Some(&c) = chars.get(pos) {
        match c {
            c if c.is_whitespace() => pos += 1,
            '|' => {
                tokens.push(Token::Pipe);
                pos += 1;
            }
            '"' => {
                let mut text = String::new();
                pos += 1;
                loop {
                    match chars.get(pos) {
                        None => return Err(syntax("unterminated quoted string".into())),
                        Some('"') => break,
                        Some('\\') => {
                            let escaped = chars.get(pos + 1).copied();
                            text.push(match escaped {
                                Some('n') => '\n',
                                Some('t') => '\t',
                                Some(other) => other,
                                None => return Err(syntax("unterminated quoted string".into())),
                            });
                            pos += 2;
                        }
                        Some(&other) => {
                            text.push(other);
                            pos += 1;
                        }
                    }
                }
                tokens.push(Token::Str(text));
                pos += 1;
            }
            '`' => {
                let start = pos + 1;
                let end = (start..chars.len())
                    .find(|&i| chars.get(i) == Some(&'`'))
                    .ok_or_else(|| syntax("unterminated raw string".into()))?;
                tokens.push(Token::Str(chars.get(start..end).unwrap_or_default().iter().collect()));
                pos = end + 1;
            }
            '(' | ')' => {
                return Err(RenderError::Unsupported {
                    line,
                    action: "parenthesized expressions".into(),
                });
            }
            '$' => {
                return Err(RenderError::Unsupported {
                    line,
                    action: "variables".into(),
                });
            }
            _ => {
                let start = pos;
                while chars
                    .get(pos)
                    .is_some_and(|ch| !ch.is_whitespace() && *ch != '|')
                {
                    pos += 1;
                }
                let word: String = chars.get(start..pos).unwrap_or_default().iter().collect();
                tokens.push(classify(word, line)?);
            }
        }
    }
    Ok(tokens)
}

fn classify(word: String, line: usize) -> Result<Token, RenderError> {
    if FIELD_RE.is_match(&word) {
        return Ok(Token::Field(word));
    }
    if NUMBER_RE.is_match(&word) {
        if let Ok(n) = word.parse::<i64>() {
            return Ok(Token::Num(Value::Number(Number::from(n))));
        }
        if let Ok(f) = word.parse::<f64>() {
            return Ok(Token::Num(Value::Number(Number::from(f))));
        }
        return Err(RenderError::Syntax {
            line,
            reason: format!("bad number syntax: '{}'", word),
        });
    }
    if IDENT_RE.is_match(&word) {
        return Ok(Token::Ident(word));
    }
    Err(RenderError::Syntax {
        line,
        reason: format!("unexpected '{}' in action", word),
    })
}

fn evaluate_action(body: &str, root: &Value, line: usize) -> Result<String, RenderError> {
    if body.starts_with("/*") && body.ends_with("*/") {
        return Ok(String::new());
    }
    let tokens = tokenize(body, line)?;
    if tokens.is_empty() {
        return Err(RenderError::EmptyAction { line });
    }

    let mut value: Option<Value> = None;
    for stage in tokens.split(|t| *t == Token::Pipe) {
        let piped = value.take();
        value = Some(evaluate_stage(stage, piped, root, line)?);
    }
    Ok(to_text(&value.unwrap_or(Value::Null)))
}

fn evaluate_stage(
    stage: &[Token],
    piped: Option<Value>,
    root: &Value,
    line: usize,
) -> Result<Value, RenderError> {
    match stage.split_first() {
        None => Err(RenderError::Syntax {
            line,
            reason: "missing command in pipeline".into(),
        }),
        Some((Token::Ident(name), args)) if !is_literal(name) => {
            if CONTROL_KEYWORDS.contains(&name.as_str()) {
                return Err(RenderError::Unsupported {
                    line,
                    action: name.clone(),
                });
            }
            let mut values = args
                .iter()
                .map(|token| operand(token, root, line))
                .collect::<Result<Vec<_>, _>>()?;
            values.extend(piped);
            call(name, values, line)
        }
        Some((first, [])) if piped.is_none() => operand(first, root, line),
        Some(_) => Err(RenderError::Syntax {
            line,
            reason: "expected a function call after '|'".into(),
        }),
    }
}

fn is_literal(ident: &str) -> bool {
    matches!(ident, "true" | "false" | "nil")
}

fn operand(token: &Token, root: &Value, line: usize) -> Result<Value, RenderError> {
    match token {
        Token::Field(path) => Ok(lookup(root, path)),
        Token::Str(s) => Ok(Value::String(s.clone())),
        Token::Num(n) => Ok(n.clone()),
        Token::Ident(word) => match word.as_str() {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            "nil" => Ok(Value::Null),
            _ => Err(RenderError::Syntax {
                line,
                reason: format!("function '{}' used as an argument", word),
            }),
        },
        Token::Pipe => Err(RenderError::Syntax {
            line,
            reason: "unexpected '|'".into(),
        }),
    }
}

/// Resolves `.A.b.c` against the root; anything missing is `nil`.
fn lookup(root: &Value, path: &str) -> Value {
    let mut current = root;
    for segment in path.trim_start_matches('.').split('.').filter(|s| !s.is_empty()) {
        match current {
            Value::Mapping(map) => match map.get(segment) {
                Some(next) => current = next,
                None => return Value::Null,
            },
            _ => return Value::Null,
        }
    }
    current.clone()
}

fn call(name: &str, args: Vec<Value>, line: usize) -> Result<Value, RenderError> {
    let fail = |reason: String| RenderError::Function {
        line,
        name: name.to_string(),
        reason,
    };
    let single = |args: &[Value]| -> Result<String, RenderError> {
        match args {
            [value] => Ok(to_text(value)),
            _ => Err(fail(format!("expected 1 argument, got {}", args.len()))),
        }
    };

    let result = match name {
        "quote" => args
            .iter()
            .filter(|v| !v.is_null())
            .map(|v| format!("{:?}", to_text(v)))
            .collect::<Vec<_>>()
            .join(" "),
        "squote" => args
            .iter()
            .filter(|v| !v.is_null())
            .map(|v| format!("'{}'", to_text(v)))
            .collect::<Vec<_>>()
            .join(" "),
        "upper" => single(&args)?.to_uppercase(),
        "lower" => single(&args)?.to_lowercase(),
        "trim" => single(&args)?.trim().to_string(),
        "default" => {
            return match args.as_slice() {
                [fallback] => Ok(fallback.clone()),
                [fallback, given] if is_empty(given) => Ok(fallback.clone()),
                [_, given] => Ok(given.clone()),
                _ => Err(fail(format!("expected 1 or 2 arguments, got {}", args.len()))),
            };
        }
        "required" => {
            return match args.as_slice() {
                [message, given] if is_empty(given) => Err(fail(to_text(message))),
                [_, given] => Ok(given.clone()),
                _ => Err(fail(format!("expected 2 arguments, got {}", args.len()))),
            };
        }
        "toYaml" => match args.as_slice() {
            [value] => serde_yaml::to_string(value)
                .map(|s| s.trim_end_matches('\n').to_string())
                .map_err(|e| fail(e.to_string()))?,
            _ => return Err(fail(format!("expected 1 argument, got {}", args.len()))),
        },
        "toJson" => match args.as_slice() {
            [value] => serde_json::to_string(value).map_err(|e| fail(e.to_string()))?,
            _ => return Err(fail(format!("expected 1 argument, got {}", args.len()))),
        },
        "indent" | "nindent" => match args.as_slice() {
            [width, text] => {
                let width = width
                    .as_u64()
                    .and_then(|w| usize::try_from(w).ok())
                    .ok_or_else(|| fail("width must be a non-negative integer".into()))?;
                let pad = " ".repeat(width);
                let indented = format!("{}{}", pad, to_text(text).replace('\n', &format!("\n{}", pad)));
                if name == "nindent" {
                    format!("\n{}", indented)
                } else {
                    indented
                }
            }
            _ => return Err(fail(format!("expected 2 arguments, got {}", args.len()))),
        },
        _ => {
            return Err(RenderError::UnknownFunction {
                line,
                name: name.to_string(),
            });
        }
    };
    Ok(Value::String(result))
}

/// Go template truthiness, inverted.
fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Sequence(items) => items.is_empty(),
        Value::Mapping(map) => map.is_empty(),
        Value::Tagged(tagged) => is_empty(&tagged.value),
    }
}

/// Prints a value the way Go's `%v` would.
fn to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Sequence(items) => format!(
            "[{}]",
            items.iter().map(to_text).collect::<Vec<_>>().join(" ")
        ),
        Value::Mapping(map) => {
            let mut entries: Vec<(String, String)> = map
                .iter()
                .map(|(k, v)| (to_text(k), to_text(v)))
                .collect();
            entries.sort();
            let joined = entries
                .into_iter()
                .map(|(k, v)| format!("{}:{}", k, v))
                .collect::<Vec<_>>()
                .join(" ");
            format!("map[{}]", joined)
        }
        Value::Tagged(tagged) => to_text(&tagged.value),
    }
}
