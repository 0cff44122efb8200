//! A small text template language.
//!
//! `{{ name }}` substitutes a value from the context, `{% for x in list %}`
//! ... `{% endfor %}` repeats its body for each list item, and `{# ... #}`
//! is a comment. A line holding nothing but a block tag produces no output.
//! Looking up a value that is not in the context is an error, and
//! `{{ missingvalue("message") }}` fails rendering with that message.

use serde_json::Value;

use crate::error::{Error, Result};
use crate::parse_file::parse_with;

pub mod parser;

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A dotted path into the context.
    Lookup(Vec<String>),
    /// `missingvalue("...")`: rendering fails with the message.
    Missing(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Text(String),
    Expr(Expr),
    Comment,
    For {
        var: String,
        list: Expr,
        body: Vec<Segment>,
    },
}

#[derive(Debug, Clone)]
pub struct Template {
    name: String,
    segments: Vec<Segment>,
}

/// Variables bound by enclosing loops, innermost last.
struct Scope<'a> {
    root: &'a Value,
    bound: Vec<(&'a str, &'a Value)>,
}

impl Template {
    pub fn parse(name: &str, source: &str) -> Result<Self> {
        let source = strip_block_lines(source);
        let segments = parse_with(&source, parser::template).map_err(|detail| {
            Error::TemplateSyntax {
                template: name.into(),
                detail,
            }
        })?;
        Ok(Self {
            name: name.into(),
            segments,
        })
    }

    /// Render against a context, normally a JSON object.
    pub fn render(&self, context: &Value) -> Result<String> {
        let mut scope = Scope {
            root: context,
            bound: Vec::new(),
        };
        let mut out = String::new();
        self.render_segments(&self.segments, &mut scope, &mut out)?;
        Ok(out)
    }

    fn render_segments<'a>(
        &self,
        segments: &'a [Segment],
        scope: &mut Scope<'a>,
        out: &mut String,
    ) -> Result<()> {
        for segment in segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Comment => (),
                Segment::Expr(expr) => display(self.eval(expr, scope)?, out),
                Segment::For { var, list, body } => {
                    let items = self.eval(list, scope)?;
                    let items = items.as_array().ok_or_else(|| Error::NotIterable {
                        template: self.name.clone(),
                        name: expr_name(list),
                    })?;
                    for item in items {
                        scope.bound.push((var.as_str(), item));
                        let rendered = self.render_segments(body, scope, out);
                        scope.bound.pop();
                        rendered?
                    }
                }
            }
        }
        Ok(())
    }

    fn eval<'a>(&self, expr: &Expr, scope: &Scope<'a>) -> Result<&'a Value> {
        let path = match expr {
            Expr::Lookup(path) => path,
            Expr::Missing(message) => {
                return Err(Error::Missing {
                    template: self.name.clone(),
                    message: message.clone(),
                })
            }
        };
        let undefined = || Error::Undefined {
            template: self.name.clone(),
            name: expr_name(expr),
        };
        let (head, tail) = path.split_first().ok_or_else(undefined)?;
        let start = scope
            .bound
            .iter()
            .rev()
            .find(|(var, _)| *var == head.as_str())
            .map(|(_, value)| *value)
            .or_else(|| scope.root.get(head))
            .ok_or_else(undefined)?;
        tail.iter()
            .try_fold(start, |value, key| value.get(key))
            .ok_or_else(undefined)
    }
}

fn expr_name(expr: &Expr) -> String {
    match expr {
        Expr::Lookup(path) => path.join("."),
        Expr::Missing(_) => "missingvalue".into(),
    }
}

fn display(value: &Value, out: &mut String) {
    match value {
        Value::Null => (),
        Value::String(s) => out.push_str(s),
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(' ')
                }
                display(item, out)
            }
        }
        other => out.push_str(&other.to_string()),
    }
}

/// Drop the indentation and line break around block tags and comments standing alone on a line.
fn strip_block_lines(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    for line in source.split_inclusive('\n') {
        let trimmed = line.trim();
        let standalone = [("{%", "%}"), ("{#", "#}")].iter().any(|&(open, close)| {
            trimmed.starts_with(open) && trimmed.ends_with(close) && !trimmed[2..].contains(open)
        });
        if standalone {
            out.push_str(trimmed)
        } else {
            out.push_str(line)
        }
    }
    out
}
