use std::fmt::Display;

use serde::Serialize;

use crate::sources::DeviceNode;

pub mod parser;
pub mod tree;

pub use tree::DeviceTree;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Symbol(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Address(pub u64);

/// A node name with optional unit address, a label reference or a path reference.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum NodeName {
    Symbol(Symbol, Option<Symbol>),
    Reference(Symbol),
    /// `&{/soc/serial@10013000}`
    PathReference(String),
}

impl NodeName {
    pub fn root() -> Self {
        NodeName::Symbol(Symbol("".into()), None)
    }

    pub fn is_root(&self) -> bool {
        matches!(self, NodeName::Symbol(Symbol(s), None) if s.is_empty())
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, NodeName::Reference(_) | NodeName::PathReference(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Value {
    Symbol(Symbol),
    Reference(Symbol),
    PathReference(String),
    Address(Address),
    Text(String),
    Array(Vec<Value>),
    Bytes(Vec<u8>),
    Expr(Vec<Symbol>),
}

impl Value {
    pub fn text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prop {
    pub name: Symbol,
    pub value: Vec<Value>,
}

/// A node of the merged device tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Node {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<Symbol>,
    pub name: NodeName,
    pub props: Vec<Prop>,
    pub nodes: Vec<Node>,
}

/// A node body as written in one source file, before merging.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub labels: Vec<Symbol>,
    pub name: NodeName,
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Prop(Prop),
    Node(Fragment),
    DeleteProp(Symbol),
    DeleteNode(NodeName),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Include {
    /// `#include "file"` or `/include/ "file"`
    Quoted(String),
    /// `#include <file>`
    System(String),
}

/// Top level items of a source file.
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Version,
    Plugin,
    MemReserve(Address, Address),
    Include(Include),
    Fragment(Fragment),
    DeleteNode(NodeName),
}

impl Node {
    pub fn new(name: NodeName) -> Self {
        Self {
            labels: Vec::new(),
            name,
            props: Vec::new(),
            nodes: Vec::new(),
        }
    }

    pub fn prop(&self, name: &str) -> Option<&Prop> {
        self.props.iter().find(|p| p.name.0 == name)
    }

    /// Define a property, replacing an earlier definition in place.
    pub fn set_prop(&mut self, prop: Prop) {
        match self.props.iter_mut().find(|p| p.name == prop.name) {
            Some(extant) => extant.value = prop.value,
            None => self.props.push(prop),
        }
    }

    fn child_or_insert(&mut self, name: NodeName) -> &mut Node {
        match self.nodes.iter().position(|n| n.name == name) {
            Some(i) => &mut self.nodes[i],
            None => {
                self.nodes.push(Node::new(name));
                let last = self.nodes.len() - 1;
                &mut self.nodes[last]
            }
        }
    }

    /// Merge a fragment's body into this node.
    pub fn merge(&mut self, fragment: Fragment) {
        for label in fragment.labels {
            if !self.labels.contains(&label) {
                self.labels.push(label)
            }
        }
        for statement in fragment.body {
            match statement {
                Statement::Prop(prop) => self.set_prop(prop),
                Statement::DeleteProp(name) => self.props.retain(|p| p.name != name),
                Statement::Node(child) => self.child_or_insert(child.name.clone()).merge(child),
                Statement::DeleteNode(name) => self.nodes.retain(|n| n.name != name),
            }
        }
    }

    pub fn find_label(&self, label: &Symbol) -> Option<&Node> {
        if self.labels.contains(label) {
            return Some(self);
        }
        self.nodes.iter().find_map(|n| n.find_label(label))
    }

    pub fn find_label_mut(&mut self, label: &Symbol) -> Option<&mut Node> {
        if self.labels.contains(label) {
            return Some(self);
        }
        self.nodes.iter_mut().find_map(|n| n.find_label_mut(label))
    }

    /// Remove the descendant carrying a label. Returns false when no node has it.
    pub fn remove_labelled(&mut self, label: &Symbol) -> bool {
        let before = self.nodes.len();
        self.nodes.retain(|n| !n.labels.contains(label));
        before != self.nodes.len() || self.nodes.iter_mut().any(|n| n.remove_labelled(label))
    }
}

impl DeviceNode for Node {
    fn fields(&self, name: &str) -> Option<Vec<&str>> {
        let strings: Vec<&str> = self.prop(name)?.value.iter().filter_map(Value::text).collect();
        (!strings.is_empty()).then_some(strings)
    }

    fn children(&self) -> &[Self] {
        &self.nodes
    }
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Path(Vec<NodeName>);

impl Path {
    pub fn root() -> Self {
        Self([NodeName::root()].into())
    }

    pub fn join(mut self, relpath: impl IntoIterator<Item = NodeName>) -> Path {
        for name in relpath {
            if name.is_reference() || name.is_root() {
                self.0 = Vec::new()
            }
            self.0.push(name)
        }
        self
    }

    pub fn is_root(&self) -> bool {
        self.0.len() == 1 && self.0[0].is_root()
    }
}

impl Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("0x{:x}", self.0))
    }
}

impl Display for NodeName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeName::Symbol(s, None) => s.fmt(f),
            NodeName::Symbol(s, Some(a)) => f.write_fmt(format_args!("{s}@{a}")),
            NodeName::Reference(s) => f.write_fmt(format_args!("&{s}")),
            NodeName::PathReference(p) => f.write_fmt(format_args!("&{{{p}}}")),
        }
    }
}

impl Display for Path {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_root() {
            f.write_str("/")
        } else {
            fmt_delimited(&self.0, "", "/", "", f)
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Symbol(s) => s.fmt(f),
            Value::Reference(s) => f.write_fmt(format_args!("&{s}")),
            Value::PathReference(p) => f.write_fmt(format_args!("&{{{p}}}")),
            Value::Address(a) => a.fmt(f),
            Value::Text(t) => f.write_fmt(format_args!("\"{t}\"")),
            Value::Array(a) => fmt_delimited(a, "<", " ", ">", f),
            Value::Bytes(b) => {
                let hex: Vec<String> = b.iter().map(|b| format!("{b:02x}")).collect();
                fmt_delimited(&hex, "[", " ", "]", f)
            }
            Value::Expr(r) => fmt_delimited(r, "(", ", ", ")", f),
        }
    }
}

impl Display for Prop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.name.fmt(f)?;
        if !self.value.is_empty() {
            f.write_str(" = ")?;
            fmt_delimited(&self.value, "", ", ", "", f)?;
        }
        Ok(())
    }
}

fn fmt_delimited<A>(
    elems: &[A],
    open: &str,
    sep: &str,
    close: &str,
    f: &mut std::fmt::Formatter<'_>,
) -> std::fmt::Result
where
    A: Display,
{
    f.write_str(open)?;
    let mut elems = elems.iter();
    if let Some(head) = elems.next() {
        head.fmt(f)?;
        for elem in elems {
            f.write_str(sep)?;
            elem.fmt(f)?;
        }
    }
    f.write_str(close)?;
    Ok(())
}
