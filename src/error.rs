use std::{io, path::PathBuf};

use crate::dts::Symbol;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot write to stdout: {0}")]
    Stdout(#[source] io::Error),
    #[error("{}: syntax error\n{detail}", path.display())]
    Syntax { path: PathBuf, detail: String },
    #[error("{}: include `{name}` not found", from.display())]
    IncludeNotFound { from: PathBuf, name: String },
    #[error("{}: include cycle", path.display())]
    IncludeCycle { path: PathBuf },
    #[error("reference to undefined label &{0}")]
    UndefinedLabel(Symbol),
    #[error("reference to undefined node &{{{0}}}")]
    UndefinedPath(String),
    #[error("template {template}: syntax error\n{detail}")]
    TemplateSyntax { template: String, detail: String },
    #[error("template {template}: value `{name}` is undefined")]
    Undefined { template: String, name: String },
    #[error("template {template}: {message}")]
    Missing { template: String, message: String },
    #[error("template {template}: value `{name}` is not a list")]
    NotIterable { template: String, name: String },
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
