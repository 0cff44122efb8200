use nom::error::{convert_error, VerboseError};
use nom::Parser;
use std::fmt::Display;
use std::fs;
use std::io::{stdout, Write};
use std::path::Path;

use crate::error::{Error, Result};

pub fn read_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })
}

pub fn write_file<A: Display>(path: &Path, content: &A) -> Result<()> {
    fs::write(path, content.to_string()).map_err(|source| Error::Write {
        path: path.to_path_buf(),
        source,
    })
}

pub fn write_stdout<A: Display>(content: &A) -> Result<()> {
    let mut out = stdout().lock();
    out.write_all(content.to_string().as_bytes())
        .and_then(|_| out.flush())
        .map_err(Error::Stdout)
}

/// Run a parser over the whole text. Failures are rendered with line context.
pub fn parse_with<P, T>(text: &str, mut parser: P) -> std::result::Result<T, String>
where
    P: for<'a> Parser<&'a str, T, VerboseError<&'a str>>,
{
    match parser.parse(text) {
        Ok((_, data)) => Ok(data),
        Err(nom::Err::Error(err)) | Err(nom::Err::Failure(err)) => Err(convert_error(text, err)),
        Err(nom::Err::Incomplete(_)) => Err("unexpected end of input".into()),
    }
}
