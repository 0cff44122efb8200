use nom::{
    branch::alt,
    bytes::complete::{is_not, take_while_m_n},
    character::complete::char,
    combinator::{map_opt, value},
    error::VerboseError,
    multi::fold_many0,
    sequence::{delimited, preceded},
    IResult, Parser,
};

/// A double quoted string with C style escapes.
pub fn parse_string(input: &str) -> IResult<&str, String, VerboseError<&str>> {
    let build = |mut text: String, piece: Piece| {
        match piece {
            Piece::Literal(s) => text.push_str(s),
            Piece::Escaped(c) => text.push(c),
        }
        text
    };
    delimited(char('"'), fold_many0(piece, String::new, build), char('"')).parse(input)
}

#[derive(Debug, Clone)]
enum Piece<'a> {
    Literal(&'a str),
    Escaped(char),
}

fn piece(input: &str) -> IResult<&str, Piece, VerboseError<&str>> {
    is_not("\"\\")
        .map(Piece::Literal)
        .or(escaped.map(Piece::Escaped))
        .parse(input)
}

fn escaped(input: &str) -> IResult<&str, char, VerboseError<&str>> {
    let simple = alt((
        value('\n', char('n')),
        value('\r', char('r')),
        value('\t', char('t')),
        value('\0', char('0')),
        value('\\', char('\\')),
        value('"', char('"')),
        value('\'', char('\'')),
    ));
    preceded(char('\\'), hex_escape.or(simple)).parse(input)
}

/// `\x` followed by one or two hex digits.
fn hex_escape(input: &str) -> IResult<&str, char, VerboseError<&str>> {
    let digits = take_while_m_n(1, 2, |c: char| c.is_ascii_hexdigit());
    map_opt(preceded(char('x'), digits), |s: &str| {
        u8::from_str_radix(s, 16).ok().map(char::from)
    })
    .parse(input)
}
