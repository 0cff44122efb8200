use super::{Expr, Segment};
use crate::strings::parse_string;
use nom::{
    branch::alt,
    bytes::complete::{tag, take_until, take_while},
    character::complete::{anychar, char, multispace0, multispace1, satisfy},
    combinator::{all_consuming, cut, not, recognize, value},
    error::{context, VerboseError},
    multi::{many0, many1_count, separated_list1},
    sequence::{delimited, pair, preceded, tuple},
    IResult, Parser,
};

type Res<'a, T> = IResult<&'a str, T, VerboseError<&'a str>>;

/// A whole template.
pub fn template(input: &str) -> Res<Vec<Segment>> {
    all_consuming(segments).parse(input)
}

fn segments(input: &str) -> Res<Vec<Segment>> {
    many0(segment).parse(input)
}

fn segment(input: &str) -> Res<Segment> {
    alt((
        for_loop,
        substitution.map(Segment::Expr),
        value(Segment::Comment, comment),
        text.map(|s: &str| Segment::Text(s.into())),
    ))
    .parse(input)
}

/// Literal text up to the next tag.
fn text(input: &str) -> Res<&str> {
    let opening = alt((tag("{{"), tag("{%"), tag("{#")));
    recognize(many1_count(preceded(not(opening), anychar))).parse(input)
}

fn comment(input: &str) -> Res<()> {
    value((), tuple((tag("{#"), take_until("#}"), tag("#}")))).parse(input)
}

fn substitution(input: &str) -> Res<Expr> {
    delimited(
        pair(tag("{{"), multispace0),
        context("value", cut(alt((missing, lookup)))),
        context("closing }}", cut(pair(multispace0, tag("}}")))),
    )
    .parse(input)
}

fn lookup(input: &str) -> Res<Expr> {
    separated_list1(tag("."), name)
        .map(Expr::Lookup)
        .parse(input)
}

/// `missingvalue("message")`, with single or double quotes.
fn missing(input: &str) -> Res<Expr> {
    let single = delimited(char('\''), take_while(|c: char| c != '\''), char('\''))
        .map(|s: &str| s.to_string());
    delimited(
        tuple((tag("missingvalue"), multispace0, tag("("), multispace0)),
        parse_string.or(single),
        pair(multispace0, tag(")")),
    )
    .map(Expr::Missing)
    .parse(input)
}

fn name(input: &str) -> Res<String> {
    recognize(pair(
        satisfy(|c: char| c.is_alphabetic() || c == '_'),
        take_while(|c: char| c.is_alphanumeric() || c == '_'),
    ))
    .map(String::from)
    .parse(input)
}

/// `{% keyword ... %}`
fn block<'a, O>(
    keyword: &'static str,
    inner: impl Parser<&'a str, O, VerboseError<&'a str>>,
) -> impl Parser<&'a str, O, VerboseError<&'a str>> {
    delimited(
        tuple((tag("{%"), multispace0, tag(keyword))),
        inner,
        pair(multispace0, tag("%}")),
    )
}

fn for_loop(input: &str) -> Res<Segment> {
    let head = tuple((
        preceded(multispace1, name),
        preceded(tuple((multispace1, tag("in"), multispace1)), lookup),
    ));
    let end = block("endfor", multispace0);
    tuple((
        block("for", cut(head)),
        segments,
        context("{% endfor %}", cut(end)),
    ))
    .map(|((var, list), body, _)| Segment::For { var, list, body })
    .parse(input)
}

#[cfg(test)]
mod test {
    use super::*;

    fn lookup_of(path: &[&str]) -> Expr {
        Expr::Lookup(path.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn text_test() {
        assert_eq!(
            template("plain text\n"),
            Ok(("", [Segment::Text("plain text\n".into())].into()))
        );
    }

    #[test]
    fn substitution_test() {
        assert_eq!(
            template("A = {{ target_c }}{{loop.item}}"),
            Ok((
                "",
                [
                    Segment::Text("A = ".into()),
                    Segment::Expr(lookup_of(&["target_c"])),
                    Segment::Expr(lookup_of(&["loop", "item"])),
                ]
                .into()
            ))
        );
    }

    #[test]
    fn for_loop_test() {
        let (_, segments) = template("{# sources #}{% for s in target_s %}[{{ s }}]{% endfor %}!").unwrap();
        assert_eq!(
            segments,
            [
                Segment::Comment,
                Segment::For {
                    var: "s".into(),
                    list: lookup_of(&["target_s"]),
                    body: [
                        Segment::Text("[".into()),
                        Segment::Expr(lookup_of(&["s"])),
                        Segment::Text("]".into()),
                    ]
                    .into(),
                },
                Segment::Text("!".into()),
            ]
        );
    }

    #[test]
    fn missing_test() {
        assert_eq!(
            template(r#"{{ missingvalue("need target_c") }}{{ missingvalue ( 'x' ) }}{{ missingvalues }}"#),
            Ok((
                "",
                [
                    Segment::Expr(Expr::Missing("need target_c".into())),
                    Segment::Expr(Expr::Missing("x".into())),
                    Segment::Expr(lookup_of(&["missingvalues"])),
                ]
                .into()
            ))
        );
    }

    #[test]
    fn unterminated_loop_test() {
        assert!(matches!(
            template("{% for s in x %}never ends"),
            Err(nom::Err::Failure(_))
        ));
    }

    #[test]
    fn unclosed_substitution_test() {
        assert!(matches!(template("{{ x "), Err(nom::Err::Failure(_))));
    }
}
