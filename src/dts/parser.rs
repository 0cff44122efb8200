use super::*;
use crate::strings::parse_string;
use nom::{
    branch::alt,
    bytes::complete::{tag, take_until, take_while, take_while1, take_while_m_n},
    character::complete::{digit1, hex_digit1, multispace1, not_line_ending, one_of, satisfy},
    combinator::{cut, eof, map_opt, map_res, opt, recognize, value},
    error::{context, VerboseError},
    multi::{many0, many0_count, many_m_n, separated_list1},
    sequence::{delimited, pair, preceded, separated_pair, terminated},
    IResult, Parser,
};

/// Parser trait with fixed I and E.
pub trait Pex<'a, T>: Parser<&'a str, T, VerboseError<&'a str>> + Sized {}

impl<'a, T, X> Pex<'a, T> for X where Self: Parser<&'a str, T, VerboseError<&'a str>> {}

type Res<'a, T> = IResult<&'a str, T, VerboseError<&'a str>>;

/// Parse a device tree source file as a sequence of top level items.
/// Node fragments are kept apart; merging them is left to the tree.
pub fn source(input: &str) -> Res<Vec<Item>> {
    delimited(spacing(), many0(terminated(item, spacing())), eof).parse(input)
}

fn item(input: &str) -> Res<Item> {
    alt((
        value(Item::Version, terminated(tag("/dts-v1/"), end())),
        value(Item::Plugin, terminated(tag("/plugin/"), end())),
        memreserve().map(|(a, s)| Item::MemReserve(a, s)),
        include().map(Item::Include),
        delete_node().map(Item::DeleteNode),
        fragment.map(Item::Fragment),
    ))
    .parse(input)
}

fn end<'a>() -> impl Pex<'a, ()> {
    value((), preceded(spacing(), tag(";")))
}

fn memreserve<'a>() -> impl Pex<'a, (Address, Address)> {
    let pair_of = separated_pair(literal(), spacing(), literal());
    delimited(
        pair(tag("/memreserve/"), spacing()),
        cut(pair_of),
        cut(end()),
    )
}

fn include<'a>() -> impl Pex<'a, Include> {
    let quoted = parse_string.map(Include::Quoted);
    let system = delimited(tag("<"), take_while1(|c: char| c != '>' && c != '\n'), tag(">"))
        .map(|s: &str| Include::System(s.into()));
    let directive = tag("/include/").or(tag("#include"));
    preceded(
        pair(directive, take_while(|c: char| c == ' ' || c == '\t')),
        context("include file name", cut(quoted.or(system))),
    )
}

fn delete_node<'a>() -> impl Pex<'a, NodeName> {
    let refer = reference().map(NodeName::Reference);
    let path = path_reference().map(NodeName::PathReference);
    delimited(
        pair(tag("/delete-node/"), spacing()),
        cut(path.or(refer).or(node_name())),
        cut(end()),
    )
}

fn delete_prop<'a>() -> impl Pex<'a, Symbol> {
    delimited(
        pair(tag("/delete-property/"), spacing()),
        cut(symbol()),
        cut(end()),
    )
}

/// A node, possibly labelled, and its body.
fn fragment(input: &str) -> Res<Fragment> {
    let root = value(NodeName::root(), tag("/"));
    let refer = reference().map(NodeName::Reference);
    let path = path_reference().map(NodeName::PathReference);
    let name = alt((root, path, refer, node_name()));

    pair(many0(terminated(label(), spacing())), name)
        .and(preceded(spacing(), block))
        .map(|((labels, name), body)| Fragment { labels, name, body })
        .parse(input)
}

fn node_name<'a>() -> impl Pex<'a, NodeName> {
    symbol()
        .and(opt(preceded(tag("@"), unit_address())))
        .map(|(s, a)| NodeName::Symbol(s, a))
}

fn unit_address<'a>() -> impl Pex<'a, Symbol> {
    take_while1(|c: char| c.is_ascii_alphanumeric() || c == ',' || c == '_' || c == '.')
        .map(|s: &str| Symbol(s.into()))
}

fn block(input: &str) -> Res<Vec<Statement>> {
    delimited(
        pair(tag("{"), spacing()),
        many0(terminated(statement, spacing())),
        context("end of node", cut(tag("}").and(end()))),
    )
    .parse(input)
}

fn statement(input: &str) -> Res<Statement> {
    alt((
        delete_prop().map(Statement::DeleteProp),
        delete_node().map(Statement::DeleteNode),
        fragment.map(Statement::Node),
        prop().map(Statement::Prop),
    ))
    .parse(input)
}

fn symbol<'a>() -> impl Pex<'a, Symbol> {
    recognize(satisfy(symbol_initial_char).and(take_while(symbol_char)))
        .map(|s: &str| Symbol(s.into()))
}

fn symbol_initial_char(c: char) -> bool {
    match c {
        c if c.is_alphabetic() => true,
        '_' | '$' | '#' => true,
        _ => false,
    }
}

fn symbol_char(c: char) -> bool {
    match c {
        c if c.is_alphanumeric() => true,
        '_' | '$' | '-' | '.' | ',' | '+' | '?' | '#' => true,
        _ => false,
    }
}

fn identifier<'a>() -> impl Pex<'a, Symbol> {
    recognize(satisfy(ident_initial_char).and(take_while(ident_char)))
        .map(|s: &str| Symbol(s.into()))
}

fn ident_initial_char(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

fn label<'a>() -> impl Pex<'a, Symbol> {
    terminated(identifier(), tag(":"))
}

fn reference<'a>() -> impl Pex<'a, Symbol> {
    preceded(tag("&"), identifier())
}

/// `&{/path/to/node}`
fn path_reference<'a>() -> impl Pex<'a, String> {
    let path = take_while1(|c: char| c != '}' && c != '\n');
    delimited(tag("&{"), cut(path), cut(tag("}"))).map(|p: &str| p.trim().to_string())
}

fn prop<'a>() -> impl Pex<'a, Prop> {
    let non_empty = separated_pair(symbol(), spaced(tag("=")), prop_values())
        .map(|(name, value)| Prop { name, value });
    let empty = symbol().map(|name| Prop {
        name,
        value: [].into(),
    });
    terminated(non_empty.or(empty), end())
}

fn prop_values<'a>() -> impl Pex<'a, Vec<Value>> {
    separated_list1(spaced(tag(",")), prop_value())
}

fn prop_value<'a>() -> impl Pex<'a, Value> {
    parse_string
        .map(Value::Text)
        .or(simple_value())
        .or(array().map(Value::Array))
        .or(bytes().map(Value::Bytes))
}

fn simple_value<'a>() -> impl Pex<'a, Value> {
    identifier()
        .map(Value::Symbol)
        .or(literal().map(Value::Address))
        .or(path_reference().map(Value::PathReference))
        .or(reference().map(Value::Reference))
        .or(expr_in_brackets.map(Value::Expr))
}

fn literal<'a>() -> impl Pex<'a, Address> {
    terminated(preceded(tag("0x").or(tag("0X")), hex()).or(dec()), integer_suffix())
}

/// C integer suffix such as `U`, `UL` or `ULL`. Dropped.
fn integer_suffix<'a>() -> impl Pex<'a, ()> {
    value(
        (),
        pair(opt(one_of("uU")), many_m_n(0, 2, one_of("lL"))),
    )
}

fn hex<'a>() -> impl Pex<'a, Address> {
    map_opt(hex_digit1, |s: &str| {
        u64::from_str_radix(s, 16).ok().map(Address)
    })
}

fn dec<'a>() -> impl Pex<'a, Address> {
    map_opt(digit1, |s: &str| s.parse::<u64>().ok().map(Address))
}

/// A cell array, optionally sized with `/bits/ n`. The size is not kept.
fn array<'a>() -> impl Pex<'a, Vec<Value>> {
    let bits = opt(pair(tag("/bits/"), spaced(dec())));
    preceded(
        bits,
        delimited(
            tag("<"),
            preceded(spacing(), many0(terminated(simple_value(), spacing()))),
            cut(tag(">")),
        ),
    )
}

fn bytes<'a>() -> impl Pex<'a, Vec<u8>> {
    let byte = map_res(
        take_while_m_n(2, 2, |c: char| c.is_ascii_hexdigit()),
        |s: &str| u8::from_str_radix(s, 16),
    );
    delimited(
        tag("["),
        preceded(spacing(), many0(terminated(byte, spacing()))),
        cut(tag("]")),
    )
}

fn expr_in_brackets(input: &str) -> Res<Vec<Symbol>> {
    delimited(tag("("), spaced(expr()), cut(tag(")"))).parse(input)
}

fn dependents(value: Value) -> Vec<Symbol> {
    match value {
        Value::Symbol(s) => [s].into(),
        Value::Reference(s) => [s].into(),
        Value::Expr(ss) => ss,
        Value::PathReference(_)
        | Value::Address(_)
        | Value::Text(_)
        | Value::Array(_)
        | Value::Bytes(_) => Vec::new(),
    }
}

fn flatten(deps: Vec<Symbol>, more_deps: Vec<Vec<Symbol>>) -> Vec<Symbol> {
    deps.into_iter().chain(more_deps.into_iter().flatten()).collect()
}

/// Expressions are recognised, not evaluated. Only the symbols they mention are kept.
fn expr<'a>() -> impl Pex<'a, Vec<Symbol>> {
    let operator = tag("||")
        .or(tag("&&"))
        .or(tag("<<"))
        .or(tag(">>"))
        .or(recognize(one_of("|&^*/+-%~!")));
    let term = || simple_value().map(dependents);
    let unary = || preceded(opt(terminated(one_of("-~!"), spacing())), term());
    let binary = preceded(operator, spaced(unary()));
    let applic = expr_in_brackets;
    let whole = unary().and(many0(spaced(binary.or(applic))));
    whole.map(|(d, e)| flatten(d, e))
}

fn spaced<'a, T>(item: impl Pex<'a, T>) -> impl Pex<'a, T> {
    delimited(spacing(), item, spacing())
}

fn spacing<'a>() -> impl Pex<'a, ()> {
    value(
        (),
        many0_count(preproc().or(comment()).or(value((), multispace1))),
    )
}

/// Preprocessor lines other than includes. Conditionals are not evaluated.
fn preproc<'a>() -> impl Pex<'a, ()> {
    let directive = alt((
        tag("# "),
        tag("#define"),
        tag("#undef"),
        tag("#ifdef"),
        tag("#ifndef"),
        tag("#if "),
        tag("#elif"),
        tag("#else"),
        tag("#endif"),
        tag("#pragma"),
        tag("#line"),
        tag("#error"),
    ));
    value((), directive.and(not_line_ending))
}

fn comment<'a>() -> impl Pex<'a, ()> {
    value((), tag("/*").and(take_until("*/")).and(tag("*/")))
        .or(value((), tag("//").and(not_line_ending)))
}
