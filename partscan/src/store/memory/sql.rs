// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Parser for the SELECT dialect of the in-process store using nom parsers
//!
//! ```text
//! [@{key=value, ...}]
//! SELECT * | col [, col ...] FROM table
//! [WHERE col op literal | col IS [NOT] NULL [AND ...]]
//! [ORDER BY col [ASC|DESC] [, ...]]
//! [LIMIT n] [;]
//! ```

use crate::error::ScanError;
use nom::{
    branch::alt,
    bytes::complete::{tag, tag_no_case, take_while1},
    character::complete::{anychar, char, digit0, digit1, multispace0, multispace1, one_of, satisfy},
    combinator::{map, map_res, not, opt, peek, recognize, value},
    multi::{fold_many0, separated_list1},
    sequence::{delimited, pair, preceded, terminated, tuple},
    IResult,
};

/// Hint that makes root ORDER BY / LIMIT queries partitionable as one slice
pub const PARTITIONABILITY_CHECK_HINT: &str =
    "spanner_emulator.disable_query_partitionability_check";

/// SQL parse and binding errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SqlError {
    #[error("Syntax error at position {position} near '{near}'")]
    Syntax { position: usize, near: String },
    #[error("Incomplete statement")]
    Incomplete,
    #[error("Table not found: {0}")]
    UnknownTable(String),
    #[error("Column not found in {table}: {column}")]
    UnknownColumn { table: String, column: String },
    #[error("Invalid literal for column {column}: {message}")]
    InvalidLiteral { column: String, message: String },
}

impl From<SqlError> for ScanError {
    fn from(e: SqlError) -> Self {
        ScanError::Execution(e.to_string())
    }
}

/// Parsed SELECT statement
#[derive(Debug, Clone, PartialEq)]
pub struct SelectQuery {
    pub hints: Vec<(String, String)>,
    pub projection: Projection,
    pub table: String,
    pub filters: Vec<Predicate>,
    pub order_by: Vec<OrderKey>,
    pub limit: Option<u64>,
}

impl SelectQuery {
    /// Statement hint value, keys matched case-insensitively
    pub fn hint(&self, key: &str) -> Option<&str> {
        self.hints
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    pub fn partitionability_check_disabled(&self) -> bool {
        self.hint(PARTITIONABILITY_CHECK_HINT)
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    }

    /// Root ORDER BY and LIMIT need the whole result in one place
    pub fn is_root_partitionable(&self) -> bool {
        self.order_by.is_empty() && self.limit.is_none()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    All,
    Columns(Vec<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Compare {
        column: String,
        op: CompareOp,
        literal: Literal,
    },
    IsNull {
        column: String,
        negated: bool,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderKey {
    pub column: String,
    pub descending: bool,
}

/// Parse one SELECT statement
pub fn parse_select(sql: &str) -> Result<SelectQuery, SqlError> {
    match statement(sql) {
        Ok((rest, query)) if rest.is_empty() => Ok(query),
        Ok((rest, _)) => Err(syntax_error(sql, rest)),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(syntax_error(sql, e.input)),
        Err(nom::Err::Incomplete(_)) => Err(SqlError::Incomplete),
    }
}

fn syntax_error(sql: &str, rest: &str) -> SqlError {
    SqlError::Syntax {
        position: sql.len() - rest.len(),
        near: rest.chars().take(20).collect(),
    }
}

fn statement(input: &str) -> IResult<&str, SelectQuery> {
    let (input, _) = multispace0(input)?;
    let (input, hints) = opt(terminated(hints, multispace0))(input)?;
    let (input, _) = keyword("SELECT")(input)?;
    let (input, _) = multispace0(input)?;
    let (input, projection) = projection(input)?;
    let (input, _) = multispace0(input)?;
    let (input, _) = keyword("FROM")(input)?;
    let (input, _) = multispace0(input)?;
    let (input, table) = identifier(input)?;
    let (input, filters) = opt(preceded(
        tuple((multispace0, keyword("WHERE"), multispace0)),
        separated_list1(tuple((multispace0, keyword("AND"), multispace0)), predicate),
    ))(input)?;
    let (input, order_by) = opt(preceded(
        tuple((
            multispace0,
            keyword("ORDER"),
            multispace1,
            keyword("BY"),
            multispace0,
        )),
        separated_list1(tuple((multispace0, char(','), multispace0)), order_key),
    ))(input)?;
    let (input, limit) = opt(preceded(
        tuple((multispace0, keyword("LIMIT"), multispace0)),
        map_res(digit1, |s: &str| s.parse::<u64>()),
    ))(input)?;
    let (input, _) = tuple((multispace0, opt(char(';')), multispace0))(input)?;

    Ok((
        input,
        SelectQuery {
            hints: hints.unwrap_or_default(),
            projection,
            table,
            filters: filters.unwrap_or_default(),
            order_by: order_by.unwrap_or_default(),
            limit,
        },
    ))
}

/// Case-insensitive keyword that does not run into a following word
fn keyword<'a>(kw: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    terminated(tag_no_case(kw), not(peek(satisfy(is_ident_char))))
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn hints(input: &str) -> IResult<&str, Vec<(String, String)>> {
    delimited(
        pair(tag("@{"), multispace0),
        separated_list1(tuple((multispace0, char(','), multispace0)), hint),
        pair(multispace0, char('}')),
    )(input)
}

fn hint(input: &str) -> IResult<&str, (String, String)> {
    map(
        tuple((hint_word, multispace0, char('='), multispace0, hint_word)),
        |(key, _, _, _, val)| (key.to_string(), val.to_string()),
    )(input)
}

fn hint_word(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| is_ident_char(c) || c == '.' || c == '-')(input)
}

fn projection(input: &str) -> IResult<&str, Projection> {
    alt((
        value(Projection::All, char('*')),
        map(
            separated_list1(tuple((multispace0, char(','), multispace0)), identifier),
            Projection::Columns,
        ),
    ))(input)
}

fn identifier(input: &str) -> IResult<&str, String> {
    alt((
        map(
            delimited(char('`'), take_while1(|c: char| c != '`'), char('`')),
            |s: &str| s.to_string(),
        ),
        map(
            recognize(pair(
                satisfy(|c: char| c.is_ascii_alphabetic() || c == '_'),
                opt(take_while1(is_ident_char)),
            )),
            |s: &str| s.to_string(),
        ),
    ))(input)
}

fn predicate(input: &str) -> IResult<&str, Predicate> {
    alt((is_null_predicate, comparison))(input)
}

fn is_null_predicate(input: &str) -> IResult<&str, Predicate> {
    map(
        tuple((
            identifier,
            multispace1,
            keyword("IS"),
            multispace1,
            opt(terminated(keyword("NOT"), multispace1)),
            keyword("NULL"),
        )),
        |(column, _, _, _, not_kw, _)| Predicate::IsNull {
            column,
            negated: not_kw.is_some(),
        },
    )(input)
}

fn comparison(input: &str) -> IResult<&str, Predicate> {
    map(
        tuple((identifier, multispace0, compare_op, multispace0, literal)),
        |(column, _, op, _, literal)| Predicate::Compare {
            column,
            op,
            literal,
        },
    )(input)
}

fn compare_op(input: &str) -> IResult<&str, CompareOp> {
    alt((
        value(CompareOp::LtEq, tag("<=")),
        value(CompareOp::GtEq, tag(">=")),
        value(CompareOp::NotEq, tag("<>")),
        value(CompareOp::NotEq, tag("!=")),
        value(CompareOp::Eq, tag("=")),
        value(CompareOp::Lt, tag("<")),
        value(CompareOp::Gt, tag(">")),
    ))(input)
}

fn literal(input: &str) -> IResult<&str, Literal> {
    alt((
        value(Literal::Null, keyword("NULL")),
        value(Literal::Bool(true), keyword("TRUE")),
        value(Literal::Bool(false), keyword("FALSE")),
        map(float_literal, Literal::Float),
        map(integer_literal, Literal::Int),
        map(string_literal, Literal::String),
    ))(input)
}

fn integer_literal(input: &str) -> IResult<&str, i64> {
    map_res(recognize(pair(opt(char('-')), digit1)), |s: &str| {
        s.parse::<i64>()
    })(input)
}

fn float_literal(input: &str) -> IResult<&str, f64> {
    map_res(
        recognize(tuple((
            opt(char('-')),
            digit1,
            alt((
                recognize(pair(pair(char('.'), digit0), opt(exponent))),
                exponent,
            )),
        ))),
        |s: &str| s.parse::<f64>(),
    )(input)
}

fn exponent(input: &str) -> IResult<&str, &str> {
    recognize(tuple((one_of("eE"), opt(one_of("+-")), digit1)))(input)
}

fn string_literal(input: &str) -> IResult<&str, String> {
    alt((
        delimited(char('\''), string_body('\''), char('\'')),
        delimited(char('"'), string_body('"'), char('"')),
    ))(input)
}

fn string_body<'a>(quote: char) -> impl FnMut(&'a str) -> IResult<&'a str, String> {
    fold_many0(
        alt((
            map(preceded(char('\\'), anychar), |c| match c {
                'n' => '\n',
                't' => '\t',
                other => other,
            }),
            satisfy(move |c| c != quote && c != '\\'),
        )),
        String::new,
        |mut acc, c| {
            acc.push(c);
            acc
        },
    )
}

fn order_key(input: &str) -> IResult<&str, OrderKey> {
    map(
        pair(
            identifier,
            opt(preceded(
                multispace1,
                alt((
                    value(false, keyword("ASC")),
                    value(true, keyword("DESC")),
                )),
            )),
        ),
        |(column, descending)| OrderKey {
            column,
            descending: descending.unwrap_or(false),
        },
    )(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_table_scan() {
        let query = parse_select("SELECT * FROM `Singers`").unwrap();
        assert_eq!(query.projection, Projection::All);
        assert_eq!(query.table, "Singers");
        assert!(query.is_root_partitionable());
    }

    #[test]
    fn test_parse_full_statement() {
        let query = parse_select(
            "@{spanner_emulator.disable_query_partitionability_check=true}\n\
             select id, `name` from T where id >= -3 and name != 'a\\'b' and score IS NOT NULL \
             order by id desc, name limit 10;",
        )
        .unwrap();

        assert!(query.partitionability_check_disabled());
        assert_eq!(
            query.projection,
            Projection::Columns(vec!["id".into(), "name".into()])
        );
        assert_eq!(
            query.filters,
            vec![
                Predicate::Compare {
                    column: "id".into(),
                    op: CompareOp::GtEq,
                    literal: Literal::Int(-3),
                },
                Predicate::Compare {
                    column: "name".into(),
                    op: CompareOp::NotEq,
                    literal: Literal::String("a'b".into()),
                },
                Predicate::IsNull {
                    column: "score".into(),
                    negated: true,
                },
            ]
        );
        assert_eq!(
            query.order_by,
            vec![
                OrderKey {
                    column: "id".into(),
                    descending: true
                },
                OrderKey {
                    column: "name".into(),
                    descending: false
                },
            ]
        );
        assert_eq!(query.limit, Some(10));
        assert!(!query.is_root_partitionable());
    }

    #[test]
    fn test_parse_literals() {
        let parse = |predicate: &str| {
            let query = parse_select(&format!("SELECT * FROM T WHERE {}", predicate)).unwrap();
            match &query.filters[0] {
                Predicate::Compare { literal, .. } => literal.clone(),
                other => panic!("unexpected predicate {:?}", other),
            }
        };
        assert_eq!(parse("v = 1.5"), Literal::Float(1.5));
        assert_eq!(parse("v = 2e3"), Literal::Float(2000.0));
        assert_eq!(parse("v = -9223372036854775808"), Literal::Int(i64::MIN));
        assert_eq!(parse("v = TRUE"), Literal::Bool(true));
        assert_eq!(parse("v = \"x\""), Literal::String("x".into()));
        assert_eq!(parse("v <> NULL"), Literal::Null);
    }

    #[test]
    fn test_syntax_errors_report_position() {
        match parse_select("SELECT * FROM T WHERE") {
            Err(SqlError::Syntax { position, near }) => {
                assert_eq!(position, 16);
                assert_eq!(near, "WHERE");
            }
            other => panic!("unexpected result {:?}", other),
        }
        assert!(parse_select("SELECT FROM T").is_err());
        assert!(parse_select("SELECTv FROM T").is_err());
        assert!(parse_select("SELECT * FROM T LIMIT x").is_err());
    }

    #[test]
    fn test_sql_error_is_execution_error() {
        let err: ScanError = SqlError::UnknownTable("T".into()).into();
        assert!(matches!(err, ScanError::Execution(msg) if msg == "Table not found: T"));
    }
}
