use winnow::combinator::{alt, cut_err, delimited, fail, opt, preceded};
use winnow::error::{ModalResult, StrContext, StrContextValue};
use winnow::prelude::*;
use winnow::token::{any, take_while};

use crate::{CompareOp, Expr, Value};

// -- Whitespace -------------------------------------------------------------

fn ws(input: &mut &str) -> ModalResult<()> {
    take_while(0.., |c: char| c.is_whitespace())
        .void()
        .parse_next(input)
}

// -- Identifiers ------------------------------------------------------------

fn ident<'i>(input: &mut &'i str) -> ModalResult<&'i str> {
    (
        take_while(1.., |c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(0.., |c: char| c.is_ascii_alphanumeric() || c == '_'),
    )
        .take()
        .context(StrContext::Expected(StrContextValue::Description(
            "field name",
        )))
        .parse_next(input)
}

// -- Values -----------------------------------------------------------------

fn string_literal(input: &mut &str) -> ModalResult<String> {
    '"'.parse_next(input)?;
    let mut s = String::new();
    loop {
        let ch = cut_err(any)
            .context(StrContext::Expected(StrContextValue::CharLiteral('"')))
            .parse_next(input)?;
        match ch {
            '"' => return Ok(s),
            '\\' => {
                let esc = cut_err(any).parse_next(input)?;
                match esc {
                    '"' => s.push('"'),
                    '\\' => s.push('\\'),
                    'n' => s.push('\n'),
                    't' => s.push('\t'),
                    other => {
                        s.push('\\');
                        s.push(other);
                    }
                }
            }
            c => s.push(c),
        }
    }
}

fn number(input: &mut &str) -> ModalResult<f64> {
    (
        opt('-'),
        take_while(1.., |c: char| c.is_ascii_digit()),
        opt(('.', take_while(1.., |c: char| c.is_ascii_digit()))),
    )
        .take()
        .try_map(|s: &str| s.parse::<f64>())
        .parse_next(input)
}

fn value(input: &mut &str) -> ModalResult<Value> {
    ws.parse_next(input)?;
    alt((
        string_literal.map(Value::String),
        "true".value(Value::Bool(true)),
        "false".value(Value::Bool(false)),
        "null".value(Value::Null),
        number.map(Value::Number),
    ))
    .context(StrContext::Expected(StrContextValue::Description("value")))
    .parse_next(input)
}

// -- Comparison operators ---------------------------------------------------

fn compare_op(input: &mut &str) -> ModalResult<CompareOp> {
    ws.parse_next(input)?;
    alt((
        ">=".value(CompareOp::Gte),
        ">".value(CompareOp::Gt),
        "<=".value(CompareOp::Lte),
        "<".value(CompareOp::Lt),
        "==".value(CompareOp::Eq),
        "!=".value(CompareOp::Neq),
    ))
    .context(StrContext::Expected(StrContextValue::Description(
        "comparison operator",
    )))
    .parse_next(input)
}

// -- Expressions (precedence: || < && < ! < primary) ------------------------
//
// Every parser returns the tree together with its height. Nesting of `(` and
// `!` and the height of the resulting tree are both capped, so neither
// parsing nor evaluation can recurse without bound.

/// Deepest allowed nesting of parentheses and `!`.
pub(crate) const MAX_NESTING: usize = 64;
/// Tallest allowed expression tree, counting `&&`/`||` chains.
pub(crate) const MAX_HEIGHT: usize = 256;

type Node = (Expr, usize);

fn too_deep<O>(input: &mut &str) -> ModalResult<O> {
    cut_err(fail)
        .context(StrContext::Label("condition depth"))
        .parse_next(input)
}

fn node(input: &mut &str, expr: Expr, height: usize) -> ModalResult<Node> {
    if height > MAX_HEIGHT {
        return too_deep(input);
    }
    Ok((expr, height))
}

fn primary(input: &mut &str, depth: usize) -> ModalResult<Node> {
    ws.parse_next(input)?;
    if opt('(').parse_next(input)?.is_some() {
        if depth >= MAX_NESTING {
            return too_deep(input);
        }
        let inner = or_expr(input, depth + 1)?;
        (ws, cut_err(')')).parse_next(input)?;
        return Ok(inner);
    }
    let cmp = comparison
        .context(StrContext::Expected(StrContextValue::Description(
            "condition",
        )))
        .parse_next(input)?;
    Ok((cmp, 1))
}

/// `field <op> value` or `field.contains("text")`.
fn comparison(input: &mut &str) -> ModalResult<Expr> {
    let name = ident.parse_next(input)?;
    if opt(".contains").parse_next(input)?.is_some() {
        let needle = cut_err(delimited((ws, '(', ws), string_literal, (ws, ')')))
            .context(StrContext::Expected(StrContextValue::Description(
                "quoted substring",
            )))
            .parse_next(input)?;
        return Ok(Expr::Contains {
            field: name.to_owned(),
            needle,
        });
    }
    let op = cut_err(compare_op).parse_next(input)?;
    let val = cut_err(value).parse_next(input)?;
    Ok(Expr::Compare {
        field: name.to_owned(),
        op,
        value: val,
    })
}

fn unary(input: &mut &str, depth: usize) -> ModalResult<Node> {
    ws.parse_next(input)?;
    if opt('!').parse_next(input)?.is_none() {
        return primary(input, depth);
    }
    if depth >= MAX_NESTING {
        return too_deep(input);
    }
    let (inner, height) = cut_err(|i: &mut &str| unary(i, depth + 1)).parse_next(input)?;
    node(input, Expr::Not(Box::new(inner)), height + 1)
}

fn and_expr(input: &mut &str, depth: usize) -> ModalResult<Node> {
    let (mut acc, mut height) = unary(input, depth)?;
    while opt(preceded(ws, "&&")).parse_next(input)?.is_some() {
        let (rhs, rhs_height) = cut_err(|i: &mut &str| unary(i, depth)).parse_next(input)?;
        (acc, height) = node(
            input,
            Expr::And(Box::new(acc), Box::new(rhs)),
            height.max(rhs_height) + 1,
        )?;
    }
    Ok((acc, height))
}

fn or_expr(input: &mut &str, depth: usize) -> ModalResult<Node> {
    let (mut acc, mut height) = and_expr(input, depth)?;
    while opt(preceded(ws, "||")).parse_next(input)?.is_some() {
        let (rhs, rhs_height) = cut_err(|i: &mut &str| and_expr(i, depth)).parse_next(input)?;
        (acc, height) = node(
            input,
            Expr::Or(Box::new(acc), Box::new(rhs)),
            height.max(rhs_height) + 1,
        )?;
    }
    Ok((acc, height))
}

// -- Top-level parser -------------------------------------------------------

pub fn parse_condition(input: &mut &str) -> ModalResult<Expr> {
    let (expr, _) = or_expr(input, 0)?;
    ws.parse_next(input)?;
    Ok(expr)
}

#[cfg(test)]
mod tests {
    use crate::parse::parse;

    use super::*;

    #[test]
    fn parse_single_comparison() {
        let expr = parse(r#"merchantType == "RESTAURANT""#).unwrap();
        assert_eq!(
            expr,
            Expr::Compare {
                field: "merchantType".into(),
                op: CompareOp::Eq,
                value: Value::String("RESTAURANT".into()),
            }
        );
    }

    #[test]
    fn parse_and_expression() {
        let expr = parse(r#"amount > 500 && merchantType == "ELECTRONICS""#).unwrap();
        assert!(matches!(expr, Expr::And(_, _)));
    }

    #[test]
    fn parse_or_expression() {
        let expr = parse("amount < 1 || amount > 1000").unwrap();
        assert!(matches!(expr, Expr::Or(_, _)));
    }

    #[test]
    fn parse_not_expression() {
        let expr = parse(r#"!(location == "NYC")"#).unwrap();
        assert!(matches!(expr, Expr::Not(_)));
    }

    #[test]
    fn parse_precedence_and_before_or() {
        let expr = parse("amount == 1 || amount == 2 && amount == 3").unwrap();
        match expr {
            Expr::Or(left, right) => {
                assert!(matches!(left.as_ref(), Expr::Compare { .. }));
                assert!(matches!(right.as_ref(), Expr::And(_, _)));
            }
            other => panic!("expected Or, got {other:?}"),
        }
    }

    #[test]
    fn parse_parenthesized_grouping() {
        let expr = parse("(amount == 1 || amount == 2) && amount == 3").unwrap();
        match expr {
            Expr::And(left, right) => {
                assert!(matches!(left.as_ref(), Expr::Or(_, _)));
                assert!(matches!(right.as_ref(), Expr::Compare { .. }));
            }
            other => panic!("expected And, got {other:?}"),
        }
    }

    #[test]
    fn parse_all_comparison_ops() {
        let ops = [
            ("==", CompareOp::Eq),
            ("!=", CompareOp::Neq),
            (">", CompareOp::Gt),
            (">=", CompareOp::Gte),
            ("<", CompareOp::Lt),
            ("<=", CompareOp::Lte),
        ];
        for (sym, expected_op) in ops {
            let input = format!("amount {sym} 1");
            match parse(&input).unwrap() {
                Expr::Compare { op, .. } => assert_eq!(op, expected_op, "failed for {sym}"),
                other => panic!("expected Compare for {sym}, got {other:?}"),
            }
        }
    }

    #[test]
    fn parse_all_value_types() {
        let cases = [
            ("42", Value::Number(42.0)),
            ("-5", Value::Number(-5.0)),
            ("99.95", Value::Number(99.95)),
            ("true", Value::Bool(true)),
            ("false", Value::Bool(false)),
            ("null", Value::Null),
            (r#""hello""#, Value::String("hello".into())),
        ];
        for (literal, expected) in cases {
            let input = format!("amount == {literal}");
            match parse(&input).unwrap() {
                Expr::Compare { value, .. } => assert_eq!(value, expected, "failed for {literal}"),
                other => panic!("expected Compare for {literal}, got {other:?}"),
            }
        }
    }

    #[test]
    fn parse_contains() {
        let expr = parse(r#"merchant.contains("AIR")"#).unwrap();
        assert_eq!(
            expr,
            Expr::Contains {
                field: "merchant".into(),
                needle: "AIR".into(),
            }
        );
    }

    #[test]
    fn parse_without_spaces() {
        let expr = parse(r#"amount>500&&merchantType=="X""#).unwrap();
        assert!(matches!(expr, Expr::And(_, _)));
    }

    #[test]
    fn parse_string_with_escapes() {
        let expr = parse(r#"merchant == "a\"b\\c""#).unwrap();
        match expr {
            Expr::Compare { value, .. } => assert_eq!(value, Value::String("a\"b\\c".into())),
            other => panic!("expected Compare, got {other:?}"),
        }
    }

    #[test]
    fn reject_malformed() {
        let bad = [
            "",
            "amount >",
            "(amount > 5",
            "amount > 5)",
            "amount > 5 &&",
            r#"merchant == "open"#,
            "amount >> 5",
            "merchant.contains(AIR)",
            "== 5",
        ];
        for input in bad {
            assert!(parse(input).is_err(), "accepted {input:?}");
        }
    }

    #[test]
    fn nesting_up_to_the_limit_parses() {
        let parens = format!(
            "{}amount > 0{}",
            "(".repeat(MAX_NESTING),
            ")".repeat(MAX_NESTING)
        );
        assert!(parse(&parens).is_ok());
        let nots = format!("{}amount > 0", "!".repeat(MAX_NESTING));
        assert!(parse(&nots).is_ok());
    }

    #[test]
    fn reject_excessive_nesting() {
        for depth in [MAX_NESTING + 1, 10_000] {
            let parens = format!("{}amount > 0{}", "(".repeat(depth), ")".repeat(depth));
            let err = parse(&parens).unwrap_err();
            assert!(err.message().contains("condition depth"), "{err}");
            assert!(err.offset() <= MAX_NESTING + 1);

            let nots = format!("{}amount > 0", "!".repeat(depth));
            assert!(parse(&nots).is_err());
        }
    }

    #[test]
    fn reject_overlong_chains() {
        let chain = vec!["amount > 0"; MAX_HEIGHT + 2].join(" && ");
        let err = parse(&chain).unwrap_err();
        assert!(err.message().contains("condition depth"), "{err}");

        let ok = vec!["amount > 0"; MAX_HEIGHT].join(" || ");
        assert!(parse(&ok).is_ok());
    }
}
