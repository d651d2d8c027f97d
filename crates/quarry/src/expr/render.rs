//! Diagnostic rendering for expressions.
//!
//! Literal operands always render as bound placeholders (`?`), never as
//! spliced text; the rendered form mirrors what a session may submit, with
//! parenthesization driven by operator precedence.

use crate::expr::{AggregateOp, ArithOp, CompareOp, Expr, ExprNode, StrOp};
use crate::value::Value;
use std::fmt;

// Binding strength, loosest first. A child whose level is below its
// context's gets parenthesized.
const PREC_OR: u8 = 1;
const PREC_AND: u8 = 2;
const PREC_NOT: u8 = 3;
const PREC_CMP: u8 = 4;
const PREC_ADD: u8 = 5;
const PREC_MUL: u8 = 6;
const PREC_PRIMARY: u8 = 7;

impl CompareOp {
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::In => "in",
            Self::NotIn => "not in",
            Self::Contains => "contains",
            Self::Like => "like",
            Self::StartsWith => "starts with",
        }
    }
}

impl AggregateOp {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Count => "count",
            Self::Sum => "sum",
            Self::Avg => "avg",
            Self::Max => "max",
            Self::Min => "min",
        }
    }
}

const fn precedence(node: &ExprNode) -> u8 {
    match node {
        ExprNode::Or(_) => PREC_OR,
        ExprNode::And(_) => PREC_AND,
        ExprNode::Not(_) => PREC_NOT,
        ExprNode::Compare { .. } | ExprNode::IsNull(_) => PREC_CMP,
        ExprNode::Arith {
            op: ArithOp::Add | ArithOp::Sub,
            ..
        } => PREC_ADD,
        ExprNode::Arith {
            op: ArithOp::Mul, ..
        } => PREC_MUL,
        _ => PREC_PRIMARY,
    }
}

fn render(node: &ExprNode, f: &mut fmt::Formatter<'_>, context: u8) -> fmt::Result {
    let level = precedence(node);
    let parenthesize = level < context;
    if parenthesize {
        write!(f, "(")?;
    }

    match node {
        ExprNode::Path { alias, field } => write!(f, "{alias}.{field}")?,
        ExprNode::EntityAll { alias } => write!(f, "{alias}")?,
        ExprNode::Literal(value) => render_literal(value, f)?,
        ExprNode::Compare { op, lhs, rhs } => {
            render(lhs, f, level)?;
            write!(f, " {} ", op.symbol())?;
            render(rhs, f, level + 1)?;
        }
        ExprNode::And(operands) => render_chain(operands, " and ", f, level)?,
        ExprNode::Or(operands) => render_chain(operands, " or ", f, level)?,
        ExprNode::Not(operand) => match operand.as_ref() {
            ExprNode::IsNull(inner) => {
                render(inner, f, PREC_CMP + 1)?;
                write!(f, " is not null")?;
            }
            _ => {
                write!(f, "not ")?;
                render(operand, f, level + 1)?;
            }
        },
        ExprNode::IsNull(operand) => {
            render(operand, f, level + 1)?;
            write!(f, " is null")?;
        }
        ExprNode::Arith { op, lhs, rhs } => {
            let symbol = match op {
                ArithOp::Add => "+",
                ArithOp::Sub => "-",
                ArithOp::Mul => "*",
            };
            render(lhs, f, level)?;
            write!(f, " {symbol} ")?;
            render(rhs, f, level + 1)?;
        }
        ExprNode::StrFunc { op, operand } => {
            let name = match op {
                StrOp::Lower => "lower",
                StrOp::Upper => "upper",
            };
            write!(f, "{name}(")?;
            render(operand, f, PREC_OR)?;
            write!(f, ")")?;
        }
        ExprNode::Aggregate { op, operand } => {
            write!(f, "{}(", op.name())?;
            render(operand, f, PREC_OR)?;
            write!(f, ")")?;
        }
        ExprNode::Template { template, args } => render_template(template, args, f)?,
        ExprNode::Subquery(plan) => write!(f, "({plan})")?,
        ExprNode::Aliased { name, expr } => {
            render(expr, f, PREC_PRIMARY)?;
            write!(f, " as {name}")?;
        }
    }

    if parenthesize {
        write!(f, ")")?;
    }
    Ok(())
}

fn render_chain(
    operands: &[ExprNode],
    separator: &str,
    f: &mut fmt::Formatter<'_>,
    level: u8,
) -> fmt::Result {
    for (i, operand) in operands.iter().enumerate() {
        if i > 0 {
            write!(f, "{separator}")?;
        }
        // Same-level chains associate; anything looser needs parens.
        render(operand, f, level)?;
    }
    Ok(())
}

fn render_literal(value: &Value, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match value {
        Value::List(items) => {
            write!(f, "(")?;
            for (i, _) in items.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "?")?;
            }
            write!(f, ")")
        }
        _ => write!(f, "?"),
    }
}

// Substitute `{N}` markers with rendered operands. Malformed or
// out-of-range markers pass through as text.
fn render_template(template: &str, args: &[ExprNode], f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        write!(f, "{}", &rest[..open])?;
        let tail = &rest[open..];
        match tail.find('}') {
            Some(close) => {
                let marker = &tail[1..close];
                match marker.parse::<usize>().ok().and_then(|i| args.get(i)) {
                    Some(arg) => render(arg, f, PREC_OR)?,
                    None => write!(f, "{}", &tail[..=close])?,
                }
                rest = &tail[close + 1..];
            }
            None => {
                write!(f, "{tail}")?;
                return Ok(());
            }
        }
    }
    write!(f, "{rest}")
}

impl fmt::Display for ExprNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        render(self, f, PREC_OR)
    }
}

impl<T> fmt::Display for Expr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.node().fmt(f)
    }
}
