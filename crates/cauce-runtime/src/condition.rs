//! Edge condition evaluation.
//!
//! Conditions are small textual expressions of the form
//! `{{path}} <operator> <literal>`, chained with `AND`/`OR`. Evaluation
//! never fails: a malformed expression or unresolvable reference makes
//! the condition false and routing falls through to the next edge.

use serde_json::Value;

use crate::template::{Scope, value_to_string};

/// Tracing target for condition evaluation.
const TRACING_TARGET: &str = "cauce_runtime::condition";

/// Comparison operators recognized in condition expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    Greater,
    Less,
    GreaterOrEqual,
    LessOrEqual,
    Exists,
    NotExists,
}

impl Op {
    /// Whether the operator takes no right-hand literal.
    const fn is_unary(self) -> bool {
        matches!(self, Op::Exists | Op::NotExists)
    }
}

/// Operator spellings, longest first so `not_contains` wins over
/// `contains` and `>=` over `>`.
const OP_TABLE: &[(&str, Op)] = &[
    ("not_contains", Op::NotContains),
    ("not_equals", Op::NotEquals),
    ("not_exists", Op::NotExists),
    ("greater_or_equal", Op::GreaterOrEqual),
    ("less_or_equal", Op::LessOrEqual),
    ("contains", Op::Contains),
    ("equals", Op::Equals),
    ("exists", Op::Exists),
    ("greater", Op::Greater),
    ("less", Op::Less),
    (">=", Op::GreaterOrEqual),
    ("<=", Op::LessOrEqual),
    ("==", Op::Equals),
    ("!=", Op::NotEquals),
    (">", Op::Greater),
    ("<", Op::Less),
];

/// Evaluates a condition expression against a scope.
///
/// `OR` binds looser than `AND`. A bare expression with no operator is
/// a truthiness test on the resolved value.
pub fn evaluate(expression: &str, scope: &Scope<'_>) -> bool {
    let expression = expression.trim();
    if expression.is_empty() {
        return true;
    }

    split_keyword(expression, "OR")
        .into_iter()
        .any(|clause| split_keyword(clause, "AND").into_iter().all(|c| evaluate_clause(c, scope)))
}

/// Splits on a chain keyword (` OR ` / ` AND `), outside of `{{...}}`
/// placeholders.
///
/// Combinators are matched in uppercase only: a lowercase ` and ` is
/// ordinary literal text (`equals War and Peace` stays one clause).
fn split_keyword<'e>(expression: &'e str, keyword: &str) -> Vec<&'e str> {
    let needle = format!(" {keyword} ");
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;

    let mut chars = expression.char_indices();
    while let Some((i, _)) = chars.next() {
        let rest = &expression[i..];
        if rest.starts_with("{{") {
            depth += 1;
            chars.next();
        } else if rest.starts_with("}}") {
            depth = depth.saturating_sub(1);
            chars.next();
        } else if depth == 0 && rest.starts_with(&needle) {
            parts.push(expression[start..i].trim());
            start = i + needle.len();
            // The needle is ASCII, so bytes and chars line up.
            for _ in 1..needle.len() {
                chars.next();
            }
        }
    }
    parts.push(expression[start..].trim());
    parts
}

/// Evaluates one `{{path}} op literal` clause.
fn evaluate_clause(clause: &str, scope: &Scope<'_>) -> bool {
    let clause = clause.trim();
    let Some((subject, rest)) = split_subject(clause) else {
        tracing::debug!(
            target: TRACING_TARGET,
            clause,
            "Condition clause has no subject, evaluating to false"
        );
        return false;
    };

    let resolved = scope.resolve_path(subject);
    let rest = rest.trim();

    if rest.is_empty() {
        return is_truthy(resolved.as_ref());
    }

    let Some((op, literal)) = parse_operator(rest) else {
        tracing::debug!(
            target: TRACING_TARGET,
            clause,
            "Unknown condition operator, evaluating to false"
        );
        return false;
    };

    if op.is_unary() {
        let exists = is_truthy(resolved.as_ref());
        return match op {
            Op::Exists => exists,
            _ => !exists,
        };
    }

    let Some(left) = resolved else {
        // Missing value only satisfies negative comparisons.
        return matches!(op, Op::NotEquals | Op::NotContains);
    };

    compare(op, &left, literal)
}

/// Extracts the `{{...}}` subject from the front of a clause.
fn split_subject(clause: &str) -> Option<(&str, &str)> {
    let inner = clause.strip_prefix("{{")?;
    let end = inner.find("}}")?;
    Some((inner[..end].trim(), &inner[end + 2..]))
}

/// Matches the leading operator spelling and returns it with the
/// remaining literal text.
fn parse_operator(rest: &str) -> Option<(Op, &str)> {
    for (spelling, op) in OP_TABLE {
        if let Some(literal) = rest.strip_prefix(spelling) {
            // Word operators need a following boundary; symbols do not.
            let symbolic = !spelling.chars().next().is_some_and(|c| c.is_ascii_alphabetic());
            if symbolic || literal.is_empty() || literal.starts_with(char::is_whitespace) {
                return Some((*op, literal.trim().trim_matches('"').trim_matches('\'')));
            }
        }
    }
    None
}

/// Applies a binary comparison between a resolved value and a literal.
fn compare(op: Op, left: &Value, literal: &str) -> bool {
    match op {
        Op::Equals => values_equal(left, literal),
        Op::NotEquals => !values_equal(left, literal),
        Op::Contains => contains(left, literal),
        Op::NotContains => !contains(left, literal),
        Op::Greater | Op::Less | Op::GreaterOrEqual | Op::LessOrEqual => {
            let (Some(l), Ok(r)) = (as_number(left), literal.parse::<f64>()) else {
                return false;
            };
            match op {
                Op::Greater => l > r,
                Op::Less => l < r,
                Op::GreaterOrEqual => l >= r,
                Op::LessOrEqual => l <= r,
                _ => unreachable!(),
            }
        }
        Op::Exists | Op::NotExists => unreachable!(),
    }
}

/// Equality between a JSON value and a textual literal.
///
/// Numbers compare numerically when both sides parse; everything else
/// compares as case-insensitive strings, so `{{activo}} equals true`
/// matches both the boolean and the string form.
fn values_equal(left: &Value, literal: &str) -> bool {
    if let (Some(l), Ok(r)) = (as_number(left), literal.parse::<f64>()) {
        return l == r;
    }
    value_to_string(left).eq_ignore_ascii_case(literal)
}

/// Substring test for strings, membership test for arrays.
fn contains(left: &Value, literal: &str) -> bool {
    match left {
        Value::Array(items) => items.iter().any(|item| values_equal(item, literal)),
        other => {
            let haystack = value_to_string(other).to_lowercase();
            haystack.contains(&literal.to_lowercase())
        }
    }
}

/// Numeric view of a value, accepting numeric strings.
fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Truthiness: absent, null, `false`, `0`, empty string, and empty
/// array are false; everything else is true.
fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64() != Some(0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::Object(_)) => true,
    }
}
