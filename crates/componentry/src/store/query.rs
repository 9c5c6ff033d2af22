//! # Query Compiler
//!
//! Turns a structured query into a flat list of [`Expression`]s, each a
//! `(path, operator, operand)` triple a backend can evaluate.
//!
//! ## Grammar
//!
//! ```text
//! {title: "Inception"}                      ["title", $equal, "Inception"]
//! {year: {$greaterThan: 2010}}              ["year", $greaterThan, 2010]
//! {director: {name: "Nolan"}}               ["director.name", $equal, "Nolan"]
//! {$or: [{title: "A"}, {title: "B"}]}       ["", $or, [[title = A], [title = B]]]
//! {tags: {$some: {$startsWith: "a"}}}       ["tags", $some, [["", $startsWith, "a"]]]
//! {year: {$not: {$lessThan: 2000}}}         ["year", $not, [["year", $lessThan, 2000]]]
//! ```
//!
//! Rules:
//!
//! - Keys starting with `$` are operators; any other key extends the path.
//! - At the root of a query only `$and`, `$or` and `$nor` are allowed. They may
//!   sit next to attribute keys.
//! - Below the root, an object holds either only attributes or only operators.
//! - `$some` and `$every` compile their operand relative to each array element
//!   (paths restart from `""`). A non-object operand means element equality.
//! - `$not` compiles its operand at the same path.
//! - A plain object reaching a scalar operator is an error.
//!
//! Expressions keep the insertion order of the query's keys.

use std::fmt;

use crate::error::{ComponentryError, Result};
use crate::value::{Object, Value};

use super::document::join_path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Equal,
    NotEqual,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    In,
    Includes,
    StartsWith,
    EndsWith,
    Matches,
    Some,
    Every,
    Length,
    Not,
    And,
    Or,
    Nor,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Equal => "$equal",
            Operator::NotEqual => "$notEqual",
            Operator::GreaterThan => "$greaterThan",
            Operator::GreaterThanOrEqual => "$greaterThanOrEqual",
            Operator::LessThan => "$lessThan",
            Operator::LessThanOrEqual => "$lessThanOrEqual",
            Operator::In => "$in",
            Operator::Includes => "$includes",
            Operator::StartsWith => "$startsWith",
            Operator::EndsWith => "$endsWith",
            Operator::Matches => "$matches",
            Operator::Some => "$some",
            Operator::Every => "$every",
            Operator::Length => "$length",
            Operator::Not => "$not",
            Operator::And => "$and",
            Operator::Or => "$or",
            Operator::Nor => "$nor",
        }
    }

    pub fn parse(name: &str) -> Option<Operator> {
        Some(match name {
            "$equal" => Operator::Equal,
            "$notEqual" => Operator::NotEqual,
            "$greaterThan" => Operator::GreaterThan,
            "$greaterThanOrEqual" => Operator::GreaterThanOrEqual,
            "$lessThan" => Operator::LessThan,
            "$lessThanOrEqual" => Operator::LessThanOrEqual,
            "$in" => Operator::In,
            "$includes" => Operator::Includes,
            "$startsWith" => Operator::StartsWith,
            "$endsWith" => Operator::EndsWith,
            "$matches" => Operator::Matches,
            "$some" => Operator::Some,
            "$every" => Operator::Every,
            "$length" => Operator::Length,
            "$not" => Operator::Not,
            "$and" => Operator::And,
            "$or" => Operator::Or,
            "$nor" => Operator::Nor,
            _ => return None,
        })
    }

    /// `$and`, `$or` and `$nor`.
    pub fn is_logical(&self) -> bool {
        matches!(self, Operator::And | Operator::Or | Operator::Nor)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Value(Value),
    /// `$some`, `$every`, `$not`
    Expressions(Vec<Expression>),
    /// `$and`, `$or`, `$nor`
    ExpressionLists(Vec<Vec<Expression>>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub path: String,
    pub operator: Operator,
    pub operand: Operand,
}

impl Expression {
    pub fn new(path: impl Into<String>, operator: Operator, operand: Operand) -> Self {
        Self {
            path: path.into(),
            operator,
            operand,
        }
    }

    /// `[path, operator, operand]`, with nested lists for compound operands.
    pub fn to_value(&self) -> Value {
        let operand = match &self.operand {
            Operand::Value(value) => value.clone(),
            Operand::Expressions(expressions) => expressions_to_value(expressions),
            Operand::ExpressionLists(lists) => {
                Value::Array(lists.iter().map(|list| expressions_to_value(list)).collect())
            }
        };
        Value::Array(vec![
            Value::from(self.path.as_str()),
            Value::from(self.operator.as_str()),
            operand,
        ])
    }
}

pub fn expressions_to_value(expressions: &[Expression]) -> Value {
    Value::Array(expressions.iter().map(Expression::to_value).collect())
}

fn is_operator(key: &str) -> bool {
    key.starts_with('$')
}

/// Compile a query object into expressions.
pub fn to_document_expressions(query: &Value) -> Result<Vec<Expression>> {
    let object = query
        .as_object()
        .ok_or_else(|| ComponentryError::InvalidQuery(query.to_string()))?;
    compile_object(object, "", true)
}

fn compile_object(object: &Object, path: &str, is_root: bool) -> Result<Vec<Expression>> {
    if !is_root {
        let operators = object.keys().filter(|key| is_operator(key)).count();
        if operators > 0 && operators < object.len() {
            return Err(ComponentryError::QueryMixedKeys(
                Value::Object(object.clone()).to_string(),
            ));
        }
    }

    let mut expressions = Vec::new();
    for (key, value) in object {
        if is_operator(key) {
            let operator = Operator::parse(key);
            if is_root && !operator.is_some_and(|operator| operator.is_logical()) {
                return Err(ComponentryError::QueryOperatorAtRoot {
                    operator: key.clone(),
                    query: Value::Object(object.clone()).to_string(),
                });
            }
            let operator = operator.ok_or_else(|| ComponentryError::UnknownQueryOperator {
                operator: key.clone(),
                query: Value::Object(object.clone()).to_string(),
            })?;
            expressions.push(compile_operator(path, operator, value, is_root)?);
        } else {
            let subpath = join_path(path, key);
            match value {
                Value::Object(subquery) => {
                    expressions.extend(compile_object(subquery, &subpath, false)?)
                }
                other => expressions.push(Expression::new(
                    subpath,
                    Operator::Equal,
                    Operand::Value(other.clone()),
                )),
            }
        }
    }
    Ok(expressions)
}

fn compile_operator(path: &str, operator: Operator, operand: &Value, is_root: bool) -> Result<Expression> {
    let invalid = |expected: &'static str| ComponentryError::InvalidQueryOperand {
        operator: operator.to_string(),
        expected,
        operand: operand.to_string(),
    };

    let operand = match operator {
        Operator::And | Operator::Or | Operator::Nor => {
            let items = operand.as_array().ok_or_else(|| invalid("an array of queries"))?;
            let lists = items
                .iter()
                .map(|item| {
                    let subquery = item.as_object().ok_or_else(|| invalid("an array of queries"))?;
                    compile_object(subquery, path, is_root)
                })
                .collect::<Result<Vec<_>>>()?;
            Operand::ExpressionLists(lists)
        }
        Operator::Not => Operand::Expressions(compile_subquery(path, operand)?),
        Operator::Some | Operator::Every => Operand::Expressions(compile_subquery("", operand)?),
        scalar => {
            if operand.is_plain_object() {
                return Err(ComponentryError::UnexpectedQueryObject {
                    operator: scalar.to_string(),
                    operand: operand.to_string(),
                });
            }
            let is_valid = match scalar {
                Operator::In => operand.as_array().is_some(),
                Operator::StartsWith | Operator::EndsWith => operand.as_str().is_some(),
                Operator::Matches => matches!(operand, Value::RegExp(_)),
                Operator::Length => operand.as_f64().is_some(),
                _ => true,
            };
            if !is_valid {
                return Err(invalid(match scalar {
                    Operator::In => "an array",
                    Operator::StartsWith | Operator::EndsWith => "a string",
                    Operator::Matches => "a regular expression",
                    _ => "a number",
                }));
            }
            Operand::Value(operand.clone())
        }
    };

    Ok(Expression::new(path, operator, operand))
}

/// Operand of `$not`, `$some` and `$every`: an object compiles as a subquery at
/// `path`, anything else means equality.
fn compile_subquery(path: &str, operand: &Value) -> Result<Vec<Expression>> {
    match operand {
        Value::Object(subquery) => compile_object(subquery, path, false),
        other => Ok(vec![Expression::new(
            path,
            Operator::Equal,
            Operand::Value(other.clone()),
        )]),
    }
}
