//! Lowering of IR expressions into SQL expressions.
//!
//! Metadata providers may use [`lower_expression`] to implement
//! `get_predicate_condition`: local fields resolve against the node's bound
//! table, context fields and existence checks go through a
//! [`ContextResolver`], and `$name` variables become query parameters.

use crate::error::LoweringError;
use crate::ir::{BinaryOperator, Expression, Location};
use crate::sql::ast::{BoundTable, CompareOp, SqlExpr, SqlLiteral};

/// Resolves references to vertices other than the one being filtered.
pub trait ContextResolver {
    fn context_field(&self, location: &Location, field: &str) -> Option<SqlExpr>;

    /// Column that is non-NULL whenever the vertex at `location` exists.
    fn presence_column(&self, location: &Location) -> Option<SqlExpr>;
}

/// Resolves nothing; any context reference is an error.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoContext;

impl ContextResolver for NoContext {
    fn context_field(&self, _location: &Location, _field: &str) -> Option<SqlExpr> {
        None
    }

    fn presence_column(&self, _location: &Location) -> Option<SqlExpr> {
        None
    }
}

/// Lower `expr` against `table`.
pub fn lower_expression<R: ContextResolver + ?Sized>(
    expr: &Expression,
    table: &BoundTable,
    resolver: &R,
) -> Result<SqlExpr, LoweringError> {
    match expr {
        Expression::Literal(value) => scalar_literal(value),
        Expression::Variable { name } => Ok(SqlExpr::Param(name.clone())),
        Expression::LocalField { field } => Ok(table.column(field)),
        Expression::ContextField { location, field } => resolver
            .context_field(location, field)
            .ok_or_else(|| unresolved(location)),
        Expression::ContextFieldExistence { location } => resolver
            .presence_column(location)
            .map(|column| SqlExpr::IsNotNull(Box::new(column)))
            .ok_or_else(|| unresolved(location)),
        Expression::UnaryNot(inner) => Ok(SqlExpr::Not(Box::new(lower_expression(
            inner, table, resolver,
        )?))),
        Expression::BinaryComposition { op, left, right } => {
            lower_binary(*op, left, right, table, resolver)
        }
    }
}

fn lower_binary<R: ContextResolver + ?Sized>(
    op: BinaryOperator,
    left: &Expression,
    right: &Expression,
    table: &BoundTable,
    resolver: &R,
) -> Result<SqlExpr, LoweringError> {
    let compare = |cmp: CompareOp| -> Result<SqlExpr, LoweringError> {
        Ok(SqlExpr::compare(
            cmp,
            lower_expression(left, table, resolver)?,
            lower_expression(right, table, resolver)?,
        ))
    };

    match op {
        BinaryOperator::Eq => compare(CompareOp::Eq),
        BinaryOperator::NotEq => compare(CompareOp::NotEq),
        BinaryOperator::Lt => compare(CompareOp::Lt),
        BinaryOperator::LtEq => compare(CompareOp::LtEq),
        BinaryOperator::Gt => compare(CompareOp::Gt),
        BinaryOperator::GtEq => compare(CompareOp::GtEq),
        BinaryOperator::And => Ok(SqlExpr::And(vec![
            lower_expression(left, table, resolver)?,
            lower_expression(right, table, resolver)?,
        ])),
        BinaryOperator::Or => Ok(SqlExpr::Or(vec![
            lower_expression(left, table, resolver)?,
            lower_expression(right, table, resolver)?,
        ])),
        BinaryOperator::HasSubstring => Ok(SqlExpr::like(
            lower_expression(left, table, resolver)?,
            SqlExpr::Concat(vec![
                SqlExpr::string("%"),
                lower_expression(right, table, resolver)?,
                SqlExpr::string("%"),
            ]),
        )),
        BinaryOperator::InCollection => Ok(SqlExpr::InList {
            expr: Box::new(lower_expression(left, table, resolver)?),
            list: lower_collection(right, table, resolver)?,
        }),
        // `left contains right` is `right IN left`.
        BinaryOperator::Contains => Ok(SqlExpr::InList {
            expr: Box::new(lower_expression(right, table, resolver)?),
            list: lower_collection(left, table, resolver)?,
        }),
    }
}

/// Lower the collection side of a membership test. A variable becomes one
/// expanding parameter.
fn lower_collection<R: ContextResolver + ?Sized>(
    expr: &Expression,
    table: &BoundTable,
    resolver: &R,
) -> Result<Vec<SqlExpr>, LoweringError> {
    match expr {
        Expression::Literal(serde_json::Value::Array(items)) => {
            items.iter().map(scalar_literal).collect()
        }
        Expression::Variable { .. } => Ok(vec![lower_expression(expr, table, resolver)?]),
        other => Err(LoweringError::InternalError(format!(
            "expected a collection operand, found {other}"
        ))),
    }
}

fn scalar_literal(value: &serde_json::Value) -> Result<SqlExpr, LoweringError> {
    let literal = match value {
        serde_json::Value::Null => SqlLiteral::Null,
        serde_json::Value::Bool(b) => SqlLiteral::Bool(*b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => SqlLiteral::Integer(i),
            None => SqlLiteral::Float(n.as_f64().ok_or_else(|| {
                LoweringError::InternalError(format!("numeric literal {n} is out of range"))
            })?),
        },
        serde_json::Value::String(s) => SqlLiteral::String(s.clone()),
        serde_json::Value::Array(_) | serde_json::Value::Object(_) => {
            return Err(LoweringError::InternalError(format!(
                "literal {value} is not a scalar"
            )));
        }
    };
    Ok(SqlExpr::Literal(literal))
}

fn unresolved(location: &Location) -> LoweringError {
    LoweringError::InternalError(format!(
        "expression references location {location}, which is not bound here"
    ))
}
