//! Predicate and output expressions carried by `Filter` and
//! `ConstructResult` blocks.

use crate::ir::location::Location;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Binary operators allowed in IR expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOperator {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
    /// Left collection contains the right value.
    Contains,
    /// Left string contains the right string.
    HasSubstring,
    /// Left value is an element of the right collection.
    InCollection,
}

impl BinaryOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            BinaryOperator::Eq => "=",
            BinaryOperator::NotEq => "!=",
            BinaryOperator::Lt => "<",
            BinaryOperator::LtEq => "<=",
            BinaryOperator::Gt => ">",
            BinaryOperator::GtEq => ">=",
            BinaryOperator::And => "&&",
            BinaryOperator::Or => "||",
            BinaryOperator::Contains => "contains",
            BinaryOperator::HasSubstring => "has_substring",
            BinaryOperator::InCollection => "in_collection",
        }
    }
}

/// An IR expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expression {
    /// A literal JSON value (`null`, bool, number, string, list).
    Literal(serde_json::Value),
    /// A runtime query argument, `$name`.
    Variable { name: String },
    /// A property of the vertex currently being filtered.
    LocalField { field: String },
    /// A property of the vertex bound at `location`.
    ContextField { location: Location, field: String },
    /// True when the (optional) vertex at `location` exists.
    ContextFieldExistence { location: Location },
    UnaryNot(Box<Expression>),
    BinaryComposition {
        op: BinaryOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },
}

impl Expression {
    pub fn local_field(field: &str) -> Self {
        Expression::LocalField {
            field: field.to_string(),
        }
    }

    pub fn context_field(location: &Location, field: &str) -> Self {
        Expression::ContextField {
            location: location.clone(),
            field: field.to_string(),
        }
    }

    pub fn variable(name: &str) -> Self {
        Expression::Variable {
            name: name.to_string(),
        }
    }

    pub fn literal(value: impl Into<serde_json::Value>) -> Self {
        Expression::Literal(value.into())
    }

    pub fn binary(op: BinaryOperator, left: Expression, right: Expression) -> Self {
        Expression::BinaryComposition {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Logical negation.
    #[allow(clippy::should_implement_trait)]
    pub fn not(inner: Expression) -> Self {
        Expression::UnaryNot(Box::new(inner))
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Literal(value) => write!(f, "{value}"),
            Expression::Variable { name } => write!(f, "${name}"),
            Expression::LocalField { field } => write!(f, "{field}"),
            Expression::ContextField { location, field } => write!(f, "{location}.{field}"),
            Expression::ContextFieldExistence { location } => write!(f, "exists({location})"),
            Expression::UnaryNot(inner) => write!(f, "!({inner})"),
            Expression::BinaryComposition { op, left, right } => {
                write!(f, "({left} {} {right})", op.as_str())
            }
        }
    }
}
