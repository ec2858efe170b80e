//! Relational statement AST produced by the SQL emitter.
//!
//! The AST is dialect-neutral. Its `Display` implementation renders generic
//! SQL with every identifier double-quoted; dialect-specific rendering is
//! left to callers that walk the tree themselves.
//!
//! ```text
//! Statement
//!   ├── ctes: [Cte { name, recursive, body: Select | Compound }]
//!   └── body: Select { distinct, projection, from: FromItem, filter }
//!
//! FromItem = Table(BoundTable) | Subquery { query, alias } | Join { kind, left, right, on }
//! ```

use crate::error::LoweringError;
use crate::hash;
use std::fmt;
use std::str::FromStr;

// ── Identifiers ─────────────────────────────────────────────────────────

/// Quote an SQL identifier, doubling embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote an SQL string literal, doubling embedded single quotes.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

// ── Tables ──────────────────────────────────────────────────────────────

/// A physical table or a CTE, by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Table {
    pub schema: Option<String>,
    pub name: String,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Table {
            schema: None,
            name: name.into(),
        }
    }

    pub fn in_schema(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Table {
            schema: Some(schema.into()),
            name: name.into(),
        }
    }

    /// Reference this table under an alias.
    pub fn bind(&self, alias: impl Into<String>) -> BoundTable {
        BoundTable {
            table: self.clone(),
            alias: Some(alias.into()),
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(schema) = &self.schema {
            write!(f, "{}.", quote_ident(schema))?;
        }
        f.write_str(&quote_ident(&self.name))
    }
}

/// A table as referenced from a particular query, optionally aliased.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BoundTable {
    pub table: Table,
    pub alias: Option<String>,
}

impl BoundTable {
    /// Reference a CTE by its own name.
    pub fn cte(name: impl Into<String>) -> Self {
        BoundTable {
            table: Table::new(name),
            alias: None,
        }
    }

    /// The name columns of this table are qualified with.
    pub fn qualifier(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.table.name)
    }

    pub fn column(&self, name: &str) -> SqlExpr {
        SqlExpr::Column {
            qualifier: Some(self.qualifier().to_string()),
            name: name.to_string(),
        }
    }

    pub fn to_from_item(&self) -> FromItem {
        FromItem::Table(self.clone())
    }
}

impl fmt::Display for BoundTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.table)?;
        if let Some(alias) = &self.alias {
            write!(f, " AS {}", quote_ident(alias))?;
        }
        Ok(())
    }
}

// ── Expressions ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum SqlLiteral {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl fmt::Display for SqlLiteral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlLiteral::Null => f.write_str("NULL"),
            SqlLiteral::Bool(true) => f.write_str("TRUE"),
            SqlLiteral::Bool(false) => f.write_str("FALSE"),
            SqlLiteral::Integer(v) => write!(f, "{v}"),
            SqlLiteral::Float(v) => write!(f, "{v}"),
            SqlLiteral::String(v) => f.write_str(&quote_literal(v)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl CompareOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::NotEq => "<>",
            CompareOp::Lt => "<",
            CompareOp::LtEq => "<=",
            CompareOp::Gt => ">",
            CompareOp::GtEq => ">=",
        }
    }
}

/// A scalar SQL expression.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlExpr {
    Column {
        qualifier: Option<String>,
        name: String,
    },
    Literal(SqlLiteral),
    /// A named query parameter, rendered `:name`.
    Param(String),
    Cast {
        expr: Box<SqlExpr>,
        type_name: String,
    },
    /// String concatenation with `||`.
    Concat(Vec<SqlExpr>),
    Add(Box<SqlExpr>, Box<SqlExpr>),
    Compare {
        op: CompareOp,
        left: Box<SqlExpr>,
        right: Box<SqlExpr>,
    },
    And(Vec<SqlExpr>),
    Or(Vec<SqlExpr>),
    Not(Box<SqlExpr>),
    Like {
        expr: Box<SqlExpr>,
        pattern: Box<SqlExpr>,
    },
    IsNull(Box<SqlExpr>),
    IsNotNull(Box<SqlExpr>),
    InList {
        expr: Box<SqlExpr>,
        list: Vec<SqlExpr>,
    },
}

impl SqlExpr {
    pub fn column(qualifier: &str, name: &str) -> Self {
        SqlExpr::Column {
            qualifier: Some(qualifier.to_string()),
            name: name.to_string(),
        }
    }

    pub fn integer(value: i64) -> Self {
        SqlExpr::Literal(SqlLiteral::Integer(value))
    }

    pub fn string(value: &str) -> Self {
        SqlExpr::Literal(SqlLiteral::String(value.to_string()))
    }

    pub fn compare(op: CompareOp, left: SqlExpr, right: SqlExpr) -> Self {
        SqlExpr::Compare {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn eq(left: SqlExpr, right: SqlExpr) -> Self {
        SqlExpr::compare(CompareOp::Eq, left, right)
    }

    pub fn cast(expr: SqlExpr, type_name: &str) -> Self {
        SqlExpr::Cast {
            expr: Box::new(expr),
            type_name: type_name.to_string(),
        }
    }

    pub fn like(expr: SqlExpr, pattern: SqlExpr) -> Self {
        SqlExpr::Like {
            expr: Box::new(expr),
            pattern: Box::new(pattern),
        }
    }

    /// Conjunction that collapses a single term to itself.
    pub fn and_all(mut terms: Vec<SqlExpr>) -> Self {
        if terms.len() == 1 {
            terms.remove(0)
        } else {
            SqlExpr::And(terms)
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, items: &[SqlExpr], sep: &str) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl fmt::Display for SqlExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlExpr::Column {
                qualifier: Some(q),
                name,
            } => write!(f, "{}.{}", quote_ident(q), quote_ident(name)),
            SqlExpr::Column {
                qualifier: None,
                name,
            } => f.write_str(&quote_ident(name)),
            SqlExpr::Literal(lit) => write!(f, "{lit}"),
            SqlExpr::Param(name) => write!(f, ":{name}"),
            SqlExpr::Cast { expr, type_name } => write!(f, "CAST({expr} AS {type_name})"),
            SqlExpr::Concat(parts) => {
                f.write_str("(")?;
                write_joined(f, parts, " || ")?;
                f.write_str(")")
            }
            SqlExpr::Add(left, right) => write!(f, "({left} + {right})"),
            SqlExpr::Compare { op, left, right } => {
                write!(f, "({left} {} {right})", op.as_str())
            }
            SqlExpr::And(terms) if terms.is_empty() => f.write_str("TRUE"),
            SqlExpr::And(terms) => {
                f.write_str("(")?;
                write_joined(f, terms, " AND ")?;
                f.write_str(")")
            }
            SqlExpr::Or(terms) if terms.is_empty() => f.write_str("FALSE"),
            SqlExpr::Or(terms) => {
                f.write_str("(")?;
                write_joined(f, terms, " OR ")?;
                f.write_str(")")
            }
            SqlExpr::Not(inner) => write!(f, "(NOT {inner})"),
            SqlExpr::Like { expr, pattern } => write!(f, "({expr} LIKE {pattern})"),
            SqlExpr::IsNull(inner) => write!(f, "({inner} IS NULL)"),
            SqlExpr::IsNotNull(inner) => write!(f, "({inner} IS NOT NULL)"),
            SqlExpr::InList { list, .. } if list.is_empty() => f.write_str("FALSE"),
            SqlExpr::InList { expr, list } => {
                write!(f, "({expr} IN (")?;
                write_joined(f, list, ", ")?;
                f.write_str("))")
            }
        }
    }
}

// ── Queries ─────────────────────────────────────────────────────────────

/// One projected column.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectItem {
    pub expr: SqlExpr,
    pub alias: Option<String>,
}

impl SelectItem {
    pub fn aliased(expr: SqlExpr, alias: impl Into<String>) -> Self {
        SelectItem {
            expr,
            alias: Some(alias.into()),
        }
    }
}

impl fmt::Display for SelectItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.alias {
            Some(alias) => write!(f, "{} AS {}", self.expr, quote_ident(alias)),
            None => write!(f, "{}", self.expr),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoinKind {
    Inner,
    LeftOuter,
}

impl JoinKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER JOIN",
            JoinKind::LeftOuter => "LEFT OUTER JOIN",
        }
    }
}

/// A relation in a `FROM` clause.
#[derive(Debug, Clone, PartialEq)]
pub enum FromItem {
    Table(BoundTable),
    Subquery {
        query: Box<Select>,
        alias: String,
    },
    Join {
        kind: JoinKind,
        left: Box<FromItem>,
        right: Box<FromItem>,
        on: SqlExpr,
    },
}

impl FromItem {
    pub fn join(kind: JoinKind, left: FromItem, right: FromItem, on: SqlExpr) -> Self {
        FromItem::Join {
            kind,
            left: Box::new(left),
            right: Box::new(right),
            on,
        }
    }

    /// Count join operators of the given kind in this item.
    pub fn count_joins(&self, wanted: JoinKind) -> usize {
        match self {
            FromItem::Table(_) | FromItem::Subquery { .. } => 0,
            FromItem::Join {
                kind, left, right, ..
            } => {
                usize::from(*kind == wanted) + left.count_joins(wanted) + right.count_joins(wanted)
            }
        }
    }
}

impl fmt::Display for FromItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FromItem::Table(table) => write!(f, "{table}"),
            FromItem::Subquery { query, alias } => {
                write!(f, "({query}) AS {}", quote_ident(alias))
            }
            FromItem::Join {
                kind,
                left,
                right,
                on,
            } => write!(f, "{left} {} {right} ON {on}", kind.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    pub distinct: bool,
    pub projection: Vec<SelectItem>,
    pub from: FromItem,
    pub filter: Option<SqlExpr>,
}

impl fmt::Display for Select {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.distinct {
            "SELECT DISTINCT "
        } else {
            "SELECT "
        })?;
        for (i, item) in self.projection.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{item}")?;
        }
        write!(f, " FROM {}", self.from)?;
        if let Some(filter) = &self.filter {
            write!(f, " WHERE {filter}")?;
        }
        Ok(())
    }
}

/// Set operation joining the anchor and step of a recursive CTE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SetCombinator {
    Union,
    UnionAll,
}

impl SetCombinator {
    pub fn as_str(&self) -> &'static str {
        match self {
            SetCombinator::Union => "UNION",
            SetCombinator::UnionAll => "UNION ALL",
        }
    }
}

impl FromStr for SetCombinator {
    type Err = LoweringError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "union" => Ok(SetCombinator::Union),
            "union_all" => Ok(SetCombinator::UnionAll),
            other => Err(LoweringError::UnsupportedRecursionCombinator(
                other.to_string(),
            )),
        }
    }
}

impl fmt::Display for SetCombinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CteBody {
    Select(Select),
    Compound {
        anchor: Box<Select>,
        combinator: SetCombinator,
        step: Box<Select>,
    },
}

impl fmt::Display for CteBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CteBody::Select(select) => write!(f, "{select}"),
            CteBody::Compound {
                anchor,
                combinator,
                step,
            } => write!(f, "{anchor}\n{combinator}\n{step}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cte {
    pub name: String,
    pub recursive: bool,
    pub body: CteBody,
}

/// A complete query: CTEs in creation order followed by the outward select.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub ctes: Vec<Cte>,
    pub body: Select,
}

impl Statement {
    pub fn is_recursive(&self) -> bool {
        self.ctes.iter().any(|cte| cte.recursive)
    }

    pub fn cte(&self, name: &str) -> Option<&Cte> {
        self.ctes.iter().find(|cte| cte.name == name)
    }

    /// Deterministic 64-bit fingerprint of the rendered statement.
    pub fn fingerprint(&self) -> u64 {
        hash::fingerprint(&self.to_string())
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.ctes.is_empty() {
            f.write_str(if self.is_recursive() {
                "WITH RECURSIVE "
            } else {
                "WITH "
            })?;
            for (i, cte) in self.ctes.iter().enumerate() {
                if i > 0 {
                    f.write_str(",\n")?;
                }
                write!(f, "{} AS (\n{}\n)", quote_ident(&cte.name), cte.body)?;
            }
            f.write_str("\n")?;
        }
        write!(f, "{}", self.body)
    }
}
