//! Emitter configuration.
//!
//! A [`LoweringConfig`] controls naming of generated SQL objects and the
//! set operation used by recursive CTEs. Every field has a default, so an
//! empty TOML document is a valid configuration:
//!
//! ```toml
//! backend = "mssql"
//! cte_prefix = "__my_cte"
//! ```

use crate::error::LoweringError;
use crate::sql::ast::SetCombinator;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Target database family.
///
/// Only affects defaults; the emitted AST itself is dialect-neutral.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SqlBackend {
    #[default]
    Postgres,
    MySql,
    MariaDb,
    Sqlite,
    Mssql,
}

impl SqlBackend {
    /// Set operation this backend accepts between the anchor and the
    /// recursive term of a recursive CTE.
    ///
    /// SQL Server only supports `UNION ALL` there.
    pub fn recursion_combinator(&self) -> &'static str {
        match self {
            SqlBackend::Mssql => "union_all",
            SqlBackend::Postgres | SqlBackend::MySql | SqlBackend::MariaDb | SqlBackend::Sqlite => {
                "union"
            }
        }
    }

    pub const fn label(&self) -> &'static str {
        match self {
            SqlBackend::Postgres => "postgres",
            SqlBackend::MySql => "mysql",
            SqlBackend::MariaDb => "mariadb",
            SqlBackend::Sqlite => "sqlite",
            SqlBackend::Mssql => "mssql",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct LoweringConfig {
    pub backend: SqlBackend,

    /// Overrides the combinator named by the metadata provider.
    ///
    /// `"union"` or `"union_all"`. When unset, the provider decides.
    pub recursion_combinator: Option<String>,

    /// Name of the hop-count column of recursive CTEs.
    pub depth_column: String,

    /// Name of the visited-path column of recursive CTEs.
    pub path_column: String,

    /// Separator between vertex ids in the visited path. Also brackets the
    /// whole path so membership checks match whole ids only.
    pub path_delimiter: String,

    /// Type ids are cast to before being appended to the path.
    pub cast_type: String,

    /// Prefix of every generated CTE name.
    pub cte_prefix: String,
}

impl Default for LoweringConfig {
    fn default() -> Self {
        LoweringConfig {
            backend: SqlBackend::Postgres,
            recursion_combinator: None,
            depth_column: "__depth_internal_name".to_string(),
            path_column: "__path_internal_name".to_string(),
            path_delimiter: ",".to_string(),
            cast_type: "VARCHAR".to_string(),
            cte_prefix: "__gql_cte".to_string(),
        }
    }
}

impl LoweringConfig {
    pub fn for_backend(backend: SqlBackend) -> Self {
        LoweringConfig {
            backend,
            ..LoweringConfig::default()
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self, LoweringError> {
        let config: LoweringConfig = toml::from_str(content)
            .map_err(|e| LoweringError::Config(format!("failed to parse TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, LoweringError> {
        let content = fs::read_to_string(path).map_err(|e| {
            LoweringError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn to_toml_string(&self) -> Result<String, LoweringError> {
        toml::to_string_pretty(self)
            .map_err(|e| LoweringError::Config(format!("failed to serialize: {e}")))
    }

    /// Combinator name for providers that take it from configuration:
    /// the explicit override, else the backend default.
    pub fn combinator_name(&self) -> &str {
        self.recursion_combinator
            .as_deref()
            .unwrap_or_else(|| self.backend.recursion_combinator())
    }

    pub fn validate(&self) -> Result<(), LoweringError> {
        for (field, value) in [
            ("depth_column", &self.depth_column),
            ("path_column", &self.path_column),
            ("path_delimiter", &self.path_delimiter),
            ("cast_type", &self.cast_type),
            ("cte_prefix", &self.cte_prefix),
        ] {
            if value.is_empty() {
                return Err(LoweringError::Config(format!("{field} must not be empty")));
            }
        }
        // The cycle guard matches the delimiter inside a LIKE pattern.
        if let Some(c) = self
            .path_delimiter
            .chars()
            .find(|c| matches!(c, '%' | '_' | '\\'))
        {
            return Err(LoweringError::Config(format!(
                "path_delimiter {:?} contains LIKE metacharacter {c:?}",
                self.path_delimiter
            )));
        }
        if self.depth_column == self.path_column {
            return Err(LoweringError::Config(format!(
                "depth_column and path_column are both {:?}",
                self.depth_column
            )));
        }
        if let Some(name) = &self.recursion_combinator {
            name.parse::<SetCombinator>()?;
        }
        Ok(())
    }
}
