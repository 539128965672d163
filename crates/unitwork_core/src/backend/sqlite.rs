//! SQLite document store adapter.
//!
//! # Responsibility
//! - Store aggregates as JSON documents in the `aggregates` table.
//! - Translate criteria and field sort keys into SQL; fall back to the
//!   in-process pipeline for opaque predicates and closure sort keys.
//!
//! # Invariants
//! - Default order is insertion order (`seq ASC`).
//! - Translated and in-process evaluation select the same rows.
//! - Transactions are plain `BEGIN IMMEDIATE`/`COMMIT`/`ROLLBACK` on the
//!   owned connection.

use crate::backend::{eval, BackendError, BackendResult, BackendSession};
use crate::db::migrations::{latest_version, schema_version};
use crate::db::{open_db, open_db_in_memory};
use crate::error::{RepoError, RepoResult};
use crate::model::aggregate::AggregateRoot;
use crate::model::record::Record;
use crate::repo::paging::PagingWindow;
use crate::spec::criteria::{Criteria, CriteriaValue, Field, Operator};
use crate::spec::sort::{SortBy, SortOrder};
use crate::spec::specification::Specification;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::path::Path;

const AGGREGATES_TABLE: &str = "aggregates";
const NUMERIC_TYPES: &str = "('integer', 'real', 'true', 'false')";

/// Backend session over one SQLite connection.
pub struct SqliteSession {
    conn: Connection,
}

impl SqliteSession {
    /// Opens a database file, migrating it when needed.
    pub fn open(path: impl AsRef<Path>) -> RepoResult<Self> {
        Self::try_new(open_db(path)?)
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> RepoResult<Self> {
        Self::try_new(open_db_in_memory()?)
    }

    /// Wraps an already migrated connection.
    ///
    /// # Errors
    /// - `RepoError::Configuration` when the schema version or the
    ///   `aggregates` table does not match this build.
    pub fn try_new(conn: Connection) -> RepoResult<Self> {
        ensure_connection_ready(&conn)?;
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn into_connection(self) -> Connection {
        self.conn
    }

    fn query_documents(&self, query: &SelectQuery) -> BackendResult<Vec<serde_json::Value>> {
        let mut stmt = self.conn.prepare(&query.sql)?;
        let mut rows = stmt.query(params_from_iter(query.params.iter()))?;
        let mut documents = Vec::new();
        while let Some(row) = rows.next()? {
            let body: String = row.get(0)?;
            documents.push(serde_json::from_str(&body)?);
        }
        Ok(documents)
    }

    fn write(&self, sql: &str, record: &Record) -> BackendResult<usize> {
        let changed = self.conn.execute(
            sql,
            params![record.kind(), record.key(), record.body.to_string()],
        )?;
        Ok(changed)
    }
}

impl BackendSession for SqliteSession {
    fn point_get<T: AggregateRoot>(&self, key: &T::Key) -> BackendResult<Option<T>> {
        let body = self
            .conn
            .query_row(
                "SELECT body FROM aggregates WHERE kind = ?1 AND key = ?2;",
                params![T::KIND, key.to_string()],
                |row| row.get::<_, String>(0),
            )
            .optional()?;

        match body {
            Some(body) => Ok(Some(serde_json::from_str(&body)?)),
            None => Ok(None),
        }
    }

    fn scan_first<T: AggregateRoot>(&self, spec: &Specification<T>) -> BackendResult<Option<T>> {
        let mut query = SelectQuery::for_kind(T::KIND);
        match spec.criteria() {
            Some(criteria) => {
                query.filter(criteria);
                query.order_by_default();
                query.limit(1);
                Ok(eval::select(self.query_documents(&query)?, None, None, None)?
                    .into_iter()
                    .next())
            }
            None => {
                query.order_by_default();
                eval::first_match(self.query_documents(&query)?, spec)
            }
        }
    }

    fn scan<T: AggregateRoot>(&self, spec: Option<&Specification<T>>) -> BackendResult<Vec<T>> {
        let mut query = SelectQuery::for_kind(T::KIND);
        let residual = match spec {
            Some(spec) => match spec.criteria() {
                Some(criteria) => {
                    query.filter(criteria);
                    None
                }
                None => Some(spec),
            },
            None => None,
        };
        query.order_by_default();
        eval::select(self.query_documents(&query)?, residual, None, None)
    }

    fn scan_paged<T: AggregateRoot>(
        &self,
        spec: Option<&Specification<T>>,
        window: PagingWindow,
        sort: Option<SortBy<'_, T>>,
    ) -> BackendResult<Vec<T>> {
        let mut query = SelectQuery::for_kind(T::KIND);
        let residual = match spec {
            Some(spec) => match spec.criteria() {
                Some(criteria) => {
                    query.filter(criteria);
                    None
                }
                None => Some(spec),
            },
            None => None,
        };

        let sort_field = match sort {
            Some(sort) => sort.key.as_field().map(|field| Some((field, sort.order))),
            None => Some(None),
        };

        match (residual, sort_field) {
            (None, Some(sort_field)) => {
                match sort_field {
                    Some((field, order)) => query.order_by_field(field, order),
                    None => query.order_by_default(),
                }
                query.window(window);
                eval::select(self.query_documents(&query)?, None, None, None)
            }
            (residual, _) => {
                query.order_by_default();
                eval::select(self.query_documents(&query)?, residual, sort, Some(window))
            }
        }
    }

    fn apply_new(&self, record: &Record) -> BackendResult<()> {
        match self.write(
            "INSERT INTO aggregates (kind, key, body) VALUES (?1, ?2, ?3);",
            record,
        ) {
            Ok(_) => Ok(()),
            Err(BackendError::Db(err)) if err.is_unique_violation() => {
                Err(BackendError::DuplicateKey(record.identity.clone()))
            }
            Err(err) => Err(err),
        }
    }

    fn apply_modified(&self, record: &Record) -> BackendResult<()> {
        let changed = self.write(
            "UPDATE aggregates
             SET
                body = ?3,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE kind = ?1 AND key = ?2;",
            record,
        )?;
        if changed == 0 {
            return Err(BackendError::MissingRecord(record.identity.clone()));
        }
        Ok(())
    }

    fn apply_deleted(&self, record: &Record) -> BackendResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM aggregates WHERE kind = ?1 AND key = ?2;",
            params![record.kind(), record.key()],
        )?;
        if changed == 0 {
            return Err(BackendError::MissingRecord(record.identity.clone()));
        }
        Ok(())
    }

    fn begin_or_reuse(&self) -> BackendResult<()> {
        if self.conn.is_autocommit() {
            self.conn.execute_batch("BEGIN IMMEDIATE;")?;
        }
        Ok(())
    }

    fn commit(&self) -> BackendResult<()> {
        if self.conn.is_autocommit() {
            return Err(BackendError::NoActiveTransaction);
        }
        self.conn.execute_batch("COMMIT;")?;
        Ok(())
    }

    fn rollback(&self) -> BackendResult<()> {
        if !self.conn.is_autocommit() {
            self.conn.execute_batch("ROLLBACK;")?;
        }
        Ok(())
    }
}

/// `SELECT body` statement scoped to one aggregate kind.
struct SelectQuery {
    sql: String,
    params: Vec<SqlValue>,
}

impl SelectQuery {
    fn for_kind(kind: &str) -> Self {
        Self {
            sql: "SELECT body FROM aggregates WHERE kind = ?".to_string(),
            params: vec![SqlValue::Text(kind.to_string())],
        }
    }

    fn filter(&mut self, criteria: &Criteria) {
        self.sql.push_str(" AND ");
        push_criteria(criteria, &mut self.sql, &mut self.params);
    }

    fn order_by_default(&mut self) {
        self.sql.push_str(" ORDER BY seq ASC");
    }

    fn order_by_field(&mut self, field: &Field, order: SortOrder) {
        let direction = match order {
            SortOrder::Ascending => "ASC",
            SortOrder::Descending => "DESC",
        };
        self.sql.push_str(&format!(
            " ORDER BY json_extract(body, ?) {direction}, seq ASC"
        ));
        self.params.push(SqlValue::Text(field.json_path()));
    }

    fn limit(&mut self, limit: i64) {
        self.sql.push_str(" LIMIT ?");
        self.params.push(SqlValue::Integer(limit));
    }

    fn window(&mut self, window: PagingWindow) {
        self.limit(window.limit());
        self.sql.push_str(" OFFSET ?");
        self.params.push(SqlValue::Integer(window.offset()));
    }
}

fn push_criteria(criteria: &Criteria, sql: &mut String, params: &mut Vec<SqlValue>) {
    match criteria {
        Criteria::All => sql.push('1'),
        Criteria::Compare { field, op, value } => push_comparison(field, *op, value, sql, params),
        Criteria::IsNull(field) => {
            sql.push_str("(COALESCE(json_type(body, ?), 'null') = 'null')");
            params.push(SqlValue::Text(field.json_path()));
        }
        Criteria::NotNull(field) => {
            sql.push_str("(COALESCE(json_type(body, ?), 'null') <> 'null')");
            params.push(SqlValue::Text(field.json_path()));
        }
        Criteria::And(left, right) => push_binary(left, "AND", right, sql, params),
        Criteria::Or(left, right) => push_binary(left, "OR", right, sql, params),
        Criteria::Not(inner) => {
            sql.push_str("(NOT ");
            push_criteria(inner, sql, params);
            sql.push(')');
        }
    }
}

fn push_binary(
    left: &Criteria,
    joiner: &str,
    right: &Criteria,
    sql: &mut String,
    params: &mut Vec<SqlValue>,
) {
    sql.push('(');
    push_criteria(left, sql, params);
    sql.push_str(&format!(" {joiner} "));
    push_criteria(right, sql, params);
    sql.push(')');
}

// The type guard keeps every leaf non-NULL, so NOT/OR behave like the
// in-process two-valued evaluation.
fn push_comparison(
    field: &Field,
    op: Operator,
    value: &CriteriaValue,
    sql: &mut String,
    params: &mut Vec<SqlValue>,
) {
    // SQLite binds NaN as NULL; in process a NaN operand matches nothing.
    if matches!(value, CriteriaValue::Float(number) if number.is_nan()) {
        sql.push('0');
        return;
    }

    let path = field.json_path();
    let (types, bound) = match value {
        CriteriaValue::Bool(flag) => (NUMERIC_TYPES, SqlValue::Integer(i64::from(*flag))),
        CriteriaValue::Int(number) => (NUMERIC_TYPES, SqlValue::Integer(*number)),
        CriteriaValue::Float(number) => (NUMERIC_TYPES, SqlValue::Real(*number)),
        CriteriaValue::Text(text) => ("('text')", SqlValue::Text(text.clone())),
    };

    let comparison = match op {
        Operator::Eq => "json_extract(body, ?) = ?",
        Operator::Ne => "json_extract(body, ?) <> ?",
        Operator::Lt => "json_extract(body, ?) < ?",
        Operator::Le => "json_extract(body, ?) <= ?",
        Operator::Gt => "json_extract(body, ?) > ?",
        Operator::Ge => "json_extract(body, ?) >= ?",
        Operator::Contains => {
            if !matches!(value, CriteriaValue::Text(_)) {
                sql.push('0');
                return;
            }
            "instr(json_extract(body, ?), ?) > 0"
        }
    };

    sql.push_str(&format!(
        "(COALESCE(json_type(body, ?), 'null') IN {types} AND {comparison})"
    ));
    params.push(SqlValue::Text(path.clone()));
    params.push(SqlValue::Text(path));
    params.push(bound);
}

fn ensure_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected = latest_version();
    let actual = schema_version(conn)?;
    if actual != expected {
        return Err(RepoError::Configuration(format!(
            "sqlite session requires schema version {expected}, got {actual}"
        )));
    }

    let table_exists: bool = conn.query_row(
        "SELECT EXISTS(
            SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1
        );",
        [AGGREGATES_TABLE],
        |row| row.get(0),
    )?;
    if !table_exists {
        return Err(RepoError::Configuration(format!(
            "sqlite session requires table `{AGGREGATES_TABLE}`"
        )));
    }
    Ok(())
}
