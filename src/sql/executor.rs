//! Statement execution: the supported SQL subset mapped onto engine
//! primitives.
//!
//! Every mutating statement runs as one transaction, so a multi-row
//! INSERT or a broad UPDATE/DELETE is all-or-nothing. WHERE equality on
//! an indexed column goes through the secondary index; otherwise it
//! falls back to a full table scan.

use bytes::Bytes;
use sqlparser::ast::{
    Assignment, AssignmentTarget, BinaryOperator, Expr, FromTable, GroupByExpr, ObjectName,
    Query, Select, SelectItem, SetExpr, Statement, TableFactor, TableWithJoins, Value,
};
use tracing::debug;

use crate::codec::{self, Row};
use crate::engine::Engine;
use crate::error::{Result, StrataError};
use crate::sql::SqlOutcome;

/// Equality predicate from a WHERE clause
struct Filter {
    column: String,
    value: String,
}

pub(super) fn execute_statement(engine: &Engine, statement: &Statement) -> Result<SqlOutcome> {
    match statement {
        Statement::Query(query) => execute_select(engine, query),
        Statement::Insert(insert) => execute_insert(
            engine,
            &insert.table_name,
            &insert.columns,
            insert.source.as_deref(),
        ),
        Statement::Update {
            table,
            assignments,
            selection,
            ..
        } => execute_update(engine, table, assignments, selection.as_ref()),
        Statement::Delete(delete) => {
            let table = match &delete.from {
                FromTable::WithFromKeyword(tables) | FromTable::WithoutKeyword(tables) => {
                    single_table(tables)?
                }
            };
            execute_delete(engine, &table, delete.selection.as_ref())
        }
        Statement::CreateTable(create) => {
            engine.create_table(&object_name(&create.name))?;
            Ok(SqlOutcome::Affected(0))
        }
        Statement::CreateIndex(create) => {
            let column = match create.columns.as_slice() {
                [col] => identifier(&col.expr)?,
                _ => {
                    return Err(StrataError::SqlUnsupported(
                        "CREATE INDEX requires exactly one column".into(),
                    ))
                }
            };
            engine.create_index(&object_name(&create.table_name), &column)?;
            Ok(SqlOutcome::Affected(0))
        }
        other => Err(StrataError::SqlUnsupported(format!(
            "statement not supported: {}",
            other
        ))),
    }
}

// =============================================================================
// Statement Handlers
// =============================================================================

fn execute_select(engine: &Engine, query: &Query) -> Result<SqlOutcome> {
    if query.with.is_some() {
        return Err(StrataError::SqlUnsupported("WITH is not supported".into()));
    }
    if query.order_by.is_some() || query.limit.is_some() || query.offset.is_some() {
        return Err(StrataError::SqlUnsupported(
            "ORDER BY / LIMIT / OFFSET are not supported".into(),
        ));
    }

    let select = match query.body.as_ref() {
        SetExpr::Select(select) => select,
        _ => {
            return Err(StrataError::SqlUnsupported(
                "only plain SELECT queries are supported".into(),
            ))
        }
    };
    check_select_shape(select)?;

    let table = single_table(&select.from)?;
    let filter = parse_filter(select.selection.as_ref())?;
    let projection = parse_projection(&select.projection)?;

    let mut rows = matching_rows(engine, &table, filter.as_ref())?;
    if let Some(columns) = projection {
        for (_, row) in &mut rows {
            *row = row
                .iter()
                .filter(|(c, _)| columns.iter().any(|p| p == c))
                .map(|(c, v)| (c.to_string(), v.to_string()))
                .collect();
        }
    }

    debug!(table = %table, rows = rows.len(), "select executed");
    Ok(SqlOutcome::Rows(rows))
}

fn execute_insert(
    engine: &Engine,
    name: &ObjectName,
    columns: &[sqlparser::ast::Ident],
    source: Option<&Query>,
) -> Result<SqlOutcome> {
    let table = object_name(name);
    if columns.is_empty() {
        return Err(StrataError::SqlUnsupported(
            "INSERT requires an explicit column list; the first column is the primary key".into(),
        ));
    }
    let column_names: Vec<String> = columns.iter().map(|c| c.value.clone()).collect();

    let values = match source.map(|q| q.body.as_ref()) {
        Some(SetExpr::Values(values)) => values,
        _ => {
            return Err(StrataError::SqlUnsupported(
                "INSERT requires a VALUES list".into(),
            ))
        }
    };

    let mut tx = engine.begin_transaction();
    let mut inserted = 0;
    for exprs in &values.rows {
        if exprs.len() != column_names.len() {
            return Err(StrataError::InvalidArgument(format!(
                "INSERT row has {} values for {} columns",
                exprs.len(),
                column_names.len()
            )));
        }

        let mut row = Row::new();
        for (column, expr) in column_names.iter().zip(exprs) {
            row.set(column.clone(), literal(expr)?);
        }

        // The first listed column's value is the storage key
        let key = literal(&exprs[0])?;
        tx.insert(&table, key.as_bytes(), &codec::encode_row(&row)?)?;
        inserted += 1;
    }
    tx.commit()?;

    debug!(table = %table, rows = inserted, "insert executed");
    Ok(SqlOutcome::Affected(inserted))
}

fn execute_update(
    engine: &Engine,
    table: &TableWithJoins,
    assignments: &[Assignment],
    selection: Option<&Expr>,
) -> Result<SqlOutcome> {
    let table = single_table(std::slice::from_ref(table))?;
    let filter = parse_filter(selection)?;

    let mut changes = Vec::with_capacity(assignments.len());
    for assignment in assignments {
        let column = match &assignment.target {
            AssignmentTarget::ColumnName(name) => object_name(name),
            _ => {
                return Err(StrataError::SqlUnsupported(
                    "only simple column assignments are supported".into(),
                ))
            }
        };
        changes.push((column, literal(&assignment.value)?));
    }

    let rows = matching_rows(engine, &table, filter.as_ref())?;
    let mut tx = engine.begin_transaction();
    for (key, mut row) in rows.iter().cloned() {
        for (column, value) in &changes {
            row.set(column.clone(), value.clone());
        }
        // The storage key never changes, even when an assignment touches
        // the column the key was derived from
        tx.insert(&table, &key, &codec::encode_row(&row)?)?;
    }
    tx.commit()?;

    debug!(table = %table, rows = rows.len(), "update executed");
    Ok(SqlOutcome::Affected(rows.len()))
}

fn execute_delete(engine: &Engine, table: &str, selection: Option<&Expr>) -> Result<SqlOutcome> {
    let filter = parse_filter(selection)?;
    let keys = matching_keys(engine, table, filter.as_ref())?;

    let mut tx = engine.begin_transaction();
    for key in &keys {
        tx.delete(table, key)?;
    }
    tx.commit()?;

    debug!(table = %table, rows = keys.len(), "delete executed");
    Ok(SqlOutcome::Affected(keys.len()))
}

// =============================================================================
// Row Matching
// =============================================================================

/// Decodable rows matching the filter, in ascending key order.
///
/// Values written through the raw KV surface don't decode as rows and are
/// invisible to SELECT/UPDATE.
fn matching_rows(
    engine: &Engine,
    table: &str,
    filter: Option<&Filter>,
) -> Result<Vec<(Bytes, Row)>> {
    let mut rows = Vec::new();
    for (key, value) in candidates(engine, table, filter)? {
        if let Some(f) = filter {
            if !matches_filter(&key, &value, f) {
                continue;
            }
        }
        if let Ok(row) = codec::decode_row(&value) {
            rows.push((key, row));
        }
    }
    Ok(rows)
}

/// Keys matching the filter, in ascending order. Works on raw KV data too
/// since DELETE never needs a decoded row.
fn matching_keys(engine: &Engine, table: &str, filter: Option<&Filter>) -> Result<Vec<Bytes>> {
    let mut keys = Vec::new();
    for (key, value) in candidates(engine, table, filter)? {
        if let Some(f) = filter {
            if !matches_filter(&key, &value, f) {
                continue;
            }
        }
        keys.push(key);
    }
    Ok(keys)
}

/// Candidate (key, value) pairs: an index lookup when one covers the
/// filter column, otherwise a full scan.
fn candidates(
    engine: &Engine,
    table: &str,
    filter: Option<&Filter>,
) -> Result<Vec<(Bytes, Bytes)>> {
    if let Some(f) = filter {
        if engine.has_index(table, &f.column) {
            let mut out = Vec::new();
            for key in engine.index_lookup(table, &f.column, f.value.as_bytes())? {
                if let Some(value) = engine.get(table, &key)? {
                    out.push((key, value));
                }
            }
            return Ok(out);
        }
    }
    Ok(engine.scan(table)?.into_iter().collect())
}

fn matches_filter(key: &[u8], value: &[u8], filter: &Filter) -> bool {
    codec::extract_column(key, value, &filter.column)
        .map(|v| v == filter.value.as_bytes())
        .unwrap_or(false)
}

// =============================================================================
// AST Helpers
// =============================================================================

fn check_select_shape(select: &Select) -> Result<()> {
    if select.having.is_some() || select.distinct.is_some() {
        return Err(StrataError::SqlUnsupported(
            "HAVING / DISTINCT are not supported".into(),
        ));
    }
    if let GroupByExpr::Expressions(exprs, _) = &select.group_by {
        if !exprs.is_empty() {
            return Err(StrataError::SqlUnsupported(
                "GROUP BY is not supported".into(),
            ));
        }
    }
    Ok(())
}

/// Resolve a FROM list to exactly one plain table name
fn single_table(tables: &[TableWithJoins]) -> Result<String> {
    match tables {
        [TableWithJoins { relation, joins }] if joins.is_empty() => match relation {
            TableFactor::Table { name, .. } => Ok(object_name(name)),
            _ => Err(StrataError::SqlUnsupported(
                "only plain table references are supported".into(),
            )),
        },
        _ => Err(StrataError::SqlUnsupported(
            "exactly one table without joins is required".into(),
        )),
    }
}

/// Parse an optional WHERE clause into the single supported shape:
/// `column = literal`
fn parse_filter(selection: Option<&Expr>) -> Result<Option<Filter>> {
    let expr = match selection {
        Some(expr) => expr,
        None => return Ok(None),
    };
    match expr {
        Expr::BinaryOp {
            left,
            op: BinaryOperator::Eq,
            right,
        } => Ok(Some(Filter {
            column: identifier(left)?,
            value: literal(right)?,
        })),
        other => Err(StrataError::SqlUnsupported(format!(
            "WHERE clause not supported: {}",
            other
        ))),
    }
}

/// Parse the projection: `None` for `*`, otherwise the column names
fn parse_projection(items: &[SelectItem]) -> Result<Option<Vec<String>>> {
    if matches!(items, [SelectItem::Wildcard(_)]) {
        return Ok(None);
    }
    let mut columns = Vec::with_capacity(items.len());
    for item in items {
        match item {
            SelectItem::UnnamedExpr(expr) => columns.push(identifier(expr)?),
            _ => {
                return Err(StrataError::SqlUnsupported(
                    "only plain column projections are supported".into(),
                ))
            }
        }
    }
    Ok(Some(columns))
}

fn identifier(expr: &Expr) -> Result<String> {
    match expr {
        Expr::Identifier(ident) => Ok(ident.value.clone()),
        other => Err(StrataError::SqlUnsupported(format!(
            "expected a column name, found: {}",
            other
        ))),
    }
}

fn literal(expr: &Expr) -> Result<String> {
    match expr {
        Expr::Value(Value::SingleQuotedString(s)) => Ok(s.clone()),
        Expr::Value(Value::Number(n, _)) => Ok(n.clone()),
        other => Err(StrataError::SqlUnsupported(format!(
            "expected a string or numeric literal, found: {}",
            other
        ))),
    }
}

fn object_name(name: &ObjectName) -> String {
    name.0
        .last()
        .map(|ident| ident.value.clone())
        .unwrap_or_default()
}
