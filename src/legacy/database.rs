use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags, Row};

use super::WorkOrderSource;
use crate::config::DatabaseConfig;
use crate::model::work_order::LegacyWorkOrder;

/// Column aliases the configured query must produce.
pub const COLUMNS: [&str; 16] = [
    "wo_num",
    "priority",
    "request_date",
    "summary",
    "requester",
    "assignee",
    "due_date",
    "modify_date",
    "dept",
    "wo_type",
    "subtype",
    "category",
    "technician",
    "description",
    "notes",
    "company",
];

/// Runs the configured query against the Track-It! database. A fresh
/// read-only connection is opened per fetch.
pub struct DatabaseSource {
    path: PathBuf,
    query: String,
}

impl DatabaseSource {
    pub fn new(config: &DatabaseConfig) -> Self {
        Self {
            path: config.path.clone(),
            query: config.query.clone(),
        }
    }

    fn fetch_blocking(path: &Path, query: &str) -> Result<Vec<LegacyWorkOrder>> {
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .with_context(|| format!("Failed to open work order database {}", path.display()))?;
        let mut stmt = conn
            .prepare(query)
            .context("Failed to prepare work order query")?;

        let names: Vec<String> = stmt.column_names().iter().map(|c| c.to_ascii_lowercase()).collect();
        let missing: Vec<&str> = COLUMNS
            .iter()
            .copied()
            .filter(|c| !names.iter().any(|n| n.as_str() == *c))
            .collect();
        if !missing.is_empty() {
            anyhow::bail!("Work order query is missing columns: {}", missing.join(", "));
        }
        let index = |name: &str| names.iter().position(|n| n.as_str() == name).unwrap_or_default();
        let columns: Vec<usize> = COLUMNS.iter().map(|c| index(*c)).collect();

        let rows = stmt
            .query_map([], |row| decode_row(row, &columns))
            .context("Failed to run work order query")?;
        let orders = rows
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read work order row")?;
        Ok(orders)
    }
}

fn text(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<String>> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Null => None,
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(f) => Some(f.to_string()),
        ValueRef::Text(t) => Some(String::from_utf8_lossy(t).to_string()),
        ValueRef::Blob(b) => Some(String::from_utf8_lossy(b).to_string()),
    })
}

fn decode_row(row: &Row<'_>, columns: &[usize]) -> rusqlite::Result<LegacyWorkOrder> {
    let col = |i: usize| text(row, columns[i]);
    Ok(LegacyWorkOrder {
        id: col(0)?.unwrap_or_default(),
        priority: col(1)?,
        request_date: col(2)?,
        summary: col(3)?,
        requester: col(4)?,
        assignee_username: col(5)?,
        due_date: col(6)?,
        modify_date: col(7)?,
        department: col(8)?,
        work_order_type: col(9)?,
        subtype: col(10)?,
        category: col(11)?,
        technician: col(12)?,
        description: col(13)?,
        notes: col(14)?,
        company: col(15)?,
    })
}

#[async_trait]
impl WorkOrderSource for DatabaseSource {
    async fn fetch_open(&self) -> Result<Vec<LegacyWorkOrder>> {
        let path = self.path.clone();
        let query = self.query.clone();
        tokio::task::spawn_blocking(move || Self::fetch_blocking(&path, &query))
            .await
            .context("Work order query task panicked")?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUERY: &str = "SELECT wo_num, priority, reqdate AS request_date, task AS summary, \
        request AS requester, respons AS assignee, duedate AS due_date, modidate AS modify_date, \
        dept, type AS wo_type, wotype2 AS subtype, wotype3 AS category, respons AS technician, \
        descript AS description, note AS notes, lookup1 AS company \
        FROM tasks WHERE status = 1 ORDER BY wo_num DESC";

    fn seed(path: &std::path::Path) {
        let conn = Connection::open(path).unwrap();
        conn.execute_batch(
            "CREATE TABLE tasks (
                wo_num, priority, reqdate, task, request, respons, duedate, modidate,
                dept, type, wotype2, wotype3, descript, note, lookup1, status
            );
            INSERT INTO tasks VALUES
                (52204, 'High', '2017-08-10', 'printer jam', 'Jane Doe', 'mtam', NULL, '2017-08-11',
                 'IT', 'Hardware', 'Printer Issue', 'Paper Feed', 'Tray 2', NULL, 'Acme Corp', 1),
                ('A17', 'Routine', '2017-08-09', 'bad id', 'John', 'mtam', NULL, NULL,
                 NULL, NULL, NULL, NULL, NULL, NULL, NULL, 1),
                (40000, 'High', '2017-01-01', 'closed', 'John', 'mtam', NULL, NULL,
                 NULL, NULL, NULL, NULL, NULL, NULL, NULL, 2);",
        )
        .unwrap();
    }

    #[tokio::test]
    async fn fetch_open_decodes_columns_by_name() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("trackit.db");
        seed(&db);

        let source = DatabaseSource::new(&DatabaseConfig {
            path: db,
            query: QUERY.into(),
        });
        let orders = source.fetch_open().await.unwrap();

        assert_eq!(orders.len(), 2);
        let first = orders.iter().find(|o| o.id == "52204").unwrap();
        assert_eq!(first.summary.as_deref(), Some("printer jam"));
        assert_eq!(first.assignee_username.as_deref(), Some("mtam"));
        assert_eq!(first.subtype.as_deref(), Some("Printer Issue"));
        assert_eq!(first.company.as_deref(), Some("Acme Corp"));
        assert_eq!(first.notes, None);
        assert!(orders.iter().any(|o| o.id == "A17"));
    }

    #[tokio::test]
    async fn fetch_open_rejects_query_missing_columns() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("trackit.db");
        seed(&db);

        let source = DatabaseSource::new(&DatabaseConfig {
            path: db,
            query: "SELECT wo_num, priority FROM tasks".into(),
        });
        let err = source.fetch_open().await.unwrap_err();
        assert!(err.to_string().contains("missing columns"));
        assert!(err.to_string().contains("summary"));
    }

    #[tokio::test]
    async fn fetch_open_fails_when_database_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let source = DatabaseSource::new(&DatabaseConfig {
            path: dir.path().join("absent.db"),
            query: QUERY.into(),
        });
        assert!(source.fetch_open().await.is_err());
    }
}
