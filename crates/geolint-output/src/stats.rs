//! Aggregate counters and their persistence.

use std::path::Path;

use geolint_model::{to_iso, Timestamp};
use rusqlite::{params, Connection};

use crate::error::{OutputError, Result};

/// Named counters in first-touch order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Counters {
    entries: Vec<(String, u64)>,
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&mut self, name: &str) -> &mut u64 {
        let pos = match self.entries.iter().position(|(n, _)| n == name) {
            Some(pos) => pos,
            None => {
                self.entries.push((name.to_string(), 0));
                self.entries.len() - 1
            }
        };
        &mut self.entries[pos].1
    }

    /// Make sure `name` is reported even if it stays zero.
    pub fn declare(&mut self, name: &str) {
        self.slot(name);
    }

    pub fn add(&mut self, name: &str, n: u64) {
        *self.slot(name) += n;
    }

    pub fn incr(&mut self, name: &str) {
        self.add(name, 1);
    }

    pub fn set(&mut self, name: &str, value: u64) {
        *self.slot(name) = value;
    }

    pub fn get(&self, name: &str) -> u64 {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map_or(0, |(_, v)| *v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> + '_ {
        self.entries.iter().map(|(n, v)| (n.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Append-only `stats` table keyed by the run's data timestamp.
pub struct StatsDb;

impl StatsDb {
    /// Append one row per counter, all dated `run_timestamp`.
    ///
    /// Nothing is appended if a counter does not fit the `INT64` column.
    pub fn write(path: &Path, run_timestamp: Timestamp, counters: &Counters) -> Result<()> {
        let mut conn = Connection::open(path)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS stats (
                 date TEXT,
                 key TEXT,
                 value INT64 DEFAULT 0
             );",
        )?;
        let date = to_iso(run_timestamp);
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare("INSERT INTO stats (date, key, value) VALUES (?1, ?2, ?3)")?;
            for (key, value) in counters.iter() {
                let stored = i64::try_from(value).map_err(|_| OutputError::CounterOverflow {
                    key: key.to_string(),
                    value,
                })?;
                stmt.execute(params![date, key, stored])?;
            }
        }
        tx.commit()?;
        tracing::info!(path = %path.display(), %date, rows = counters.len(), "wrote stats");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geolint_model::parse_timestamp;

    #[test]
    fn counters_keep_first_touch_order() {
        let mut counters = Counters::new();
        counters.declare("b");
        counters.incr("a");
        counters.add("b", 3);
        counters.set("a", 10);
        let all: Vec<(&str, u64)> = counters.iter().collect();
        assert_eq!(all, vec![("b", 3), ("a", 10)]);
        assert_eq!(counters.get("missing"), 0);
    }

    #[test]
    fn stats_rows_append_per_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.db");
        let mut counters = Counters::new();
        counters.set("orphan_nodes", 4);
        counters.declare("orphan_ways");

        let ts = parse_timestamp("2021-03-04T05:06:07Z").unwrap();
        StatsDb::write(&path, ts, &counters).unwrap();
        StatsDb::write(&path, ts, &counters).unwrap();

        let conn = Connection::open(&path).unwrap();
        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM stats", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 4);
        let (date, value): (String, i64) = conn
            .query_row(
                "SELECT date, value FROM stats WHERE key = 'orphan_nodes' LIMIT 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(date, "2021-03-04T05:06:07Z");
        assert_eq!(value, 4);
    }

    #[test]
    fn oversized_counter_fails_without_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.db");
        let mut counters = Counters::new();
        counters.set("nodes", 1);
        counters.set("huge", u64::MAX);

        let ts = parse_timestamp("2021-03-04T05:06:07Z").unwrap();
        let err = StatsDb::write(&path, ts, &counters).unwrap_err();
        assert!(matches!(
            err,
            OutputError::CounterOverflow { ref key, value } if key == "huge" && value == u64::MAX
        ));

        let conn = Connection::open(&path).unwrap();
        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM stats", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 0);
    }
}
