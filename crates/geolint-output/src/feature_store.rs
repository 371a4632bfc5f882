//! Spatial feature store.
//!
//! One SQLite database per run. Every layer is a table with an integer
//! feature id, a WKT geometry column and a typed field schema; the
//! `geometry_columns` table records each layer's geometry type. The run is
//! written to `<path>.partial` in a single transaction with the journal
//! switched off, and [`FeatureStore::commit`] renames it to `<path>`. A run
//! that aborts leaves the previous store at `<path>` untouched.

use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection};

use crate::error::{OutputError, Result};
use crate::geometry::{Geometry, GeometryType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Integer,
    Real,
    Text,
    Bool,
}

impl FieldType {
    fn sql(self) -> &'static str {
        match self {
            FieldType::Integer | FieldType::Bool => "INTEGER",
            FieldType::Real => "REAL",
            FieldType::Text => "TEXT",
        }
    }

    fn describe(self) -> &'static str {
        match self {
            FieldType::Integer => "an integer",
            FieldType::Real => "a real",
            FieldType::Text => "text",
            FieldType::Bool => "a bool",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    pub name: String,
    pub ty: FieldType,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, ty: FieldType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Integer(i64),
    Real(f64),
    Text(String),
    Bool(bool),
}

impl FieldValue {
    fn matches(&self, ty: FieldType) -> bool {
        matches!(
            (self, ty),
            (FieldValue::Integer(_), FieldType::Integer)
                | (FieldValue::Real(_), FieldType::Real)
                | (FieldValue::Text(_), FieldType::Text)
                | (FieldValue::Bool(_), FieldType::Bool)
        )
    }

    fn into_sql(self) -> Value {
        match self {
            FieldValue::Integer(v) => Value::Integer(v),
            FieldValue::Real(v) => Value::Real(v),
            FieldValue::Text(v) => Value::Text(v),
            FieldValue::Bool(v) => Value::Integer(i64::from(v)),
        }
    }
}

/// Handle to a layer created in a [`FeatureStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LayerId(usize);

#[derive(Debug)]
struct Layer {
    name: String,
    geometry: GeometryType,
    fields: Vec<FieldDef>,
    insert_sql: String,
    features: u64,
}

pub struct FeatureStore {
    conn: Connection,
    path: PathBuf,
    partial: PathBuf,
    layers: Vec<Layer>,
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".partial");
    PathBuf::from(name)
}

impl FeatureStore {
    /// Start a fresh store for `path`. Any previous file there is replaced on
    /// commit.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let partial = partial_path(&path);
        if partial.exists() {
            fs::remove_file(&partial).map_err(|source| OutputError::Create {
                path: partial.clone(),
                source,
            })?;
        }
        let conn = Connection::open(&partial)?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "OFF", |row| row.get(0))?;
        conn.pragma_update(None, "synchronous", "OFF")?;
        tracing::trace!(%mode, "feature store journal mode");
        conn.execute_batch(
            "CREATE TABLE geometry_columns (
                 table_name TEXT PRIMARY KEY,
                 geometry_type TEXT NOT NULL
             );
             BEGIN;",
        )?;
        tracing::debug!(path = %partial.display(), "opened feature store");
        Ok(Self {
            conn,
            path,
            partial,
            layers: Vec::new(),
        })
    }

    pub fn create_layer(
        &mut self,
        name: &str,
        geometry: GeometryType,
        fields: Vec<FieldDef>,
    ) -> Result<LayerId> {
        if self.layers.iter().any(|l| l.name == name) {
            return Err(OutputError::DuplicateLayer(name.to_string()));
        }

        let mut columns = vec![
            "fid INTEGER PRIMARY KEY".to_string(),
            "geometry TEXT NOT NULL".to_string(),
        ];
        columns.extend(
            fields
                .iter()
                .map(|f| format!("{} {}", quote_ident(&f.name), f.ty.sql())),
        );
        self.conn.execute_batch(&format!(
            "CREATE TABLE {} ({});",
            quote_ident(name),
            columns.join(", ")
        ))?;
        self.conn.execute(
            "INSERT INTO geometry_columns (table_name, geometry_type) VALUES (?1, ?2)",
            params![name, geometry.as_str()],
        )?;

        let names: Vec<String> = std::iter::once("geometry".to_string())
            .chain(fields.iter().map(|f| quote_ident(&f.name)))
            .collect();
        let placeholders: Vec<String> = (1..=names.len()).map(|i| format!("?{i}")).collect();
        let insert_sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_ident(name),
            names.join(", "),
            placeholders.join(", ")
        );

        self.layers.push(Layer {
            name: name.to_string(),
            geometry,
            fields,
            insert_sql,
            features: 0,
        });
        Ok(LayerId(self.layers.len() - 1))
    }

    /// Append one feature. Values must match the layer's field schema.
    pub fn add_feature(
        &mut self,
        layer: LayerId,
        geometry: &Geometry,
        values: Vec<FieldValue>,
    ) -> Result<()> {
        let layer = &mut self.layers[layer.0];
        if geometry.geometry_type() != layer.geometry {
            return Err(OutputError::GeometryType {
                layer: layer.name.clone(),
                expected: layer.geometry.as_str(),
            });
        }
        if values.len() != layer.fields.len() {
            return Err(OutputError::FieldCount {
                layer: layer.name.clone(),
                expected: layer.fields.len(),
                found: values.len(),
            });
        }
        if let Some(field) = layer
            .fields
            .iter()
            .zip(&values)
            .find_map(|(field, value)| (!value.matches(field.ty)).then_some(field))
        {
            return Err(OutputError::FieldType {
                layer: layer.name.clone(),
                field: field.name.clone(),
                expected: field.ty.describe(),
            });
        }

        let row = std::iter::once(Value::Text(geometry.to_wkt()))
            .chain(values.into_iter().map(FieldValue::into_sql));
        let mut stmt = self.conn.prepare_cached(&layer.insert_sql)?;
        stmt.execute(params_from_iter(row))?;
        layer.features += 1;
        Ok(())
    }

    #[cfg(test)]
    fn feature_count(&self, layer: LayerId) -> u64 {
        self.layers[layer.0].features
    }

    /// Commit the run transaction, close the database and move it into place.
    pub fn commit(self) -> Result<()> {
        self.conn.execute_batch("COMMIT;")?;
        for layer in &self.layers {
            tracing::debug!(layer = %layer.name, features = layer.features, "closed layer");
        }
        self.conn.close().map_err(|(_, err)| OutputError::Sqlite(err))?;
        fs::rename(&self.partial, &self.path).map_err(|source| OutputError::Create {
            path: self.path.clone(),
            source,
        })?;
        tracing::debug!(path = %self.path.display(), "committed feature store");
        Ok(())
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
