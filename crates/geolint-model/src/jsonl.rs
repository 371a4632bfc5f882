//! JSON-lines entity files: one entity object per line.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::entity::{Entity, KindMask};
use crate::error::{ModelError, Result};
use crate::source::{EntityReader, EntitySource};

/// File-backed source. Each [`EntitySource::open`] re-reads the file from the start.
#[derive(Debug, Clone)]
pub struct JsonlSource {
    path: PathBuf,
    size: u64,
}

impl JsonlSource {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let size = std::fs::metadata(&path)?.len();
        Ok(Self { path, size })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

struct JsonlReader {
    input: BufReader<File>,
    kinds: KindMask,
    line: u64,
    offset: u64,
    buf: String,
}

impl JsonlReader {
    fn read_entity(&mut self) -> Result<Option<Entity>> {
        loop {
            self.buf.clear();
            let n = self.input.read_line(&mut self.buf)?;
            if n == 0 {
                return Ok(None);
            }
            self.offset += n as u64;
            self.line += 1;

            let text = self.buf.trim();
            if text.is_empty() {
                continue;
            }
            let entity: Entity =
                serde_json::from_str(text).map_err(|e| ModelError::Malformed {
                    line: self.line,
                    message: e.to_string(),
                })?;
            if self.kinds.contains(entity.kind()) {
                return Ok(Some(entity));
            }
        }
    }
}

impl Iterator for JsonlReader {
    type Item = Result<Entity>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_entity().transpose()
    }
}

impl EntityReader for JsonlReader {
    fn offset(&self) -> u64 {
        self.offset
    }
}

impl EntitySource for JsonlSource {
    fn open(&self, kinds: KindMask) -> Result<Box<dyn EntityReader + '_>> {
        let file = File::open(&self.path)?;
        Ok(Box::new(JsonlReader {
            input: BufReader::new(file),
            kinds,
            line: 0,
            offset: 0,
            buf: String::new(),
        }))
    }

    fn size_hint(&self) -> u64 {
        self.size
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Writes entities in the same format [`JsonlSource`] reads.
pub struct JsonlWriter {
    out: BufWriter<File>,
    path: PathBuf,
    written: u64,
}

impl JsonlWriter {
    /// Create (or truncate) `path`.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = File::create(&path)?;
        Ok(Self {
            out: BufWriter::new(file),
            path,
            written: 0,
        })
    }

    pub fn write(&mut self, entity: &Entity) -> Result<()> {
        serde_json::to_writer(&mut self.out, entity)?;
        self.out.write_all(b"\n")?;
        self.written += 1;
        Ok(())
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush buffered output. The writer stays usable afterwards.
    pub fn flush(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}
