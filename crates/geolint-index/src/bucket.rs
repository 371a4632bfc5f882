//! Bucketed external-memory deduplication of point locations.
//!
//! Finding coordinates shared by two or more points cannot be done with one
//! global sort when the point count is in the billions. Instead every location
//! is appended to one of [`NUM_BUCKETS`] files chosen from the low bits of its
//! `x` coordinate. Equal locations always land in the same bucket, so each
//! bucket can be sorted and scanned on its own and working memory is bounded
//! by the largest bucket.
//!
//! The flow is a typestate:
//!
//! ```text
//! BucketedDedupIndex::extract(source, cutoff, config) -> ExtractedBuckets
//! ExtractedBuckets::resolve()                         -> (DuplicateLocations, ResolveStats)
//! ```
//!
//! ## Bucket file format (version 1, little endian)
//!
//! ```text
//! magic        [u8; 4]  "GLBK"
//! version      u16
//! record_size  u16      always 8
//! records      (x: i32, y: i32)*
//! ```

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use memmap2::Mmap;

use geolint_model::{for_each_entity, Cutoff, Entity, EntitySource, KindMask, Location, PassSummary};

use crate::error::{IndexError, Result};

pub const NUM_BUCKETS: usize = 256;

/// Locations buffered per bucket before they are appended to its file.
pub const DEFAULT_BUFFER_CAPACITY: usize = 512 * 1024;

const MAGIC: &[u8; 4] = b"GLBK";
const FORMAT_VERSION: u16 = 1;
const RECORD_SIZE: u16 = 8;
const HEADER_LEN: usize = 8;

/// Bucket a location belongs to. Only the low bits of `x` are used.
pub fn bucket_of(loc: Location) -> usize {
    (loc.x as u32 as usize) & (NUM_BUCKETS - 1)
}

fn bucket_path(dir: &Path, index: usize) -> PathBuf {
    dir.join(format!("locations_{index:02x}.dat"))
}

#[derive(Debug, Clone)]
pub struct DedupConfig {
    /// Directory the bucket files are created in.
    pub work_dir: PathBuf,
    pub buffer_capacity: usize,
}

impl DedupConfig {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
        }
    }

    pub fn with_buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity.max(1);
        self
    }
}

// ============================================================================
// Extraction
// ============================================================================

struct Bucket {
    path: PathBuf,
    writer: BufWriter<File>,
    buffer: Vec<Location>,
    entries: u64,
}

impl Bucket {
    fn create(path: PathBuf) -> Result<Self> {
        let file = File::create(&path).map_err(|e| IndexError::bucket(&path, e))?;
        let mut writer = BufWriter::new(file);
        write_header(&mut writer).map_err(|e| IndexError::bucket(&path, e))?;
        Ok(Self {
            path,
            writer,
            buffer: Vec::new(),
            entries: 0,
        })
    }

    fn flush_buffer(&mut self) -> Result<()> {
        for loc in self.buffer.drain(..) {
            write_record(&mut self.writer, loc).map_err(|e| IndexError::bucket(&self.path, e))?;
        }
        Ok(())
    }

    fn close(mut self) -> Result<BucketFile> {
        self.flush_buffer()?;
        self.writer
            .flush()
            .map_err(|e| IndexError::bucket(&self.path, e))?;
        Ok(BucketFile {
            path: self.path,
            entries: self.entries,
        })
    }
}

fn write_header(w: &mut impl Write) -> std::io::Result<()> {
    w.write_all(MAGIC)?;
    w.write_u16::<LittleEndian>(FORMAT_VERSION)?;
    w.write_u16::<LittleEndian>(RECORD_SIZE)?;
    Ok(())
}

fn write_record(w: &mut impl Write, loc: Location) -> std::io::Result<()> {
    w.write_i32::<LittleEndian>(loc.x)?;
    w.write_i32::<LittleEndian>(loc.y)?;
    Ok(())
}

/// Write handles for all buckets of one extraction pass.
///
/// Must be ended with either [`BucketSet::finish`] or [`BucketSet::discard`].
struct BucketSet {
    buckets: Vec<Bucket>,
    capacity: usize,
}

impl BucketSet {
    fn create(config: &DedupConfig) -> Result<Self> {
        fs::create_dir_all(&config.work_dir)
            .map_err(|e| IndexError::bucket(&config.work_dir, e))?;
        let mut buckets = Vec::with_capacity(NUM_BUCKETS);
        for index in 0..NUM_BUCKETS {
            match Bucket::create(bucket_path(&config.work_dir, index)) {
                Ok(bucket) => buckets.push(bucket),
                Err(err) => {
                    BucketSet {
                        buckets,
                        capacity: config.buffer_capacity,
                    }
                    .discard();
                    return Err(err);
                }
            }
        }
        Ok(Self {
            buckets,
            capacity: config.buffer_capacity,
        })
    }

    fn push(&mut self, loc: Location) -> Result<()> {
        let bucket = &mut self.buckets[bucket_of(loc)];
        bucket.buffer.push(loc);
        bucket.entries += 1;
        if bucket.buffer.len() >= self.capacity {
            bucket.flush_buffer()?;
        }
        Ok(())
    }

    /// Flush every buffer regardless of fill level and close all files.
    fn finish(self) -> Result<Vec<BucketFile>> {
        let mut files = Vec::with_capacity(NUM_BUCKETS);
        let mut buckets = self.buckets.into_iter();
        while let Some(bucket) = buckets.next() {
            match bucket.close() {
                Ok(file) => files.push(file),
                Err(err) => {
                    remove_quietly(files.iter().map(|f| f.path.as_path()));
                    let rest: Vec<Bucket> = buckets.collect();
                    remove_quietly(rest.iter().map(|b| b.path.as_path()));
                    return Err(err);
                }
            }
        }
        Ok(files)
    }

    /// Drop all buffered data and delete the bucket files.
    fn discard(self) {
        let paths: Vec<PathBuf> = self.buckets.into_iter().map(|b| b.path).collect();
        remove_quietly(paths.iter().map(PathBuf::as_path));
    }
}

fn remove_quietly<'a>(paths: impl Iterator<Item = &'a Path>) {
    for path in paths {
        if let Err(err) = fs::remove_file(path) {
            tracing::warn!(path = %path.display(), %err, "failed to remove bucket file");
        }
    }
}

/// A closed bucket file waiting for resolution.
#[derive(Debug)]
struct BucketFile {
    path: PathBuf,
    entries: u64,
}

/// Entry point of the dedup index.
pub struct BucketedDedupIndex;

impl BucketedDedupIndex {
    /// Stream the points of `source` admitted by `cutoff` into bucket files.
    ///
    /// Bucket files are removed again if the pass fails.
    pub fn extract<S>(source: &S, cutoff: &Cutoff, config: &DedupConfig) -> Result<ExtractedBuckets>
    where
        S: EntitySource + ?Sized,
    {
        let mut set = BucketSet::create(config)?;
        let mut points = 0u64;
        let scan = for_each_entity(source, KindMask::POINT, "extract locations", |entity| {
            if let Entity::Point(point) = entity {
                if cutoff.admits(point.timestamp) {
                    set.push(point.loc)?;
                    points += 1;
                }
            }
            Ok::<_, IndexError>(())
        });

        let summary = match scan {
            Ok(summary) => summary,
            Err(err) => {
                set.discard();
                return Err(err);
            }
        };
        let files = set.finish()?;
        tracing::info!(points, "extracted point locations into buckets");
        Ok(ExtractedBuckets {
            files,
            points,
            summary,
        })
    }
}

/// Bucket files written by [`BucketedDedupIndex::extract`].
#[derive(Debug)]
pub struct ExtractedBuckets {
    files: Vec<BucketFile>,
    points: u64,
    summary: PassSummary,
}

impl ExtractedBuckets {
    /// Points that passed the cutoff.
    pub fn points(&self) -> u64 {
        self.points
    }

    pub fn summary(&self) -> PassSummary {
        self.summary
    }

    /// Entry count of each bucket, in bucket order.
    pub fn bucket_entries(&self) -> impl Iterator<Item = u64> + '_ {
        self.files.iter().map(|f| f.entries)
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> + '_ {
        self.files.iter().map(|f| f.path.as_path())
    }

    /// Sort and scan each bucket in turn, deleting it afterwards.
    pub fn resolve(self) -> Result<(DuplicateLocations, ResolveStats)> {
        let mut stats = ResolveStats::default();
        let mut found = Vec::new();
        let mut files = self.files.into_iter();

        while let Some(file) = files.next() {
            let resolved = resolve_bucket(&file, &mut found);
            let removed = fs::remove_file(&file.path).map_err(|e| IndexError::bucket(&file.path, e));
            if let Err(err) = resolved.and(removed) {
                let rest: Vec<BucketFile> = files.collect();
                remove_quietly(rest.iter().map(|f| f.path.as_path()));
                return Err(err);
            }
            stats.buckets += 1;
            stats.entries += file.entries;
            stats.max_bucket_entries = stats.max_bucket_entries.max(file.entries);
        }

        // Equal locations share a bucket, so this is a no-op unless the
        // bucket function changes.
        found.sort_unstable();
        found.dedup();
        stats.duplicates = found.len() as u64;
        tracing::info!(
            duplicates = stats.duplicates,
            entries = stats.entries,
            max_bucket_entries = stats.max_bucket_entries,
            "resolved location buckets"
        );
        Ok((DuplicateLocations { locations: found }, stats))
    }

    /// Delete the bucket files without resolving them.
    pub fn discard(self) {
        remove_quietly(self.files.iter().map(|f| f.path.as_path()));
    }
}

/// Load one bucket, push each repeated location once onto `found`.
fn resolve_bucket(file: &BucketFile, found: &mut Vec<Location>) -> Result<u64> {
    let mut records = load_bucket(&file.path)?;
    if records.len() as u64 != file.entries {
        return Err(IndexError::BucketFormat {
            path: file.path.clone(),
            message: format!(
                "expected {} records, found {}",
                file.entries,
                records.len()
            ),
        });
    }
    records.sort_unstable();

    let before = found.len();
    for run in records.chunk_by(|a, b| a == b) {
        if run.len() > 1 {
            found.push(run[0]);
        }
    }
    tracing::debug!(
        path = %file.path.display(),
        entries = records.len(),
        duplicates = found.len() - before,
        "resolved bucket"
    );
    Ok(records.len() as u64)
}

fn load_bucket(path: &Path) -> Result<Vec<Location>> {
    let file = File::open(path).map_err(|e| IndexError::bucket(path, e))?;
    // SAFETY: bucket files are private to this process and not modified while
    // mapped.
    let mmap = unsafe { Mmap::map(&file) }.map_err(|e| IndexError::bucket(path, e))?;
    decode_records(path, &mmap)
}

fn decode_records(path: &Path, bytes: &[u8]) -> Result<Vec<Location>> {
    let corrupt = |message: String| IndexError::BucketFormat {
        path: path.to_path_buf(),
        message,
    };

    if bytes.len() < HEADER_LEN || &bytes[..4] != MAGIC {
        return Err(corrupt("missing bucket header".to_string()));
    }
    let version = LittleEndian::read_u16(&bytes[4..6]);
    if version != FORMAT_VERSION {
        return Err(corrupt(format!("unsupported format version {version}")));
    }
    let record_size = LittleEndian::read_u16(&bytes[6..8]) as usize;
    if record_size != RECORD_SIZE as usize {
        return Err(corrupt(format!("unexpected record size {record_size}")));
    }

    let body = &bytes[HEADER_LEN..];
    if body.len() % record_size != 0 {
        return Err(corrupt(format!("truncated record at byte {}", body.len())));
    }
    Ok(body
        .chunks_exact(record_size)
        .map(|rec| {
            Location::new(
                LittleEndian::read_i32(&rec[0..4]),
                LittleEndian::read_i32(&rec[4..8]),
            )
        })
        .collect())
}

// ============================================================================
// Results
// ============================================================================

/// Sorted, duplicate-free set of locations held by two or more points.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DuplicateLocations {
    locations: Vec<Location>,
}

impl DuplicateLocations {
    pub fn contains(&self, loc: Location) -> bool {
        self.locations.binary_search(&loc).is_ok()
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    pub fn as_slice(&self) -> &[Location] {
        &self.locations
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveStats {
    pub buckets: u64,
    pub entries: u64,
    /// Records held in memory at once is bounded by this.
    pub max_bucket_entries: u64,
    pub duplicates: u64,
}
