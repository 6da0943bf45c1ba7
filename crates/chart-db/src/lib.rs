//! Load weekly sales charts and group them into per-series histories.
//!
//! Each chart file is a ranked list of lines such as
//! `(1) 2 3 1,234 5,678 10 Foo Season 2 Vol.3`. This crate turns every line
//! into a [`SalesRecord`] (positional columns via [`parse_line`], title
//! decomposition via `chart-titles`), then files the record under its
//! canonical series title in a [`SalesDb`]. Series get integer ids in the
//! order they are first seen; ids live as long as the database and are not
//! persisted.
//!
//! # Features
//! - Positional line grammar tolerant of blank ranks and decorated numbers.
//! - Malformed lines are skipped with a `warn!` and never abort a load,
//!   unless [`LoadOptions::strict`] asks for fail-fast.
//! - Directory loading with the `YYYY-MM-DD-*` file naming convention and a
//!   runtime choice between mmap and owned buffers ([`LoadMode`]).
//! - Substring search, exact series lookup and tidy tabular export
//!   ([`SalesDb::titles_table`], [`SalesDb::export`], [`SalesDb::save`]).
//!
//! # Example
//! ```no_run
//! use chart_db::SalesDb;
//! use chart_types::Field;
//!
//! # fn main() -> anyhow::Result<()> {
//! let db = SalesDb::load("data")?;
//! for title in db.find("gundam") {
//!     let series = db.series_of(title)?;
//!     println!("{}: {} weeks, {} sold", title, series.records.len(), series.total_sales());
//! }
//! db.export(&[Field::Date, Field::Title, Field::Sales])?;
//! db.save("out/anime")?;
//! # Ok(()) }
//! ```
//!
//! For a runnable demo, see `cargo run -p chart-db --example summary -- <data-dir>`.

pub mod export;
pub mod grammar;
pub mod normalize;

use std::collections::HashMap;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chart_types::{Field, SalesRecord, SeriesId, TitleRule};
use chrono::NaiveDate;
use memmap2::Mmap;
use thiserror::Error;
use tracing::{info, warn};

pub use export::{ExportError, SalesTable, TitlesTable};
pub use grammar::{ParseFailure, parse_line};
pub use normalize::{RULE_TRACE_TARGET, coerce_count, normalize, parse_record};

/// Strategy for reading chart files.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LoadMode {
    /// Memory-map each chart file.
    Mmap,
    /// Read each chart file into an owned buffer.
    Owned,
}

/// How a directory load reads files and reacts to malformed lines.
#[derive(Clone, Copy, Debug)]
pub struct LoadOptions {
    pub mode: LoadMode,
    /// Abort on the first malformed line instead of skipping it.
    pub strict: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            mode: LoadMode::Mmap,
            strict: false,
        }
    }
}

/// Counters from one loading pass.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct LoadReport {
    pub files: usize,
    /// Non-blank lines seen.
    pub lines: usize,
    pub records: usize,
    pub skipped: usize,
    /// Records produced per cascade rule.
    pub rules: HashMap<TitleRule, usize>,
}

impl LoadReport {
    pub fn rule_count(&self, rule: TitleRule) -> usize {
        self.rules.get(&rule).copied().unwrap_or(0)
    }

    fn merge(&mut self, other: LoadReport) {
        self.files += other.files;
        self.lines += other.lines;
        self.records += other.records;
        self.skipped += other.skipped;
        for (rule, n) in other.rules {
            *self.rules.entry(rule).or_default() += n;
        }
    }
}

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("series not found: {0:?}")]
    UnknownSeries(String),
}

/// Borrowed view over the history of one series.
#[derive(Clone, Copy, Debug)]
pub struct SeriesHistory<'a> {
    pub id: SeriesId,
    pub title: &'a str,
    /// Records in ingestion order.
    pub records: &'a [SalesRecord],
}

impl<'a> SeriesHistory<'a> {
    /// Sum of the weekly sales figures that are present.
    pub fn total_sales(&self) -> u64 {
        self.records.iter().filter_map(|r| r.fields.sales).sum()
    }

    /// Most recently ingested record.
    pub fn latest(&self) -> Option<&'a SalesRecord> {
        self.records.last()
    }
}

enum Buffer {
    Mmap(Mmap),
    Owned(Vec<u8>),
}

impl Buffer {
    fn as_slice(&self) -> &[u8] {
        match self {
            Buffer::Mmap(m) => m.as_ref(),
            Buffer::Owned(v) => v.as_slice(),
        }
    }
}

/// Sales records grouped by canonical series title.
#[derive(Debug, Default)]
pub struct SalesDb {
    ids: HashMap<String, SeriesId>,
    titles: Vec<String>,
    histories: Vec<Vec<SalesRecord>>,
}

impl SalesDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every chart file below `root` with default options.
    ///
    /// `root` holds one directory per chart source; each file inside is named
    /// `YYYY-MM-DD-<anything>` and contributes one week of records.
    pub fn load(root: impl AsRef<Path>) -> Result<Self> {
        let mut db = Self::new();
        db.load_dir(root, LoadOptions::default())?;
        Ok(db)
    }

    /// Load chart files below `root` into this database.
    ///
    /// Sources and files are visited in name order, so files following the
    /// date naming convention are ingested chronologically per source. Plain
    /// files directly under `root` are loaded as well.
    pub fn load_dir(&mut self, root: impl AsRef<Path>, options: LoadOptions) -> Result<LoadReport> {
        let root = root.as_ref();
        let mut report = LoadReport::default();
        for entry in sorted_entries(root)? {
            if entry.is_dir() {
                info!("loading from {}", entry.display());
                for file in sorted_entries(&entry)? {
                    if file.is_file() {
                        report.merge(self.load_file(&file, options)?);
                    }
                }
            } else if entry.is_file() {
                report.merge(self.load_file(&entry, options)?);
            }
        }

        info!(
            files = report.files,
            lines = report.lines,
            records = report.records,
            skipped = report.skipped,
            series = self.series_count(),
            "load finished"
        );
        for rule in TitleRule::ALL {
            let n = report.rule_count(rule);
            if n > 0 {
                info!("title pattern {rule}: {n} records");
            }
        }
        Ok(report)
    }

    /// Load a single chart file whose name carries its chart date.
    pub fn load_file(&mut self, path: &Path, options: LoadOptions) -> Result<LoadReport> {
        let mut report = LoadReport::default();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let Some(date) = file_date_from_name(&name) else {
            warn!("skipping {}: name has no YYYY-MM-DD prefix", path.display());
            return Ok(report);
        };

        info!("parsing {}", path.display());
        let buffer = read_file(path, options.mode)?;
        report.files = 1;
        for (lineno, raw_line) in buffer.as_slice().split(|b| *b == b'\n').enumerate() {
            let line = match std::str::from_utf8(strip_cr(raw_line)) {
                Ok(line) => line,
                Err(err) => {
                    report.lines += 1;
                    report.skipped += 1;
                    if options.strict {
                        anyhow::bail!("{}:{} invalid utf-8: {err}", path.display(), lineno + 1);
                    }
                    warn!("{}:{} skipping line that is not utf-8", path.display(), lineno + 1);
                    continue;
                }
            };
            if let Err(err) = self.ingest_line(line, date, &mut report) {
                if options.strict {
                    return Err(err)
                        .with_context(|| format!("{}:{}", path.display(), lineno + 1));
                }
                warn!(
                    "could not read a line of sales data ({}:{}): {}",
                    path.display(),
                    lineno + 1,
                    err.line()
                );
            }
        }
        Ok(report)
    }

    /// Ingest the lines of one chart week, skipping malformed lines.
    pub fn ingest_lines<I, S>(&mut self, lines: I, date: NaiveDate) -> LoadReport
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut report = LoadReport::default();
        for line in lines {
            if let Err(err) = self.ingest_line(line.as_ref(), date, &mut report) {
                warn!("could not read a line of sales data: {}", err.line());
            }
        }
        report
    }

    fn ingest_line(
        &mut self,
        line: &str,
        date: NaiveDate,
        report: &mut LoadReport,
    ) -> Result<(), ParseFailure> {
        if line.trim().is_empty() {
            return Ok(());
        }
        report.lines += 1;
        match parse_record(line, date) {
            Ok(record) => {
                report.records += 1;
                *report.rules.entry(record.title.rule).or_default() += 1;
                self.ingest(record);
                Ok(())
            }
            Err(err) => {
                report.skipped += 1;
                Err(err)
            }
        }
    }

    /// File a record under its canonical title, assigning a new id on first sight.
    ///
    /// # Panics
    /// Series ids are `u32`; filing a new title once `u32::MAX + 1` series
    /// exist panics rather than reusing an id.
    pub fn ingest(&mut self, mut record: SalesRecord) -> SeriesId {
        let id = match self.ids.get(record.canonical_title()) {
            Some(id) => *id,
            None => {
                let id = next_series_id(self.titles.len())
                    .expect("series id space exhausted (more than u32::MAX series)");
                let title = record.canonical_title().to_string();
                self.ids.insert(title.clone(), id);
                self.titles.push(title);
                self.histories.push(Vec::new());
                id
            }
        };
        record.series_id = Some(id);
        self.histories[id.0 as usize].push(record);
        id
    }

    /// Titles containing `needle` anywhere, in first-seen order.
    pub fn find(&self, needle: &str) -> Vec<&str> {
        self.titles
            .iter()
            .filter(|title| title.contains(needle))
            .map(String::as_str)
            .collect()
    }

    /// Exact lookup of a canonical title.
    pub fn series_of(&self, title: &str) -> Result<SeriesHistory<'_>, LookupError> {
        match self.ids.get(title) {
            Some(id) => Ok(self.history(*id)),
            None => {
                warn!("the provided series could not be found: {title:?}");
                Err(LookupError::UnknownSeries(title.to_string()))
            }
        }
    }

    pub fn series_by_id(&self, id: SeriesId) -> Option<SeriesHistory<'_>> {
        if (id.0 as usize) < self.titles.len() {
            Some(self.history(id))
        } else {
            None
        }
    }

    /// Every series in first-seen order.
    pub fn iter_series(&self) -> impl Iterator<Item = SeriesHistory<'_>> + '_ {
        (0..self.titles.len()).map(|idx| self.history(SeriesId(idx as u32)))
    }

    /// `(title, id)` pairs in first-seen order.
    pub fn titles(&self) -> impl Iterator<Item = (&str, SeriesId)> + '_ {
        self.titles
            .iter()
            .enumerate()
            .map(|(idx, title)| (title.as_str(), SeriesId(idx as u32)))
    }

    pub fn series_count(&self) -> usize {
        self.titles.len()
    }

    pub fn record_count(&self) -> usize {
        self.histories.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.titles.is_empty()
    }

    pub fn titles_table(&self) -> TitlesTable {
        TitlesTable {
            rows: self
                .titles()
                .map(|(title, id)| (title.to_string(), id))
                .collect(),
        }
    }

    /// Flatten every record into rows limited to `fields`, in that order.
    ///
    /// An empty `fields` means the full record schema (`Field::ALL`).
    /// Values a record lacks are written as empty cells.
    pub fn export(&self, fields: &[Field]) -> Result<SalesTable, ExportError> {
        if self.record_count() == 0 {
            return Err(ExportError::NoRecords);
        }
        let fields = if fields.is_empty() {
            Field::ALL.to_vec()
        } else {
            fields.to_vec()
        };
        Ok(SalesTable::build(fields, self.histories.iter().flatten()))
    }

    /// Write `<prefix>.titles` and `<prefix>.sales` with the default columns.
    pub fn save(&self, prefix: impl AsRef<Path>) -> Result<(), ExportError> {
        let sales = self.export(&[])?;
        let titles = self.titles_table();

        let prefix = prefix.as_ref();
        let mut out = BufWriter::new(File::create(with_suffix(prefix, ".titles"))?);
        titles.write_to(&mut out)?;
        out.flush()?;

        let mut out = BufWriter::new(File::create(with_suffix(prefix, ".sales"))?);
        sales.write_to(&mut out)?;
        out.flush()?;

        info!(
            "exported {} series and {} records to {}.*",
            titles.rows.len(),
            sales.rows.len(),
            prefix.display()
        );
        Ok(())
    }

    fn history(&self, id: SeriesId) -> SeriesHistory<'_> {
        let idx = id.0 as usize;
        SeriesHistory {
            id,
            title: &self.titles[idx],
            records: &self.histories[idx],
        }
    }
}

/// Id for the series filed after `count` others, if it fits in a `u32`.
fn next_series_id(count: usize) -> Option<SeriesId> {
    u32::try_from(count).ok().map(SeriesId)
}

/// Chart date from a `YYYY-MM-DD-*` (or `YYYY-MM-DD.ext`) file name.
pub fn file_date_from_name(name: &str) -> Option<NaiveDate> {
    let mut parts = name.splitn(4, '-');
    let year = parts.next()?;
    let month = parts.next()?;
    let day = parts.next()?.split('.').next()?;
    NaiveDate::parse_from_str(&format!("{year}-{month}-{day}"), "%Y-%m-%d").ok()
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = fs::read_dir(dir)
        .with_context(|| format!("read dir {}", dir.display()))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()
        .with_context(|| format!("list {}", dir.display()))?;
    entries.retain(|path| {
        !path
            .file_name()
            .is_some_and(|n| n.to_string_lossy().starts_with('.'))
    });
    entries.sort();
    Ok(entries)
}

fn read_file(path: &Path, mode: LoadMode) -> Result<Buffer> {
    match mode {
        LoadMode::Mmap => {
            let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
            unsafe { Mmap::map(&file) }
                .map(Buffer::Mmap)
                .with_context(|| format!("mmap {}", path.display()))
        }
        LoadMode::Owned => {
            let mut file = File::open(path).with_context(|| format!("open {}", path.display()))?;
            let mut buf = Vec::new();
            file.read_to_end(&mut buf)
                .with_context(|| format!("read {}", path.display()))?;
            Ok(Buffer::Owned(buf))
        }
    }
}

fn strip_cr(line: &[u8]) -> &[u8] {
    line.strip_suffix(b"\r").unwrap_or(line)
}

fn with_suffix(prefix: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(prefix.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn week(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2013, 1, day).unwrap()
    }

    #[test]
    fn reads_dates_from_file_names() {
        assert_eq!(file_date_from_name("2013-01-07-oricon.txt"), Some(week(7)));
        assert_eq!(file_date_from_name("2013-01-14.txt"), Some(week(14)));
        assert_eq!(file_date_from_name("notes.txt"), None);
        assert_eq!(file_date_from_name("2013-13-01-bad"), None);
    }

    #[test]
    fn assigns_ids_in_first_seen_order() {
        let mut db = SalesDb::new();
        db.ingest_lines(
            [
                "1 2 3 1,000 5,000 4 Foo Vol.2",
                "2 3 4 900 4,000 4 Foo Bar",
                "3 4 5 800 3,000 4 Foobar Part 1",
            ],
            week(7),
        );
        db.ingest_lines(["1 1 1 700 5,700 5 Foo Vol.3"], week(14));

        let titles: Vec<_> = db.titles().collect();
        assert_eq!(
            titles,
            vec![
                ("foo", SeriesId(0)),
                ("foo bar", SeriesId(1)),
                ("foobar", SeriesId(2))
            ]
        );
        assert_eq!(db.series_of("foo").unwrap().records.len(), 2);
        assert_eq!(db.record_count(), 4);
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn series_ids_never_wrap() {
        assert_eq!(next_series_id(0), Some(SeriesId(0)));
        assert_eq!(next_series_id(u32::MAX as usize), Some(SeriesId(u32::MAX)));
        assert_eq!(next_series_id(u32::MAX as usize + 1), None);
    }

    #[test]
    fn find_is_substring_in_insertion_order() {
        let mut db = SalesDb::new();
        db.ingest_lines(
            [
                "1 2 3 10 10 1 Zeta Foo",
                "2 3 4 10 10 1 Foo",
                "3 4 5 10 10 1 Alpha",
            ],
            week(7),
        );
        assert_eq!(db.find("foo"), vec!["zeta foo", "foo"]);
        assert_eq!(db.find("Foo"), Vec::<&str>::new());
        assert_eq!(db.find("").len(), 3);
    }

    #[test]
    fn unknown_series_is_an_error() {
        let db = SalesDb::new();
        let err = db.series_of("missing").unwrap_err();
        assert!(matches!(err, LookupError::UnknownSeries(ref t) if t == "missing"));
        assert!(db.series_by_id(SeriesId(0)).is_none());
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let mut db = SalesDb::new();
        let report = db.ingest_lines(
            [
                "1 2 3 abc 5,678 10 Foo",
                "",
                "2 3 4 1,234 5,678 10 Bar",
            ],
            week(7),
        );
        assert_eq!(report.lines, 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.records, 1);
        assert_eq!(db.find(""), vec!["bar"]);
    }

    #[test]
    fn export_requires_records() {
        let db = SalesDb::new();
        assert!(matches!(db.export(&[]), Err(ExportError::NoRecords)));
    }

    #[test]
    fn default_columns_cover_every_field() {
        let mut db = SalesDb::new();
        db.ingest_lines(
            ["   1,234 5,678 10 Foo", "1 2 3 10 20 1 Bar Vol.2 Part 3"],
            week(7),
        );
        let table = db.export(&[]).unwrap();
        assert_eq!(table.fields, Field::ALL.to_vec());
        assert_eq!(
            table.rows[0],
            vec![
                "", "", "", "1234", "5678", "10", "foo", "", "", "", "2013", "1", "7",
                "2013/01/07", "0"
            ]
        );
        assert_eq!(
            table.rows[1],
            vec![
                "1", "2", "3", "10", "20", "1", "bar", "", "2", "3", "2013", "1", "7",
                "2013/01/07", "1"
            ]
        );
    }

    #[test]
    fn explicit_columns_keep_caller_order() {
        let mut db = SalesDb::new();
        db.ingest_lines(["(1) 2 3 1,234 5,678 10 Foo Vol.1"], week(7));
        let table = db
            .export(&[Field::Title, Field::Rank, Field::Volume, Field::Part])
            .unwrap();
        assert_eq!(table.rows, vec![vec!["foo", "1", "1", ""]]);
    }

    #[test]
    fn total_sales_sums_history() {
        let mut db = SalesDb::new();
        db.ingest_lines(["1 2 3 1,000 1,000 1 Foo"], week(7));
        db.ingest_lines(["1 1 3 500 1,500 2 Foo"], week(14));
        let series = db.series_of("foo").unwrap();
        assert_eq!(series.total_sales(), 1500);
        assert_eq!(series.latest().and_then(|r| r.fields.weeks), Some(2));
    }
}
