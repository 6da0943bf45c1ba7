//! Shared types for weekly sales-chart records.
//!
//! A chart line moves through three shapes: [`ParsedFields`] (the positional
//! columns of one line), [`TitleMatch`] (the title split into a canonical
//! series key plus season/volume/part) and [`SalesRecord`] (both of those with
//! the chart date attached). [`Field`] names the export columns a record can
//! be flattened into.
//!
//! Numeric columns are `Option` throughout: a blank chart position is absent,
//! never zero.
//!
//! ```rust
//! use chart_types::{Field, SeriesId, TitleRule};
//!
//! assert_eq!(TitleRule::from_name("nth-season"), Some(TitleRule::NthSeason));
//! assert_eq!(Field::from_name("cumulativeSales"), Some(Field::CumulativeSales));
//! assert_eq!(SeriesId(3).to_string(), "3");
//! ```

use std::fmt;

use chrono::{Datelike, NaiveDate};

/// Per-run integer identity of a canonical series title.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct SeriesId(pub u32);

impl fmt::Display for SeriesId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Rules of the title cascade, in evaluation order.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum TitleRule {
    SeasonVolume,
    NthSeasonVolume,
    NthSeason,
    VolumePart,
    Volume,
    Part,
    Season,
    Fallback,
}

impl TitleRule {
    /// Every rule, most specific first.
    pub const ALL: [TitleRule; 8] = [
        TitleRule::SeasonVolume,
        TitleRule::NthSeasonVolume,
        TitleRule::NthSeason,
        TitleRule::VolumePart,
        TitleRule::Volume,
        TitleRule::Part,
        TitleRule::Season,
        TitleRule::Fallback,
    ];

    /// Stable diagnostic name of the rule.
    pub fn name(self) -> &'static str {
        match self {
            TitleRule::SeasonVolume => "season-volume",
            TitleRule::NthSeasonVolume => "nth-season-volume",
            TitleRule::NthSeason => "nth-season",
            TitleRule::VolumePart => "volume-part",
            TitleRule::Volume => "volume",
            TitleRule::Part => "part",
            TitleRule::Season => "season",
            TitleRule::Fallback => "fallback",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        TitleRule::ALL.into_iter().find(|rule| rule.name() == name)
    }
}

impl fmt::Display for TitleRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A title split into its series key and structured attributes.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TitleMatch {
    /// Lowercased, trimmed title with season/volume/part tokens removed.
    pub canonical_title: String,
    pub season: Option<u32>,
    pub volume: Option<u32>,
    pub part: Option<u32>,
    /// The cascade rule that produced this decomposition.
    pub rule: TitleRule,
}

/// Positional columns of one chart line after numeric coercion.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ParsedFields {
    pub rank: Option<u32>,
    pub prev_rank: Option<u32>,
    /// Third chart column; its meaning varies between chart sources.
    pub unknown: Option<u64>,
    pub sales: Option<u64>,
    pub cumulative_sales: Option<u64>,
    pub weeks: Option<u32>,
    /// Title text exactly as it appeared on the line (trimmed).
    pub raw_title: String,
}

/// One week of sales for one series, as owned by the aggregator.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SalesRecord {
    pub fields: ParsedFields,
    pub title: TitleMatch,
    /// Chart week, taken from the source file.
    pub date: NaiveDate,
    /// Set once, when the record is ingested.
    pub series_id: Option<SeriesId>,
}

impl SalesRecord {
    pub fn canonical_title(&self) -> &str {
        &self.title.canonical_title
    }

    pub fn year(&self) -> i32 {
        self.date.year()
    }

    pub fn month(&self) -> u32 {
        self.date.month()
    }

    pub fn day(&self) -> u32 {
        self.date.day()
    }

    /// Chart date as `YYYY/MM/DD`.
    pub fn date_stamp(&self) -> String {
        self.date.format("%Y/%m/%d").to_string()
    }

    /// Render one export column, or `None` when the record has no value for it.
    pub fn value(&self, field: Field) -> Option<String> {
        match field {
            Field::Rank => self.fields.rank.map(|v| v.to_string()),
            Field::PrevRank => self.fields.prev_rank.map(|v| v.to_string()),
            Field::Unknown => self.fields.unknown.map(|v| v.to_string()),
            Field::Sales => self.fields.sales.map(|v| v.to_string()),
            Field::CumulativeSales => self.fields.cumulative_sales.map(|v| v.to_string()),
            Field::Weeks => self.fields.weeks.map(|v| v.to_string()),
            Field::Title => Some(self.title.canonical_title.clone()),
            Field::Season => self.title.season.map(|v| v.to_string()),
            Field::Volume => self.title.volume.map(|v| v.to_string()),
            Field::Part => self.title.part.map(|v| v.to_string()),
            Field::Year => Some(self.year().to_string()),
            Field::Month => Some(self.month().to_string()),
            Field::Day => Some(self.day().to_string()),
            Field::Date => Some(self.date_stamp()),
            Field::Id => self.series_id.map(|id| id.to_string()),
        }
    }

    pub fn has(&self, field: Field) -> bool {
        self.value(field).is_some()
    }
}

/// Export column of the sales table.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Field {
    Rank,
    PrevRank,
    Unknown,
    Sales,
    CumulativeSales,
    Weeks,
    Title,
    Season,
    Volume,
    Part,
    Year,
    Month,
    Day,
    Date,
    Id,
}

impl Field {
    /// Every column in default export order.
    pub const ALL: [Field; 15] = [
        Field::Rank,
        Field::PrevRank,
        Field::Unknown,
        Field::Sales,
        Field::CumulativeSales,
        Field::Weeks,
        Field::Title,
        Field::Season,
        Field::Volume,
        Field::Part,
        Field::Year,
        Field::Month,
        Field::Day,
        Field::Date,
        Field::Id,
    ];

    /// Column header used in the sales table.
    pub fn name(self) -> &'static str {
        match self {
            Field::Rank => "rank",
            Field::PrevRank => "prevRank",
            Field::Unknown => "unknown",
            Field::Sales => "sales",
            Field::CumulativeSales => "cumulativeSales",
            Field::Weeks => "weeks",
            Field::Title => "title",
            Field::Season => "season",
            Field::Volume => "volume",
            Field::Part => "part",
            Field::Year => "year",
            Field::Month => "month",
            Field::Day => "day",
            Field::Date => "date",
            Field::Id => "id",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Field::ALL.into_iter().find(|field| field.name() == name)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
