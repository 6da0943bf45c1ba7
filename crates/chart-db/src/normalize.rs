use chart_titles::match_title;
use chart_types::{ParsedFields, SalesRecord};
use chrono::NaiveDate;
use tracing::info;

use crate::grammar::{ParseFailure, parse_line};

/// Target of the per-title rule trace; `RUST_LOG=info,title_rules=off` hides it.
pub const RULE_TRACE_TARGET: &str = "title_rules";

/// Coerce a chart count such as `1,234` or `12.000` into an integer.
///
/// Both `,` and `.` are grouping separators here, never decimal points.
pub fn coerce_count(raw: &str) -> Option<u64> {
    let digits: String = raw.chars().filter(|c| !matches!(c, ',' | '.')).collect();
    digits.parse().ok()
}

/// Attach the chart date and run the title cascade over the parsed line.
pub fn normalize(fields: ParsedFields, file_date: NaiveDate) -> SalesRecord {
    let title = match_title(&fields.raw_title.to_lowercase());
    info!(
        target: RULE_TRACE_TARGET,
        rule = %title.rule,
        title = %title.canonical_title,
        raw = %fields.raw_title,
        "title pattern used"
    );
    SalesRecord {
        fields,
        title,
        date: file_date,
        series_id: None,
    }
}

/// [`parse_line`] followed by [`normalize`].
pub fn parse_record(line: &str, file_date: NaiveDate) -> Result<SalesRecord, ParseFailure> {
    parse_line(line).map(|fields| normalize(fields, file_date))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use chart_types::TitleRule;
    use tracing::span::{Attributes, Id, Record};
    use tracing::{Event, Level, Metadata, Subscriber};

    #[derive(Clone, Default)]
    struct Events(Arc<Mutex<Vec<(String, Level)>>>);

    impl Subscriber for Events {
        fn enabled(&self, _: &Metadata<'_>) -> bool {
            true
        }
        fn new_span(&self, _: &Attributes<'_>) -> Id {
            Id::from_u64(1)
        }
        fn record(&self, _: &Id, _: &Record<'_>) {}
        fn record_follows_from(&self, _: &Id, _: &Id) {}
        fn event(&self, event: &Event<'_>) {
            let meta = event.metadata();
            self.0
                .lock()
                .unwrap()
                .push((meta.target().to_string(), *meta.level()));
        }
        fn enter(&self, _: &Id) {}
        fn exit(&self, _: &Id) {}
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2012, 11, 19).unwrap()
    }

    #[test]
    fn coerces_grouped_counts() {
        assert_eq!(coerce_count("1,234"), Some(1234));
        assert_eq!(coerce_count("12.000"), Some(12000));
        assert_eq!(coerce_count("7"), Some(7));
        assert_eq!(coerce_count(",."), None);
        assert_eq!(coerce_count(""), None);
    }

    #[test]
    fn normalizes_title_and_keeps_counts() {
        let record = parse_record("(1) 2 3 1,234 5,678 10 Foo Season 2 Vol.3", date()).unwrap();
        assert_eq!(record.canonical_title(), "foo");
        assert_eq!(record.title.season, Some(2));
        assert_eq!(record.title.volume, Some(3));
        assert_eq!(record.title.rule, TitleRule::SeasonVolume);
        assert_eq!(record.fields.raw_title, "Foo Season 2 Vol.3");
        assert_eq!(record.fields.sales, Some(1234));
        assert_eq!(record.fields.rank, Some(1));
        assert_eq!((record.year(), record.month(), record.day()), (2012, 11, 19));
        assert_eq!(record.series_id, None);
    }

    #[test]
    fn absent_fields_stay_absent() {
        let fields = ParsedFields {
            sales: Some(10),
            cumulative_sales: Some(20),
            weeks: Some(1),
            raw_title: "Just A Title".into(),
            ..ParsedFields::default()
        };
        let record = normalize(fields, date());
        assert_eq!(record.fields.rank, None);
        assert_eq!(record.fields.unknown, None);
        assert_eq!(record.canonical_title(), "just a title");
        assert_eq!(record.title.rule, TitleRule::Fallback);
    }

    #[test]
    fn rule_trace_is_visible_at_info() {
        let events = Events::default();
        tracing::subscriber::with_default(events.clone(), || {
            parse_record("1 2 3 10 20 1 Foo Part 2", date()).unwrap();
        });
        let seen = events.0.lock().unwrap();
        assert_eq!(*seen, vec![(RULE_TRACE_TARGET.to_string(), Level::INFO)]);
    }
}
