//! Title cascade for weekly sales-chart entries.
//!
//! Chart titles carry their release structure inline ("Foo Season 2 Vol.3",
//! "Foo 2nd Season", "Foo Part 4"). [`match_title`] runs an ordered list of
//! patterns over the title and returns the first decomposition that applies:
//! a canonical series key plus whatever season/volume/part numbers the
//! winning rule captured.
//!
//! # How it works
//! 1. Try the seven structured rules, most specific first.
//! 2. Each rule is anchored at the start; the title capture is non-greedy, so
//!    it stops at the first marker that completes the rule.
//! 3. If nothing matched, the `fallback` rule keeps the whole string.
//!
//! The pattern table is compiled once per process and shared; matching has no
//! state of its own.
//!
//! # Example
//! ```rust
//! use chart_titles::match_title;
//! use chart_types::TitleRule;
//!
//! let m = match_title("foo season 2 vol.3");
//! assert_eq!(m.canonical_title, "foo");
//! assert_eq!((m.season, m.volume), (Some(2), Some(3)));
//! assert_eq!(m.rule, TitleRule::SeasonVolume);
//! ```

use std::sync::LazyLock;

use chart_types::{TitleMatch, TitleRule};
use regex::{Captures, Regex};

const SEASON: &str = r"season\s*(?P<season>[0-9]+)";
const NTH_SEASON: &str = r"(?P<season>[0-9])[a-z]{2}\s+season";
const NTH_SEASON_WIDE: &str = r"(?P<season>[0-9]{1,3})[a-z]{2}\s+season";
const VOLUME: &str = r"v(?:ol(?:ume)?)?\.*\s*#*(?P<volume>[0-9]+)";
const PART: &str = r"p(?:ar)?t\.?\s*#?(?P<part>[0-9]+)";

struct Pattern {
    rule: TitleRule,
    regex: Regex,
}

static CASCADE: LazyLock<Vec<Pattern>> = LazyLock::new(|| {
    rules()
        .into_iter()
        .map(|(rule, markers)| Pattern {
            rule,
            regex: Regex::new(&format!(r"(?i)^(?P<title>.*?)\s+{markers}"))
                .expect("title cascade patterns compile"),
        })
        .collect()
});

fn rules() -> [(TitleRule, String); 7] {
    [
        (TitleRule::SeasonVolume, format!(r"{SEASON}\s+{VOLUME}")),
        (
            TitleRule::NthSeasonVolume,
            format!(r"{NTH_SEASON}\s+{VOLUME}"),
        ),
        (TitleRule::NthSeason, NTH_SEASON_WIDE.to_string()),
        (TitleRule::VolumePart, format!(r"{VOLUME}\s+{PART}")),
        (TitleRule::Volume, VOLUME.to_string()),
        (TitleRule::Part, PART.to_string()),
        (TitleRule::Season, SEASON.to_string()),
    ]
}

/// Split a chart title into its canonical series key and structure.
///
/// Total over all inputs: when no structured rule applies the whole string
/// becomes the title under [`TitleRule::Fallback`].
pub fn match_title(raw_title: &str) -> TitleMatch {
    let title = raw_title.trim();
    for pattern in CASCADE.iter() {
        if let Some(caps) = pattern.regex.captures(title) {
            return TitleMatch {
                canonical_title: canonicalize(caps.name("title").map_or("", |m| m.as_str())),
                season: number(&caps, "season"),
                volume: number(&caps, "volume"),
                part: number(&caps, "part"),
                rule: pattern.rule,
            };
        }
    }

    TitleMatch {
        canonical_title: canonicalize(title),
        season: None,
        volume: None,
        part: None,
        rule: TitleRule::Fallback,
    }
}

fn number(caps: &Captures<'_>, group: &str) -> Option<u32> {
    caps.name(group).and_then(|m| m.as_str().parse().ok())
}

fn canonicalize(text: &str) -> String {
    text.trim().to_lowercase()
}
