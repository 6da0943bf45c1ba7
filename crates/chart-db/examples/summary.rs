use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chart_db::{LoadMode, LoadOptions, SalesDb};
use chart_types::TitleRule;

fn main() -> Result<()> {
    let data_dir = env::args()
        .nth(1)
        .map(PathBuf::from)
        .context("usage: cargo run -p chart-db --example summary -- <path-to-chart-dir>")?;

    let mut db = SalesDb::new();
    let report = db
        .load_dir(
            &data_dir,
            LoadOptions {
                mode: LoadMode::Mmap,
                strict: false,
            },
        )
        .with_context(|| format!("loading charts from {}", data_dir.display()))?;

    println!("Charts       : {}", data_dir.display());
    println!("Files        : {}", report.files);
    println!("Lines        : {}", report.lines);
    println!("Records      : {}", report.records);
    println!("Skipped      : {}", report.skipped);
    println!("Series       : {}", db.series_count());
    for rule in TitleRule::ALL {
        println!("  {:<18} {}", rule.name(), report.rule_count(rule));
    }

    let mut series: Vec<_> = db.iter_series().collect();
    series.sort_by_key(|s| std::cmp::Reverse(s.total_sales()));
    println!("Top series by weekly sales:");
    for s in series.iter().take(10) {
        println!(
            "  [{}] {} ({} weeks charted, {} sold)",
            s.id,
            s.title,
            s.records.len(),
            s.total_sales()
        );
    }

    Ok(())
}
