use std::io::{self, Write};

use chart_types::{Field, SalesRecord, SeriesId};
use thiserror::Error;

const SEP: char = ',';

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("no sales records have been loaded yet")]
    NoRecords,
    #[error("failed to write export: {0}")]
    Io(#[from] io::Error),
}

/// Canonical title to series id, in first-seen order.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TitlesTable {
    pub rows: Vec<(String, SeriesId)>,
}

impl TitlesTable {
    /// Write `title,id` followed by one line per series.
    pub fn write_to<W: Write>(&self, mut w: W) -> io::Result<()> {
        writeln!(w, "title{SEP}id")?;
        for (title, id) in &self.rows {
            writeln!(w, "{}{SEP}{}", clean_cell(title), id)?;
        }
        Ok(())
    }
}

/// Flattened sales records restricted to a column set.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SalesTable {
    pub fields: Vec<Field>,
    pub rows: Vec<Vec<String>>,
}

impl SalesTable {
    pub(crate) fn build<'a>(
        fields: Vec<Field>,
        records: impl Iterator<Item = &'a SalesRecord>,
    ) -> Self {
        let rows = records.map(|record| sales_row(record, &fields)).collect();
        Self { fields, rows }
    }

    /// Write the header of field names, then one comma-joined line per record.
    pub fn write_to<W: Write>(&self, mut w: W) -> io::Result<()> {
        let header: Vec<&str> = self.fields.iter().map(|f| f.name()).collect();
        writeln!(w, "{}", header.join(","))?;
        for row in &self.rows {
            writeln!(w, "{}", row.join(","))?;
        }
        Ok(())
    }
}

fn sales_row(record: &SalesRecord, fields: &[Field]) -> Vec<String> {
    fields
        .iter()
        .map(|field| {
            record
                .value(*field)
                .map(|v| clean_cell(&v))
                .unwrap_or_default()
        })
        .collect()
}

// The tables are unquoted, so a separator inside a cell is dropped.
fn clean_cell(cell: &str) -> String {
    cell.replace(SEP, "")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn titles_strip_separator() {
        let table = TitlesTable {
            rows: vec![
                ("foo, the movie".into(), SeriesId(0)),
                ("bar".into(), SeriesId(1)),
            ],
        };
        let mut out = Vec::new();
        table.write_to(&mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "title,id\nfoo the movie,0\nbar,1\n"
        );
    }

    #[test]
    fn sales_table_writes_header_and_rows() {
        let table = SalesTable {
            fields: vec![Field::Title, Field::Sales],
            rows: vec![vec!["foo".into(), "12".into()], vec!["bar".into(), String::new()]],
        };
        let mut out = Vec::new();
        table.write_to(&mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "title,sales\nfoo,12\nbar,\n"
        );
    }
}
