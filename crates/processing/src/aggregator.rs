//! Streaming per-group aggregation.
//!
//! Rows are read one at a time into a single reused buffer, so memory is bounded
//! by the number of distinct groups regardless of input size.
//!
//! Error policy:
//! - row-level defects (empty group, undecodable group, garbage measure) never
//!   abort the run; the row is skipped or its measure counts as zero
//! - I/O failures of the underlying source are fatal

use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::{ByteRecord, ReaderBuilder};
use tracing::{debug, info};

use crate::columns::{ColumnLayout, HeaderPolicy};
use crate::error::ProcessingError;
use crate::totals::GroupTotals;

/// Counters collected while aggregating.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregationStats {
    /// Data rows seen (the header row is not counted).
    pub rows_read: u64,
    /// Rows that did not contribute to any total.
    pub rows_skipped: u64,
    /// Whether the first row was consumed as a header.
    pub header_detected: bool,
}

/// Output of a completed aggregation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Aggregation {
    pub totals: GroupTotals,
    pub stats: AggregationStats,
}

/// Sums the measure column per group key.
#[derive(Debug, Clone, Copy, Default)]
pub struct Aggregator {
    policy: HeaderPolicy,
}

#[derive(Debug, PartialEq, Eq)]
enum RowOutcome {
    Counted,
    EmptyGroup,
    UndecodableGroup,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: HeaderPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> HeaderPolicy {
        self.policy
    }

    /// Aggregate the file at `path`.
    pub fn aggregate_path(&self, path: &Path) -> Result<Aggregation, ProcessingError> {
        let file = File::open(path).map_err(|source| ProcessingError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        self.aggregate(file)
    }

    /// Aggregate any delimited source, consuming it row by row.
    pub fn aggregate<R: Read>(&self, source: R) -> Result<Aggregation, ProcessingError> {
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(source);

        let mut record = ByteRecord::new();
        let mut totals = GroupTotals::new();
        let mut stats = AggregationStats::default();
        let mut resolved: Option<ColumnLayout> = None;

        loop {
            match reader.read_byte_record(&mut record) {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) if e.is_io_error() => return Err(ProcessingError::Read(e)),
                Err(e) => {
                    stats.rows_skipped += 1;
                    debug!(error = %e, "skipping unreadable row");
                    continue;
                }
            }

            let layout = match resolved {
                Some(layout) => layout,
                None => {
                    let layout = resolve_layout(&record, self.policy);
                    resolved = Some(layout);
                    stats.header_detected = layout.has_header;
                    debug!(?layout, "resolved column layout");
                    if layout.has_header {
                        continue;
                    }
                    layout
                }
            };

            stats.rows_read += 1;
            let outcome = accumulate_row(&record, layout, &mut totals);
            if outcome != RowOutcome::Counted {
                stats.rows_skipped += 1;
                debug!(row = stats.rows_read, reason = ?outcome, "skipping row");
            }
        }

        info!(
            rows = stats.rows_read,
            skipped = stats.rows_skipped,
            groups = totals.len(),
            "aggregation finished"
        );

        Ok(Aggregation { totals, stats })
    }
}

fn resolve_layout(record: &ByteRecord, policy: HeaderPolicy) -> ColumnLayout {
    let cells: Vec<_> = record.iter().map(String::from_utf8_lossy).collect();
    ColumnLayout::resolve(cells.iter().map(|c| c.as_ref()), policy)
}

fn accumulate_row(record: &ByteRecord, layout: ColumnLayout, totals: &mut GroupTotals) -> RowOutcome {
    let Some(raw_group) = layout.group.and_then(|idx| record.get(idx)) else {
        return RowOutcome::EmptyGroup;
    };
    let Ok(group) = std::str::from_utf8(raw_group) else {
        return RowOutcome::UndecodableGroup;
    };
    let group = group.trim();
    if group.is_empty() {
        return RowOutcome::EmptyGroup;
    }

    let amount = layout
        .measure
        .and_then(|idx| record.get(idx))
        .map_or(0, parse_measure);
    totals.add(group, amount);
    RowOutcome::Counted
}

/// Parse a measure cell leniently.
///
/// Everything except ASCII digits, `-` and `.` is discarded, then the leading
/// integer is taken (`"1,234.9"` -> 1234, `"$-50"` -> -50). Anything that does
/// not yield digits, or overflows, counts as zero.
pub fn parse_measure(raw: &[u8]) -> i64 {
    let cleaned: Vec<u8> = raw
        .iter()
        .copied()
        .filter(|b| b.is_ascii_digit() || *b == b'-' || *b == b'.')
        .collect();

    let (negative, rest) = match cleaned.split_first() {
        Some((b'-', rest)) => (true, rest),
        _ => (false, cleaned.as_slice()),
    };

    let value = rest
        .iter()
        .take_while(|b| b.is_ascii_digit())
        .try_fold(None::<i64>, |acc, b| {
            acc.unwrap_or(0)
                .checked_mul(10)?
                .checked_add(i64::from(b - b'0'))
                .map(Some)
        });

    match value {
        Some(Some(v)) if negative => -v,
        Some(Some(v)) => v,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use proptest::prelude::*;

    use super::*;

    fn run(input: &str) -> Aggregation {
        Aggregator::new().aggregate(input.as_bytes()).unwrap()
    }

    #[test]
    fn aggregates_totals_by_department() {
        let csv = "Department Name,Date, Number of Sales\n\
                   Electronics,2023-08-01,100\n\
                   Clothing,2023-08-01,200\n\
                   Electronics,2023-08-02,150\n";
        let result = run(csv);
        assert_eq!(result.totals.get("Electronics"), Some(250));
        assert_eq!(result.totals.get("Clothing"), Some(200));
        assert!(result.stats.header_detected);
        assert_eq!(result.stats.rows_read, 3);
    }

    #[test]
    fn groups_rows_in_first_seen_order() {
        let result = run("department,date,sales\ng1,d,10\ng2,d,20\ng1,d,15\n");
        let totals: Vec<_> = result.totals.iter().collect();
        assert_eq!(totals, vec![("g1", 25), ("g2", 20)]);
    }

    #[test]
    fn unparseable_measure_counts_as_zero() {
        let result = run("department,date,sales\ng1,d,abc\ng1,d,5\ng2,d,n/a\n");
        assert_eq!(result.totals.get("g1"), Some(5));
        assert_eq!(result.totals.get("g2"), Some(0));
        assert_eq!(result.stats.rows_skipped, 0);
    }

    #[test]
    fn empty_group_rows_are_skipped() {
        let result = run("department,date,sales\n   ,d,100\n,d,7\ng1,d,3\n");
        assert_eq!(result.totals.len(), 1);
        assert_eq!(result.totals.get("g1"), Some(3));
        assert_eq!(result.totals.get(""), None);
        assert_eq!(result.stats.rows_skipped, 2);
    }

    #[test]
    fn group_keys_are_trimmed_but_case_preserved() {
        let result = run("department,date,sales\n  Toys ,d,1\nToys,d,2\ntoys,d,4\n");
        assert_eq!(result.totals.get("Toys"), Some(3));
        assert_eq!(result.totals.get("toys"), Some(4));
    }

    #[test]
    fn headerless_input_uses_positional_schema() {
        let result = run("Electronics,2023-08-01,100\nClothing,2023-08-01,200\nElectronics,2023-08-02,1\n");
        assert!(!result.stats.header_detected);
        assert_eq!(result.totals.get("Electronics"), Some(101));
        assert_eq!(result.totals.get("Clothing"), Some(200));
    }

    #[test]
    fn absent_policy_aggregates_the_first_row_too() {
        let aggregator = Aggregator::with_policy(HeaderPolicy::Absent);
        let result = aggregator
            .aggregate("department,2023-01-01,9\ndepartment,2023-01-02,1\n".as_bytes())
            .unwrap();
        assert_eq!(result.totals.get("department"), Some(10));
    }

    #[test]
    fn short_and_long_rows_do_not_abort() {
        let result = run("department,date,sales\ng1\ng1,d,5,extra,cells\ng2,d\n");
        assert_eq!(result.totals.get("g1"), Some(5));
        assert_eq!(result.totals.get("g2"), Some(0));
    }

    #[test]
    fn undecodable_group_skips_only_that_row() {
        let mut input = b"department,date,sales\n".to_vec();
        input.extend_from_slice(b"\xff\xfe,d,100\n");
        input.extend_from_slice(b"g1,d,5\n");
        let result = Aggregator::new().aggregate(input.as_slice()).unwrap();
        assert_eq!(result.totals.len(), 1);
        assert_eq!(result.totals.get("g1"), Some(5));
        assert_eq!(result.stats.rows_skipped, 1);
    }

    #[test]
    fn quoted_group_with_delimiter_is_one_key() {
        let result = run("department,date,sales\n\"Sales, East\",d,5\n");
        assert_eq!(result.totals.get("Sales, East"), Some(5));
    }

    #[test]
    fn empty_input_yields_empty_totals() {
        let result = run("");
        assert!(result.totals.is_empty());
        assert_eq!(result.stats, AggregationStats::default());
    }

    #[test]
    fn parse_measure_is_lenient() {
        assert_eq!(parse_measure(b"100"), 100);
        assert_eq!(parse_measure(b" 1,234 "), 1234);
        assert_eq!(parse_measure(b"$-50"), -50);
        assert_eq!(parse_measure(b"12.9"), 12);
        assert_eq!(parse_measure(b"1-2"), 1);
        assert_eq!(parse_measure(b".5"), 0);
        assert_eq!(parse_measure(b"-"), 0);
        assert_eq!(parse_measure(b""), 0);
        assert_eq!(parse_measure(b"abc"), 0);
        assert_eq!(parse_measure(b"99999999999999999999999"), 0);
    }

    struct FailingReader {
        served: bool,
    }

    impl Read for FailingReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.served {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "disk went away"));
            }
            self.served = true;
            let chunk = b"department,date,sales\ng1,d,1\n";
            buf[..chunk.len()].copy_from_slice(chunk);
            Ok(chunk.len())
        }
    }

    #[test]
    fn source_io_failure_is_fatal() {
        let err = Aggregator::new()
            .aggregate(FailingReader { served: false })
            .unwrap_err();
        assert!(matches!(err, ProcessingError::Read(_)));
    }

    #[test]
    fn missing_file_is_fatal() {
        let err = Aggregator::new()
            .aggregate_path(Path::new("/definitely/not/here.csv"))
            .unwrap_err();
        assert!(matches!(err, ProcessingError::Open { .. }));
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 128,
            ..ProptestConfig::default()
        })]

        /// Property: every group's total equals the plain sum of its rows'
        /// measures, whatever the row order.
        #[test]
        fn totals_equal_naive_sums(
            rows in prop::collection::vec((0usize..5, -10_000i64..10_000), 0..200)
        ) {
            let groups = ["Toys", "Garden", "Sales, East", "toys", "Books"];
            let mut csv = String::from("Department Name,Date,Number of Sales\n");
            let mut expected = std::collections::HashMap::new();
            for (g, amount) in &rows {
                let name = groups[*g];
                let cell = if name.contains(',') { format!("\"{name}\"") } else { name.to_string() };
                csv.push_str(&format!("{cell},2024-01-01,{amount}\n"));
                *expected.entry(name).or_insert(0i64) += amount;
            }

            let result = Aggregator::new().aggregate(csv.as_bytes()).unwrap();
            prop_assert_eq!(result.totals.len(), expected.len());
            for (name, total) in expected {
                prop_assert_eq!(result.totals.get(name), Some(total));
            }
            prop_assert_eq!(result.stats.rows_read, rows.len() as u64);
        }
    }
}
