//! Column resolution for the grouping and measure columns.
//!
//! Matching is a best-effort heuristic: every header cell is normalized
//! (whitespace removed, lowercased) and the **first** header containing the
//! keyword wins. An unrelated column such as `"Presales Notes"` placed before
//! the real measure column will be picked instead of it.

/// Keyword identifying the grouping column.
pub const GROUP_KEYWORD: &str = "department";

/// Keyword identifying the measure column.
pub const MEASURE_KEYWORD: &str = "sales";

/// How the first row of the input is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HeaderPolicy {
    /// First row is a header row if any cell matches a keyword, otherwise data.
    #[default]
    Detect,
    /// First row is always a header row, even if nothing matches.
    Present,
    /// There is no header row; the positional `group, date, measure` schema applies.
    Absent,
}

/// Resolved positions of the columns the aggregator reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnLayout {
    pub group: Option<usize>,
    pub measure: Option<usize>,
    /// Whether the row the layout was resolved from is a header (and must not be aggregated).
    pub has_header: bool,
}

impl ColumnLayout {
    /// Fixed schema for headerless input: `group, date, measure`.
    pub const POSITIONAL: Self = Self {
        group: Some(0),
        measure: Some(2),
        has_header: false,
    };

    /// Resolve the layout from the first row under the given policy.
    pub fn resolve<'a, I>(first_row: I, policy: HeaderPolicy) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        if policy == HeaderPolicy::Absent {
            return Self::POSITIONAL;
        }

        let mut group = None;
        let mut measure = None;
        for (idx, cell) in first_row.into_iter().enumerate() {
            let key = normalize_header(cell);
            if group.is_none() && key.contains(GROUP_KEYWORD) {
                group = Some(idx);
            }
            if measure.is_none() && key.contains(MEASURE_KEYWORD) {
                measure = Some(idx);
            }
        }

        let matched = group.is_some() || measure.is_some();
        if matched || policy == HeaderPolicy::Present {
            Self {
                group,
                measure,
                has_header: true,
            }
        } else {
            Self::POSITIONAL
        }
    }
}

/// Normalize a header cell so `"Department Name"` and `"departmentname"` compare equal.
pub fn normalize_header(cell: &str) -> String {
    cell.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_whitespace_and_case() {
        assert_eq!(normalize_header(" Number of\tSales "), "numberofsales");
        assert_eq!(normalize_header("DEPARTMENT Name"), "departmentname");
    }

    #[test]
    fn detects_headers_by_substring() {
        let layout = ColumnLayout::resolve(
            ["Date", "Department Name", " Number of Sales"],
            HeaderPolicy::Detect,
        );
        assert_eq!(
            layout,
            ColumnLayout {
                group: Some(1),
                measure: Some(2),
                has_header: true
            }
        );
    }

    #[test]
    fn first_matching_header_wins() {
        let layout = ColumnLayout::resolve(
            ["Presales Notes", "Department", "Sales"],
            HeaderPolicy::Detect,
        );
        assert_eq!(layout.measure, Some(0));
        assert_eq!(layout.group, Some(1));
    }

    #[test]
    fn no_match_falls_back_to_positional_schema() {
        let layout = ColumnLayout::resolve(["Electronics", "2023-08-01", "100"], HeaderPolicy::Detect);
        assert_eq!(layout, ColumnLayout::POSITIONAL);
    }

    #[test]
    fn partial_match_still_counts_as_header() {
        let layout = ColumnLayout::resolve(["Department", "Date", "Units"], HeaderPolicy::Detect);
        assert_eq!(layout.group, Some(0));
        assert_eq!(layout.measure, None);
        assert!(layout.has_header);
    }

    #[test]
    fn explicit_policies_override_detection() {
        let absent = ColumnLayout::resolve(["Department", "Date", "Sales"], HeaderPolicy::Absent);
        assert_eq!(absent, ColumnLayout::POSITIONAL);

        let present = ColumnLayout::resolve(["a", "b", "c"], HeaderPolicy::Present);
        assert!(present.has_header);
        assert_eq!(present.group, None);
        assert_eq!(present.measure, None);
    }
}
