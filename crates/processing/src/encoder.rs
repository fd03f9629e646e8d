//! Result encoding: group totals back to CSV.

use std::io::Write;

use csv::{QuoteStyle, Terminator, WriterBuilder};

use crate::error::ProcessingError;
use crate::totals::GroupTotals;

/// Header line of every result artifact.
pub const OUTPUT_HEADER: [&str; 2] = ["Department Name", "Total Number of Sales"];

/// Write `totals` as CSV to `sink`, one line per group in iteration order.
///
/// Group values containing the delimiter, a quote or a line break are quoted
/// with inner quotes doubled; totals are plain base-10 integers. The only
/// possible failure is the sink itself.
pub fn encode<W: Write>(totals: &GroupTotals, sink: W) -> Result<(), ProcessingError> {
    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Necessary)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(sink);

    writer.write_record(OUTPUT_HEADER)?;
    for (group, total) in totals.iter() {
        writer.write_record([group, total.to_string().as_str()])?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use csv::ReaderBuilder;

    use super::*;

    fn render(totals: &GroupTotals) -> String {
        let mut out = Vec::new();
        encode(totals, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn writes_header_then_groups_in_order() {
        let totals: GroupTotals = [("Electronics", 250), ("Clothing", 200), ("Returns", -5)]
            .into_iter()
            .collect();
        assert_eq!(
            render(&totals),
            "Department Name,Total Number of Sales\nElectronics,250\nClothing,200\nReturns,-5\n"
        );
    }

    #[test]
    fn empty_totals_still_have_a_header() {
        assert_eq!(render(&GroupTotals::new()), "Department Name,Total Number of Sales\n");
    }

    #[test]
    fn escapes_delimiters_and_quotes() {
        let totals: GroupTotals = [("Sales, East", 5), ("The \"Best\", Dept", 1)]
            .into_iter()
            .collect();
        let text = render(&totals);
        assert!(text.contains("\"Sales, East\",5\n"));
        assert!(text.contains("\"The \"\"Best\"\", Dept\",1\n"));
    }

    #[test]
    fn encoded_output_reparses_to_the_same_pairs() {
        let totals: GroupTotals = [("Sales, East", 5), ("Plain", 42), ("Multi\nLine", 7)]
            .into_iter()
            .collect();
        let text = render(&totals);

        let mut reader = ReaderBuilder::new().from_reader(text.as_bytes());
        let headers = reader.headers().unwrap().clone();
        assert_eq!(headers.iter().collect::<Vec<_>>(), OUTPUT_HEADER.to_vec());

        let pairs: Vec<(String, i64)> = reader
            .records()
            .map(|r| {
                let r = r.unwrap();
                (r[0].to_string(), r[1].parse().unwrap())
            })
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("Sales, East".to_string(), 5),
                ("Plain".to_string(), 42),
                ("Multi\nLine".to_string(), 7),
            ]
        );
    }
}
