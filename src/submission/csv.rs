//! Minimal RFC 4180 reader and writer.
//!
//! Submission exports are small, so the reader works on the whole text at
//! once. Quoted fields may contain separators, doubled quotes and newlines.

use super::SubmissionError;

/// One CSV record and the physical line it starts on (1-based).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Line of the record's first character.
    pub line: usize,
    /// Unquoted field values.
    pub fields: Vec<String>,
}

/// Splits CSV text into records of fields.
///
/// A leading UTF-8 BOM is ignored. Both `\n` and `\r\n` end records.
/// Quoted line breaks advance the line count, so later records keep their
/// true line numbers.
///
/// # Errors
///
/// Returns [`SubmissionError::UnterminatedQuote`] when a quoted field never closes.
pub fn parse_records(text: &str) -> Result<Vec<Record>, SubmissionError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut records = Vec::new();
    let mut record: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut quote_line = 0usize;
    let mut line = 1usize;
    let mut start_line = 1usize;
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        if in_quotes {
            match ch {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                '\n' => {
                    line += 1;
                    field.push('\n');
                }
                other => field.push(other),
            }
            continue;
        }

        match ch {
            '"' if field.is_empty() => {
                in_quotes = true;
                quote_line = line;
            }
            ',' => record.push(std::mem::take(&mut field)),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' => {
                record.push(std::mem::take(&mut field));
                records.push(Record {
                    line: start_line,
                    fields: std::mem::take(&mut record),
                });
                line += 1;
                start_line = line;
            }
            other => field.push(other),
        }
    }

    if in_quotes {
        return Err(SubmissionError::UnterminatedQuote { line: quote_line });
    }
    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        records.push(Record {
            line: start_line,
            fields: record,
        });
    }
    Ok(records)
}

/// Quotes a field when it contains a separator, quote, or line break.
#[must_use]
pub fn escape_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Joins fields into one CSV line (without terminator).
#[must_use]
pub fn format_record<S: AsRef<str>>(fields: &[S]) -> String {
    fields
        .iter()
        .map(|field| escape_field(field.as_ref()))
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_records_handles_quotes_and_embedded_newlines() {
        let text = "\u{feff}Film Name,Notes\r\n\"Midnight, Run\",\"line one\nline \"\"two\"\"\"\r\nSolo,plain\n";
        let records = parse_records(text).unwrap();
        let fields: Vec<Vec<String>> = records.into_iter().map(|r| r.fields).collect();
        assert_eq!(
            fields,
            vec![
                vec!["Film Name".to_string(), "Notes".to_string()],
                vec![
                    "Midnight, Run".to_string(),
                    "line one\nline \"two\"".to_string()
                ],
                vec!["Solo".to_string(), "plain".to_string()],
            ]
        );
    }

    #[test]
    fn test_parse_records_keeps_trailing_empty_fields_and_last_line() {
        let records = parse_records("a,b,\nc,,d").unwrap();
        assert_eq!(records[0].fields, vec!["a", "b", ""]);
        assert_eq!(records[1].fields, vec!["c", "", "d"]);
    }

    #[test]
    fn test_parse_records_tracks_start_line_across_quoted_newlines() {
        let text = "Film,Link\nA,\"one\ntwo\nthree\"\r\nB,x\n";
        let lines: Vec<usize> = parse_records(text).unwrap().iter().map(|r| r.line).collect();
        assert_eq!(lines, vec![1, 2, 5]);
    }

    #[test]
    fn test_parse_records_reports_unterminated_quote_line() {
        let err = parse_records("a,b\n\"open,c\n").unwrap_err();
        assert!(matches!(err, SubmissionError::UnterminatedQuote { line: 2 }));
    }

    #[test]
    fn test_format_record_quotes_only_when_needed() {
        assert_eq!(
            format_record(&["plain", "a,b", "say \"hi\"", ""]),
            "plain,\"a,b\",\"say \"\"hi\"\"\","
        );
    }
}
