//! CSV rendering and artifact naming.

use std::borrow::Cow;

use time::OffsetDateTime;

use crate::pipeline::reconcile::ReportRow;

const CSV_HEADER: [&str; 8] = [
    "Test_Group",
    "Patient_Name",
    "age",
    "Date_of_test",
    "Test_Name",
    "Result",
    "Reference_Range",
    "Unit",
];

/// Render the flattened rows as CSV, header first, one line per test record.
///
/// Fields containing a comma, quote, or line break are quoted with internal quotes doubled.
/// An empty row set still produces the header line.
pub fn render_csv(rows: &[ReportRow]) -> String {
    let mut out = String::new();
    write_record(&mut out, &CSV_HEADER);
    for row in rows {
        write_record(
            &mut out,
            &[
                &row.test_group,
                &row.patient_name,
                &row.age,
                &row.date_of_test,
                &row.test_name,
                &row.result,
                &row.reference_range,
                &row.unit,
            ],
        );
    }
    out
}

/// Artifact key for the results CSV.
///
/// Follows the `<patient><date><stem>_results.csv` convention, with slashes stripped from the
/// report's test date so the key stays a single path segment. Falls back to today's `ddmmyyyy`
/// stamp when no test date was extracted.
pub fn csv_artifact_name(patient_name: &str, test_date: &str, stem: &str) -> String {
    let date = test_date.replace('/', "");
    let date = if date.is_empty() { today_stamp() } else { date };
    format!("{patient_name}{date}{stem}_results.csv")
}

fn write_record(out: &mut String, fields: &[&str]) {
    for (position, field) in fields.iter().enumerate() {
        if position > 0 {
            out.push(',');
        }
        out.push_str(&escape_field(field));
    }
    out.push('\n');
}

fn escape_field(field: &str) -> Cow<'_, str> {
    if field.contains(['"', ',', '\n', '\r']) {
        let mut quoted = String::with_capacity(field.len() + 2);
        quoted.push('"');
        for ch in field.chars() {
            if ch == '"' {
                quoted.push('"');
            }
            quoted.push(ch);
        }
        quoted.push('"');
        Cow::Owned(quoted)
    } else {
        Cow::Borrowed(field)
    }
}

fn today_stamp() -> String {
    let now = OffsetDateTime::now_utc();
    format!("{:02}{:02}{}", now.day(), u8::from(now.month()), now.year())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(test_name: &str, result: &str) -> ReportRow {
        ReportRow {
            test_group: "CBC".into(),
            patient_name: "Jane Doe".into(),
            age: "34".into(),
            date_of_test: "2024-01-01".into(),
            test_name: test_name.into(),
            result: result.into(),
            reference_range: "12-16".into(),
            unit: "g/dL".into(),
        }
    }

    #[test]
    fn empty_table_is_header_only() {
        let csv = render_csv(&[]);
        assert_eq!(
            csv,
            "Test_Group,Patient_Name,age,Date_of_test,Test_Name,Result,Reference_Range,Unit\n"
        );
    }

    #[test]
    fn rows_follow_the_header_in_order() {
        let csv = render_csv(&[row("Hemoglobin", "13.5"), row("Glucose", "95")]);
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[1],
            "CBC,Jane Doe,34,2024-01-01,Hemoglobin,13.5,12-16,g/dL"
        );
        assert_eq!(lines[2], "CBC,Jane Doe,34,2024-01-01,Glucose,95,12-16,g/dL");
    }

    #[test]
    fn awkward_fields_are_quoted() {
        let mut awkward = row("Cholesterol, total", "high \"borderline\"");
        awkward.unit = "mg/dL\nfasting".into();
        let csv = render_csv(&[awkward]);

        assert!(csv.contains("\"Cholesterol, total\""));
        assert!(csv.contains("\"high \"\"borderline\"\"\""));
        assert!(csv.contains("\"mg/dL\nfasting\""));
    }

    #[test]
    fn artifact_name_strips_slashes_from_date() {
        let name = csv_artifact_name("Jane Doe", "2024/01/01", "report");
        assert_eq!(name, "Jane Doe20240101report_results.csv");
    }

    #[test]
    fn artifact_name_falls_back_to_today() {
        let name = csv_artifact_name("", "", "report");
        let stamp = name
            .strip_suffix("report_results.csv")
            .expect("suffix present");
        assert_eq!(stamp.len(), 8);
        assert!(stamp.chars().all(|ch| ch.is_ascii_digit()));
    }
}
