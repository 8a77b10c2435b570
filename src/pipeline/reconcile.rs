//! Tolerant reconciliation of model replies into tabular rows.
//!
//! The model is asked for strict JSON but routinely wraps it in prose or markdown fences, so
//! the reconciler treats everything between the first `{` and the last `}` of a reply as the
//! payload. A reply with no braces, or whose payload does not parse, contributes zero rows and
//! is counted, never fatal. Missing fields inside a parsed payload default to empty strings.

use serde::Deserialize;

use crate::llm::ModelResponse;

/// A single test result within a group, as emitted by the structured-extraction schema.
#[derive(Debug, Clone, Deserialize)]
pub struct TestRecord {
    /// Name of the individual test.
    #[serde(default)]
    pub test_name: String,
    /// Measured result value, kept verbatim.
    #[serde(default)]
    pub result: String,
    /// Reference range printed on the report, when present.
    #[serde(default)]
    pub reference_range: String,
    /// Unit of measurement, when present.
    #[serde(default)]
    pub unit: String,
}

/// One test group together with the patient metadata shared by its records.
#[derive(Debug, Clone, Deserialize)]
pub struct TestGroup {
    /// Group heading, e.g. "Complete Blood Count".
    #[serde(default)]
    pub group_name: String,
    /// Patient name printed with the group.
    #[serde(default)]
    pub name: String,
    /// Sample collection date.
    #[serde(default)]
    pub date: String,
    /// Patient age.
    #[serde(default)]
    pub age: String,
    /// Ordered test records belonging to the group.
    #[serde(default)]
    pub tests: Vec<TestRecord>,
}

#[derive(Debug, Default, Deserialize)]
struct ExtractionPayload {
    #[serde(default)]
    test_groups: Vec<TestGroup>,
}

/// Flattened table row carrying its parent group's patient metadata.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ReportRow {
    /// Group the test belongs to.
    pub test_group: String,
    /// Patient name denormalized from the group.
    pub patient_name: String,
    /// Patient age denormalized from the group.
    pub age: String,
    /// Sample collection date denormalized from the group.
    pub date_of_test: String,
    /// Name of the individual test.
    pub test_name: String,
    /// Measured result value.
    pub result: String,
    /// Reference range, possibly empty.
    pub reference_range: String,
    /// Unit of measurement, possibly empty.
    pub unit: String,
}

/// Aggregate result of reconciling a batch of replies.
///
/// Rows appear in reply order, then group order, then test order. The last successfully parsed
/// group's patient name and date are retained for artifact naming only; when chunking splits a
/// report across replies, the last reply wins, which can misattribute the identity of
/// multi-patient reports.
#[derive(Debug, Default)]
pub struct Reconciliation {
    /// Flattened rows across all parseable replies.
    pub rows: Vec<ReportRow>,
    /// Patient name of the last successfully parsed group.
    pub last_patient_name: String,
    /// Test date of the last successfully parsed group.
    pub last_test_date: String,
    /// Replies that contributed zero rows due to missing or malformed JSON.
    pub skipped_responses: usize,
}

/// Flatten a batch of model replies into tabular rows, tolerating malformed payloads.
pub fn reconcile(responses: &[ModelResponse]) -> Reconciliation {
    let mut reconciliation = Reconciliation::default();

    for (position, response) in responses.iter().enumerate() {
        let Some(text) = response.first_text() else {
            tracing::warn!(response = position + 1, "Reply carried no text segment; skipping");
            reconciliation.skipped_responses += 1;
            continue;
        };

        let Some(payload) = json_span(text) else {
            tracing::warn!(response = position + 1, "No JSON object in reply; skipping");
            reconciliation.skipped_responses += 1;
            continue;
        };

        match serde_json::from_str::<ExtractionPayload>(payload) {
            Ok(parsed) => {
                for group in parsed.test_groups {
                    for test in &group.tests {
                        reconciliation.rows.push(ReportRow {
                            test_group: group.group_name.clone(),
                            patient_name: group.name.clone(),
                            age: group.age.clone(),
                            date_of_test: group.date.clone(),
                            test_name: test.test_name.clone(),
                            result: test.result.clone(),
                            reference_range: test.reference_range.clone(),
                            unit: test.unit.clone(),
                        });
                    }
                    reconciliation.last_patient_name = group.name;
                    reconciliation.last_test_date = group.date;
                }
            }
            Err(error) => {
                tracing::warn!(
                    response = position + 1,
                    error = %error,
                    "Discarding malformed extraction payload"
                );
                reconciliation.skipped_responses += 1;
            }
        }
    }

    tracing::debug!(
        rows = reconciliation.rows.len(),
        skipped = reconciliation.skipped_responses,
        "Reconciliation finished"
    );
    reconciliation
}

/// The substring between the first `{` and the last `}`, inclusive, when both exist in order.
fn json_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end >= start).then(|| &text[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content_reply(text: &str) -> ModelResponse {
        ModelResponse::Content {
            content: vec![crate::llm::ContentBlock {
                kind: "text".into(),
                text: text.into(),
            }],
        }
    }

    #[test]
    fn reply_without_braces_contributes_zero_rows() {
        let reconciliation = reconcile(&[content_reply("Sorry, no test results were found.")]);

        assert!(reconciliation.rows.is_empty());
        assert_eq!(reconciliation.skipped_responses, 1);
    }

    #[test]
    fn malformed_json_is_skipped_without_panicking() {
        let reconciliation = reconcile(&[content_reply("{\"test_groups\": [ooops")]);

        assert!(reconciliation.rows.is_empty());
        assert_eq!(reconciliation.skipped_responses, 1);
    }

    #[test]
    fn groups_are_flattened_with_their_own_metadata() {
        let payload = r#"{
            "test_groups": [
                {
                    "group_name": "CBC", "name": "Jane Doe", "date": "2024-01-01", "age": "34",
                    "tests": [
                        {"test_name": "Hemoglobin", "result": "13.5", "reference_range": "12-16", "unit": "g/dL"},
                        {"test_name": "Hematocrit", "result": "41", "reference_range": "36-46", "unit": "%"}
                    ]
                },
                {
                    "group_name": "Metabolic", "name": "Jane Doe", "date": "2024-01-02", "age": "34",
                    "tests": [
                        {"test_name": "Glucose", "result": "95", "reference_range": "70-110", "unit": "mg/dL"},
                        {"test_name": "Sodium", "result": "140", "reference_range": "135-145", "unit": "mmol/L"}
                    ]
                }
            ]
        }"#;
        let reconciliation = reconcile(&[content_reply(payload)]);

        assert_eq!(reconciliation.rows.len(), 4);
        assert!(
            reconciliation.rows[..2]
                .iter()
                .all(|row| row.test_group == "CBC" && row.date_of_test == "2024-01-01")
        );
        assert!(
            reconciliation.rows[2..]
                .iter()
                .all(|row| row.test_group == "Metabolic" && row.date_of_test == "2024-01-02")
        );
        assert_eq!(reconciliation.last_patient_name, "Jane Doe");
        assert_eq!(reconciliation.last_test_date, "2024-01-02");
        assert_eq!(reconciliation.skipped_responses, 0);
    }

    #[test]
    fn prose_wrapped_json_still_parses() {
        let text = "Here are the extracted results:\n```json\n{\"test_groups\": [{\"group_name\": \"CBC\", \"tests\": [{\"test_name\": \"WBC\"}]}]}\n```\nLet me know if you need more.";
        let reconciliation = reconcile(&[content_reply(text)]);

        assert_eq!(reconciliation.rows.len(), 1);
        assert_eq!(reconciliation.rows[0].test_name, "WBC");
    }

    #[test]
    fn missing_fields_default_to_empty_strings() {
        let reconciliation = reconcile(&[content_reply(
            r#"{"test_groups": [{"tests": [{"test_name": "TSH"}]}]}"#,
        )]);

        let row = &reconciliation.rows[0];
        assert_eq!(row.test_name, "TSH");
        assert_eq!(row.patient_name, "");
        assert_eq!(row.reference_range, "");
        assert_eq!(row.unit, "");
    }

    #[test]
    fn one_bad_reply_does_not_poison_the_batch() {
        let good = content_reply(
            r#"{"test_groups": [{"group_name": "CBC", "name": "A", "tests": [{"test_name": "WBC"}]}]}"#,
        );
        let reconciliation = reconcile(&[content_reply("no json here"), good]);

        assert_eq!(reconciliation.rows.len(), 1);
        assert_eq!(reconciliation.skipped_responses, 1);
        assert_eq!(reconciliation.last_patient_name, "A");
    }

    #[test]
    fn later_reply_wins_patient_identity() {
        let first = content_reply(
            r#"{"test_groups": [{"name": "First", "date": "2024-01-01", "tests": []}]}"#,
        );
        let second = content_reply(
            r#"{"test_groups": [{"name": "Second", "date": "2024-02-02", "tests": []}]}"#,
        );
        let reconciliation = reconcile(&[first, second]);

        assert_eq!(reconciliation.last_patient_name, "Second");
        assert_eq!(reconciliation.last_test_date, "2024-02-02");
    }
}
