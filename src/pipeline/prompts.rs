//! Fixed instruction templates for the two extraction tasks.

/// Task a chunk batch is submitted for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionTask {
    /// Structured JSON extraction of test groups and results.
    Structured,
    /// Free-form narrative analysis with fixed section markers.
    Narrative,
}

impl ExtractionTask {
    /// The fixed instruction text prepended to every chunk for this task.
    pub fn instructions(self) -> &'static str {
        match self {
            Self::Structured => STRUCTURED_EXTRACTION_INSTRUCTIONS,
            Self::Narrative => NARRATIVE_ANALYSIS_INSTRUCTIONS,
        }
    }
}

const STRUCTURED_EXTRACTION_INSTRUCTIONS: &str = r#"Analyze this medical report and provide the results in JSON format. Extract all test results and patient information.

Required format:
{
    "test_groups": [
        {
            "group_name": "Test Group Name",
            "name": "Patient Name",
            "date": "Date of Test",
            "age": "Patient Age",
            "tests": [
                {
                    "test_name": "Test Name",
                    "result": "Result Value",
                    "reference_range": "Reference Range",
                    "unit": "Unit of Measurement"
                }
            ]
        }
    ]
}

Important:
1. Include all test results found in the report
2. Keep original values exactly as shown
3. Group related tests together
4. Include reference ranges and units when available
5. Maintain the exact format specified above
6. Date should be the day the sample is collected.
7. When retrieving age, return only the age with no surrounding text.

Parse this portion of the medical report:"#;

const NARRATIVE_ANALYSIS_INSTRUCTIONS: &str = r#"You are a medical assistant specialized in analyzing diagnostic health reports. You will be given the extracted text from a diagnostic report.

Your task is to:
1. Read and understand the results from tests such as blood work, imaging, and other diagnostics.
2. Summarize the findings in simple, non-technical language.
3. Identify and list:
   - Pros: parameters that are within normal range or showing improvement.
   - Cons: parameters that are outside the normal range or indicating a potential health concern.
4. Give suggestions for lifestyle improvements, further tests, or follow-ups if necessary, but DO NOT give any diagnosis.

Format your answer like this:

Summary:
- [Brief, simple explanation of the overall health based on the report]

Pros:
- [Positive finding 1]
- [Positive finding 2]

Cons:
- [Concern 1 with a short explanation]
- [Concern 2 with a short explanation]

Suggestions:
- [Advice or follow-up if applicable]

Analyze this portion of the diagnostic report:"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structured_instructions_pin_the_schema() {
        let instructions = ExtractionTask::Structured.instructions();
        assert!(instructions.contains("\"test_groups\""));
        assert!(instructions.contains("\"reference_range\""));
    }

    #[test]
    fn narrative_instructions_carry_section_markers() {
        let instructions = ExtractionTask::Narrative.instructions();
        for marker in ["Summary:", "Pros:", "Cons:", "Suggestions:"] {
            assert!(instructions.contains(marker), "missing {marker}");
        }
    }
}
