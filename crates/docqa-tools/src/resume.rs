use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

use docqa_core::error::{Error, Result};
use docqa_core::ingest::extract_document;
use docqa_core::traits::Generator;
use docqa_core::types::{Document, GenerationRequest};

const ATS_TEMPLATE: &str = r#"
You are a skilled or very experienced resume applicant tracking system (ATS),
with a deep understanding of tech fields, such as Software Engineering, Data Science, DevOps and Machine Learning.

Your task is to evaluate the resume provided based on the given job description.
You must consider the job market is very competitive and you should provide best assistance for improving the resume.
Assign the percentage matching based on the job description and the missing keywords with high accuracy.

Resume: {resume}
Job Description: {job_description}

I want the response in one single JSON string having the structure without ``` characters:
{"percent_match": "XX%", "missing_keywords": [], "profile_summary": ""}
"#;

/// Structured verdict returned by the ATS prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtsReport {
    pub percent_match: String,
    pub missing_keywords: Vec<String>,
    pub profile_summary: String,
}

impl fmt::Display for AtsReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Percentage Match")?;
        writeln!(f, "{}", self.percent_match)?;
        writeln!(f)?;
        writeln!(f, "Missing Keyword(s)")?;
        for keyword in &self.missing_keywords {
            writeln!(f, "- {keyword}")?;
        }
        writeln!(f)?;
        writeln!(f, "Profile Summary")?;
        write!(f, "{}", self.profile_summary)
    }
}

pub fn ats_prompt(resume: &str, job_description: &str) -> String {
    ATS_TEMPLATE.replace("{resume}", resume).replace("{job_description}", job_description)
}

/// Parse the model output as an [`AtsReport`]. Nothing is stripped or
/// repaired; anything but the exact JSON object is rejected with the raw text.
pub fn parse_ats_report(raw: &str) -> Result<AtsReport> {
    serde_json::from_str(raw).map_err(|e| Error::MalformedResponse { reason: e.to_string(), raw: raw.to_string() })
}

/// Score a resume PDF against a job description.
pub async fn score_resume<G>(generator: &G, resume: &Document, job_description: &str) -> Result<AtsReport>
where
    G: Generator + ?Sized,
{
    let resume_text = extract_document(resume)?;
    info!("Scoring resume {} ({} characters)", resume.name, resume_text.chars().count());
    let request = GenerationRequest::new().text(ats_prompt(&resume_text, job_description));
    let raw = generator.generate(&request).await?;
    debug!("ATS raw response: {}", raw);
    parse_ats_report(&raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_keeps_literal_json_shape() {
        let p = ats_prompt("RESUME", "JD");
        assert!(p.contains("Resume: RESUME"));
        assert!(p.contains("Job Description: JD"));
        assert!(p.contains(r#"{"percent_match": "XX%", "missing_keywords": [], "profile_summary": ""}"#));
    }

    #[test]
    fn display_lists_keywords() {
        let r = AtsReport {
            percent_match: "80%".into(),
            missing_keywords: vec!["Kubernetes".into(), "Terraform".into()],
            profile_summary: "Solid backend profile.".into(),
        };
        let s = r.to_string();
        assert!(s.contains("80%"));
        assert!(s.contains("- Kubernetes\n- Terraform"));
        assert!(s.ends_with("Solid backend profile."));
    }
}
