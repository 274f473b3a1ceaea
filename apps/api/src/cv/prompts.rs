// CV extraction prompt templates.
// Every template receives the raw CV text through the `{cv_text}` placeholder
// and asks for a single JSON object with a fixed top-level shape.

use crate::cv::status::PipelineStage;

pub const PERSONAL_INFO_PROMPT: &str = r#"Extract the following information from the CV in JSON format: {"name": string, "email": string, "phone": string, "summary": string}
Return ONLY the JSON object.

CV Text:
{cv_text}"#;

pub const SKILLS_PROMPT: &str = r#"Extract a list of skills from the CV in JSON format: {"skills": string[]}
Return ONLY the JSON object.

CV Text:
{cv_text}"#;

pub const WORK_EXPERIENCE_PROMPT: &str = r#"Extract work experience from the CV in JSON format:
{
    "work_experience": [
        {
            "company": string,
            "position": string,
            "start_date": string,
            "end_date": string,
            "description": string,
            "achievements": string[]
        }
    ]
}
Return ONLY the JSON object.

CV Text:
{cv_text}"#;

pub const EDUCATION_PROMPT: &str = r#"Extract education information from the CV in JSON format:
{
    "education": [
        {
            "institution": string,
            "degree": string,
            "field": string,
            "start_date": string,
            "end_date": string,
            "achievements": string[]
        }
    ]
}
Return ONLY the JSON object.

CV Text:
{cv_text}"#;

/// The four LLM-backed sections of a CV.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    PersonalInfo,
    Skills,
    WorkExperience,
    Education,
}

impl Section {
    #[cfg(test)]
    pub const ALL: [Section; 4] = [
        Section::PersonalInfo,
        Section::Skills,
        Section::WorkExperience,
        Section::Education,
    ];

    pub fn stage(&self) -> PipelineStage {
        match self {
            Section::PersonalInfo => PipelineStage::PersonalInfo,
            Section::Skills => PipelineStage::Skills,
            Section::WorkExperience => PipelineStage::WorkExperience,
            Section::Education => PipelineStage::Education,
        }
    }

    /// Prompt template and output token budget.
    pub fn prompt(&self) -> (&'static str, u32) {
        match self {
            Section::PersonalInfo => (PERSONAL_INFO_PROMPT, 500),
            Section::Skills => (SKILLS_PROMPT, 500),
            Section::WorkExperience => (WORK_EXPERIENCE_PROMPT, 1000),
            Section::Education => (EDUCATION_PROMPT, 1000),
        }
    }
}

pub fn render(template: &str, cv_text: &str) -> String {
    template.replace("{cv_text}", cv_text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_template_has_placeholder() {
        for section in Section::ALL {
            let (template, _) = section.prompt();
            assert!(template.contains("{cv_text}"), "{section:?} template lacks placeholder");
        }
    }

    #[test]
    fn test_larger_budget_for_list_sections() {
        let (_, skills) = Section::Skills.prompt();
        let (_, work) = Section::WorkExperience.prompt();
        let (_, edu) = Section::Education.prompt();
        assert!(work > skills);
        assert_eq!(work, edu);
    }

    #[test]
    fn test_sections_map_to_distinct_stages() {
        let stages: std::collections::HashSet<_> =
            Section::ALL.iter().map(|s| s.stage()).collect();
        assert_eq!(stages.len(), 4);
        assert!(!stages.contains(&PipelineStage::ExtractText));
    }

    #[test]
    fn test_render_substitutes_cv_text() {
        let prompt = render(SKILLS_PROMPT, "Rust, Go");
        assert!(prompt.ends_with("CV Text:\nRust, Go"));
        assert!(!prompt.contains("{cv_text}"));
    }
}
