use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Contact block and summary pulled from the top of a CV.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersonalInfo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkExperience {
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub achievements: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Education {
    #[serde(default)]
    pub institution: Option<String>,
    #[serde(default)]
    pub degree: Option<String>,
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub achievements: Vec<String>,
}

/// Models write `"achievements": null` for entries with nothing listed.
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<Vec<T>>::deserialize(deserializer).map(Option::unwrap_or_default)
}

// Model output envelopes. The top-level key is required: a response without it
// is treated as malformed output, same as invalid JSON.

#[derive(Debug, Deserialize)]
pub struct SkillsEnvelope {
    pub skills: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct WorkExperienceEnvelope {
    pub work_experience: Vec<WorkExperience>,
}

#[derive(Debug, Deserialize)]
pub struct EducationEnvelope {
    pub education: Vec<Education>,
}

/// The four structured sections extracted from a CV.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExtractedSections {
    pub personal_info: PersonalInfo,
    pub skills: Vec<String>,
    pub work_experience: Vec<WorkExperience>,
    pub education: Vec<Education>,
}

impl ExtractedSections {
    /// Text embedded into `skills_vector`.
    pub fn skills_text(&self) -> String {
        self.skills.join(", ")
    }

    /// Text embedded into `achievements_vector`: every work achievement, in order.
    pub fn achievements_text(&self) -> String {
        self.work_experience
            .iter()
            .flat_map(|exp| exp.achievements.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// A fully processed CV. Replaced wholesale on every successful upload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CvData {
    pub raw_text: String,
    pub personal_info: PersonalInfo,
    pub skills: Vec<String>,
    pub work_experience: Vec<WorkExperience>,
    pub education: Vec<Education>,
    #[serde(skip_serializing)]
    pub skills_vector: Vec<f32>,
    #[serde(skip_serializing)]
    pub achievements_vector: Vec<f32>,
    /// Object-storage key of the uploaded PDF.
    pub document_key: Option<String>,
    pub processed_at: DateTime<Utc>,
}

impl CvData {
    pub fn from_sections(
        raw_text: String,
        sections: ExtractedSections,
        skills_vector: Vec<f32>,
        achievements_vector: Vec<f32>,
        document_key: Option<String>,
    ) -> Self {
        Self {
            raw_text,
            personal_info: sections.personal_info,
            skills: sections.skills,
            work_experience: sections.work_experience,
            education: sections.education,
            skills_vector,
            achievements_vector,
            document_key,
            processed_at: Utc::now(),
        }
    }
}
