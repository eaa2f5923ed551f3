//! Structured resume data produced by the parsers.

use serde::{Deserialize, Serialize};

/// Contact details extracted from the resume header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonalInfo {
    /// Candidate name.
    #[serde(default)]
    pub name: Option<String>,
    /// Email address.
    #[serde(default)]
    pub email: Option<String>,
    /// Phone number.
    #[serde(default)]
    pub phone: Option<String>,
    /// Location line.
    #[serde(default)]
    pub location: Option<String>,
}

/// One education entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Education {
    /// Institution name.
    #[serde(default)]
    pub institution: String,
    /// Degree obtained or pursued.
    #[serde(default)]
    pub degree: Option<String>,
    /// Period, verbatim (e.g. "2019–2023").
    #[serde(default)]
    pub period: Option<String>,
    /// Free-form details.
    #[serde(default)]
    pub details: Option<String>,
}

/// One work experience entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Experience {
    /// Company name.
    #[serde(default)]
    pub company: String,
    /// Role title.
    #[serde(default)]
    pub title: Option<String>,
    /// Period, verbatim, preserving markers like "Present".
    #[serde(default)]
    pub period: Option<String>,
    /// Bullet-point responsibilities.
    #[serde(default)]
    pub responsibilities: Vec<String>,
}

/// One project entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// Project name.
    #[serde(default)]
    pub name: Option<String>,
    /// Short description.
    #[serde(default)]
    pub description: Option<String>,
    /// Technologies used.
    #[serde(default)]
    pub technologies: Vec<String>,
    /// Project URL.
    #[serde(default)]
    pub url: Option<String>,
}

/// One language entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Language {
    /// Language name.
    #[serde(default)]
    pub language: String,
    /// Proficiency level, verbatim.
    #[serde(default)]
    pub proficiency: Option<String>,
}

/// Full structured resume.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeData {
    /// Contact details.
    #[serde(default)]
    pub personal_info: PersonalInfo,
    /// Education entries, most recent first.
    #[serde(default)]
    pub education: Vec<Education>,
    /// Experience entries, most recent first.
    #[serde(default)]
    pub experience: Vec<Experience>,
    /// Key skills.
    #[serde(default)]
    pub skills: Vec<String>,
    /// Projects.
    #[serde(default)]
    pub projects: Vec<Project>,
    /// Languages.
    #[serde(default)]
    pub languages: Vec<Language>,
}

impl ResumeData {
    /// Whether direct extraction left enough gaps to warrant the LLM pass:
    /// missing name, an empty key section, or experience entries without a
    /// title or responsibilities.
    pub fn needs_llm_fallback(&self) -> bool {
        if self.personal_info.name.is_none() {
            return true;
        }
        if self.education.is_empty() || self.experience.is_empty() || self.skills.is_empty() {
            return true;
        }
        self.experience
            .iter()
            .any(|exp| exp.title.is_none() || exp.responsibilities.is_empty())
    }
}
