//! Direct heuristic resume parsing.
//!
//! Regex/section-header extraction used before (and as a fallback for) the
//! LLM pass. Sections are located by case-insensitive header lines
//! ("education", "experience"/"employment"/"work", "skills", "projects",
//! "languages"); entries split on blank lines, year patterns, or bullets.

use regex::Regex;

use super::models::{Education, Experience, Language, PersonalInfo, ResumeData};

const SECTION_HEADERS: [(&str, &[&str]); 5] = [
    ("education", &["education"]),
    ("experience", &["experience", "employment", "work history", "work"]),
    ("skills", &["skills", "technical skills"]),
    ("projects", &["projects"]),
    ("languages", &["languages"]),
];

/// Parse resume text into structured data with header/regex heuristics.
pub fn parse_resume_text(text: &str) -> ResumeData {
    let mut resume = ResumeData {
        personal_info: extract_personal_info(text),
        ..ResumeData::default()
    };

    if let Some(section) = extract_section(text, "education") {
        resume.education = parse_education(&section);
    }
    if let Some(section) = extract_section(text, "experience") {
        resume.experience = parse_experience(&section);
    }
    if let Some(section) = extract_section(text, "skills") {
        resume.skills = parse_skills(&section);
    }
    if let Some(section) = extract_section(text, "languages") {
        resume.languages = parse_languages(&section);
    }

    resume
}

fn header_aliases(section: &str) -> &'static [&'static str] {
    SECTION_HEADERS
        .iter()
        .find(|(name, _)| *name == section)
        .map(|(_, aliases)| *aliases)
        .unwrap_or(&[])
}

fn is_header_line(line: &str, aliases: &[&str]) -> bool {
    let trimmed = line.trim().trim_end_matches(':').to_lowercase();
    aliases.iter().any(|alias| trimmed == *alias)
}

fn is_any_header_line(line: &str) -> bool {
    SECTION_HEADERS
        .iter()
        .any(|(_, aliases)| is_header_line(line, aliases))
}

/// Extract the body of a named section: everything between its header line
/// and the next known section header.
pub fn extract_section(text: &str, section: &str) -> Option<String> {
    let aliases = header_aliases(section);
    let lines: Vec<&str> = text.lines().collect();

    let start = lines
        .iter()
        .position(|line| is_header_line(line, aliases))?;

    let body: Vec<&str> = lines
        .iter()
        .skip(start.saturating_add(1))
        .take_while(|line| !is_any_header_line(line))
        .copied()
        .collect();

    let section_text = body.join("\n").trim().to_owned();
    if section_text.is_empty() {
        None
    } else {
        Some(section_text)
    }
}

fn extract_personal_info(text: &str) -> PersonalInfo {
    let mut info = PersonalInfo::default();

    if let Ok(email_re) = Regex::new(r"[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}") {
        info.email = email_re.find(text).map(|m| m.as_str().to_owned());
    }
    if let Ok(phone_re) = Regex::new(r"\+?\d[\d\s().\-]{7,}\d") {
        info.phone = phone_re.find(text).map(|m| m.as_str().trim().to_owned());
    }

    // First non-empty line is the name when it looks like one.
    info.name = text
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .filter(|line| {
            let words = line.split_whitespace().count();
            (1..=4).contains(&words)
                && !line.chars().any(|c| c.is_ascii_digit())
                && !line.contains('@')
        })
        .map(ToOwned::to_owned);

    info
}

fn year_range_re() -> Option<Regex> {
    // "2019 - 2023", "Jan. 2024 – Present", "2021–2023"
    Regex::new(
        r"(?i)((?:[A-Za-z]{3,9}\.?\s+)?(?:19|20)\d{2})\s*[–\-]\s*((?:[A-Za-z]{3,9}\.?\s+)?(?:(?:19|20)\d{2}|Present|Currently|Current))",
    )
    .ok()
}

/// Split a section body into entries on blank lines, falling back to lines
/// carrying a year pattern starting a new entry.
fn split_entries(section: &str) -> Vec<String> {
    let blocks: Vec<String> = section
        .split("\n\n")
        .map(|block| block.trim().to_owned())
        .filter(|block| !block.is_empty())
        .collect();
    if blocks.len() > 1 {
        return blocks;
    }

    // Single block: try splitting where a new year-carrying line starts.
    let Some(year_re) = year_range_re() else {
        return blocks;
    };
    let mut entries: Vec<Vec<&str>> = Vec::new();
    for line in section.lines() {
        // A year-carrying line starts a new entry, unless it is a bullet or
        // the line is nothing but the period (a continuation of the header).
        let starts_entry = year_re
            .find(line)
            .is_some_and(|m| line.trim() != m.as_str())
            && !line.trim_start().starts_with(['-', '•', '*']);
        if starts_entry || entries.is_empty() {
            entries.push(vec![line]);
        } else if let Some(last) = entries.last_mut() {
            last.push(line);
        }
    }
    entries
        .into_iter()
        .map(|lines| lines.join("\n").trim().to_owned())
        .filter(|entry| !entry.is_empty())
        .collect()
}

fn parse_education(section: &str) -> Vec<Education> {
    let year_re = year_range_re();
    split_entries(section)
        .into_iter()
        .map(|entry| {
            let mut lines = entry.lines().map(str::trim).filter(|l| !l.is_empty());
            let first = lines.next().unwrap_or_default().to_owned();
            let rest: Vec<&str> = lines.collect();

            let period = year_re
                .as_ref()
                .and_then(|re| re.find(&entry))
                .map(|m| m.as_str().to_owned());
            let degree = rest
                .iter()
                .find(|line| {
                    let lower = line.to_lowercase();
                    ["bachelor", "master", "phd", "b.s", "m.s", "bsc", "msc", "degree"]
                        .iter()
                        .any(|kw| lower.contains(kw))
                })
                .map(|line| (*line).to_owned());

            Education {
                institution: first,
                degree,
                period,
                details: None,
            }
        })
        .collect()
}

fn parse_experience(section: &str) -> Vec<Experience> {
    let year_re = year_range_re();
    split_entries(section)
        .into_iter()
        .map(|entry| {
            let mut header_lines: Vec<String> = Vec::new();
            let mut responsibilities: Vec<String> = Vec::new();

            for line in entry.lines().map(str::trim).filter(|l| !l.is_empty()) {
                if let Some(bullet) = line
                    .strip_prefix('-')
                    .or_else(|| line.strip_prefix('•'))
                    .or_else(|| line.strip_prefix('*'))
                {
                    responsibilities.push(bullet.trim().to_owned());
                } else if header_lines.len() < 2 {
                    header_lines.push(line.to_owned());
                }
            }

            let period = year_re
                .as_ref()
                .and_then(|re| re.find(&entry))
                .map(|m| m.as_str().to_owned());

            // "Title at Company" or "Title, Company" on one line; otherwise
            // first line is the title, second the company.
            let first = header_lines.first().cloned().unwrap_or_default();
            let (title, company) = if let Some((t, c)) = first.split_once(" at ") {
                (Some(t.trim().to_owned()), c.trim().to_owned())
            } else if let Some((t, c)) = first.split_once(", ") {
                (Some(t.trim().to_owned()), c.trim().to_owned())
            } else {
                (
                    Some(first.clone()).filter(|t| !t.is_empty()),
                    header_lines.get(1).cloned().unwrap_or_default(),
                )
            };

            Experience {
                company: strip_period(&company, &period),
                title: title.map(|t| strip_period(&t, &period)),
                period,
                responsibilities,
            }
        })
        .collect()
}

fn strip_period(value: &str, period: &Option<String>) -> String {
    match period {
        Some(period) => value.replace(period.as_str(), "").trim_matches([' ', '(', ')', ',']).to_owned(),
        None => value.to_owned(),
    }
}

fn parse_skills(section: &str) -> Vec<String> {
    section
        .lines()
        .flat_map(|line| line.split([',', '•', '|', ';']))
        .map(|skill| skill.trim().trim_start_matches(['-', '*']).trim().to_owned())
        .filter(|skill| !skill.is_empty() && skill.chars().count() < 60)
        .collect()
}

fn parse_languages(section: &str) -> Vec<Language> {
    section
        .lines()
        .flat_map(|line| line.split(','))
        .map(|entry| entry.trim().trim_start_matches(['-', '•', '*']).trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            // "English (fluent)" or "English - fluent"
            if let Some((language, rest)) = entry.split_once('(') {
                Language {
                    language: language.trim().to_owned(),
                    proficiency: Some(rest.trim_end_matches(')').trim().to_owned()),
                }
            } else if let Some((language, proficiency)) = entry.split_once(" - ") {
                Language {
                    language: language.trim().to_owned(),
                    proficiency: Some(proficiency.trim().to_owned()),
                }
            } else {
                Language {
                    language: entry.to_owned(),
                    proficiency: None,
                }
            }
        })
        .collect()
}
