//! Skill extraction: derives a job's required skills from its title and description.
//!
//! The model is asked first (with seniority and role hints folded into the prompt);
//! on failure or an unusable shape the role-keyword tables below are used instead.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::llm_client::{ask_json, ChatMessage, LanguageModel};

const MAX_MODEL_SKILLS: usize = 15;
const MAX_FALLBACK_SKILLS: usize = 10;

const SKILLS_SYSTEM: &str = "Return ONLY a JSON array of skill strings. \
    Include modern frameworks, not just basic languages. No other text.";

/// Words that show up in job text but are never skills on their own.
const STOPWORDS: &[&str] = &[
    "a", "an", "the", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
    "from", "as", "is", "was", "are", "were", "been", "be", "have", "has", "had", "do", "does",
    "did", "will", "would", "could", "should", "may", "might", "must", "can", "need", "it", "its",
    "this", "that", "these", "those", "we", "they", "you", "all", "each", "every", "both",
    "more", "most", "other", "some", "such", "no", "not", "only", "own", "same", "so", "than",
    "too", "very", "just", "also", "about", "into", "through", "experience", "years", "year",
    "work", "working", "team", "teams", "role", "job", "position", "company", "business",
    "industry", "candidate", "candidates", "required", "requirements", "preferred", "skills",
    "skill", "ability", "abilities", "knowledge", "understanding", "familiarity", "proficiency",
    "proficient", "excellent", "strong", "good", "great", "best", "proven", "demonstrated",
    "responsible", "responsibilities", "looking", "seeking", "hiring", "join", "opportunity",
    "opportunities", "environment", "culture", "benefits", "salary", "plus", "bonus",
    "including", "includes", "include", "etc", "senior", "junior", "lead", "level", "manager",
    "engineer", "developer", "analyst", "specialist", "software", "engineering", "development",
    "developing", "building", "build",
];

const FRONTEND_SKILLS: &[&str] = &[
    "React", "TypeScript", "Next.js", "Vue.js", "Angular", "Redux", "GraphQL", "Tailwind CSS",
    "Jest", "Cypress", "Webpack", "Vite", "Storybook", "Web Performance",
    "Accessibility (a11y)", "Responsive Design",
];
const FRONTEND_SENIOR_SKILLS: &[&str] = &[
    "System Design", "Micro-frontends", "Design Systems", "Performance Optimization",
    "Team Leadership", "Code Review", "Technical Mentorship", "Architecture Patterns",
];
const BACKEND_SKILLS: &[&str] = &[
    "Python", "Node.js", "Java", "Go", "PostgreSQL", "MongoDB", "Redis", "REST APIs", "GraphQL",
    "Docker", "AWS", "Microservices",
];
const BACKEND_SENIOR_SKILLS: &[&str] = &[
    "System Design", "Distributed Systems", "API Design", "Database Optimization", "Kubernetes",
    "CI/CD", "Technical Leadership", "Architecture",
];
const FULLSTACK_SKILLS: &[&str] = &[
    "React", "Node.js", "TypeScript", "PostgreSQL", "MongoDB", "Docker", "AWS", "REST APIs",
    "GraphQL", "Git", "CI/CD",
];
const DATA_SKILLS: &[&str] = &[
    "Python", "SQL", "Pandas", "NumPy", "Scikit-learn", "TensorFlow", "PyTorch", "Apache Spark",
    "Airflow", "AWS", "Data Modeling", "ETL",
];
const DATA_SENIOR_SKILLS: &[&str] =
    &["Statistical Analysis", "A/B Testing", "Technical Leadership"];
const DEVOPS_SKILLS: &[&str] = &[
    "Docker", "Kubernetes", "Terraform", "AWS", "GCP", "Azure", "CI/CD", "GitHub Actions",
    "Jenkins", "Prometheus", "Grafana", "Linux", "Bash",
];
const DEVOPS_SENIOR_SKILLS: &[&str] =
    &["Architecture", "Incident Management", "Technical Leadership"];
const GENERAL_SKILLS: &[&str] = &[
    "Python", "Java", "JavaScript", "TypeScript", "SQL", "Git", "Docker", "AWS", "REST APIs",
    "Agile", "CI/CD", "Unit Testing",
];
const GENERAL_SENIOR_SKILLS: &[&str] = &[
    "System Design", "Architecture", "Technical Leadership", "Code Review", "Mentorship",
    "Cross-functional Collaboration",
];

const SENIOR_MARKERS: &[&str] = &["senior", "staff", "principal", "lead", "architect"];
const JUNIOR_MARKERS: &[&str] = &["junior", "entry", "associate", "intern"];
const FRONTEND_MARKERS: &[&str] = &[
    "frontend", "front-end", "front end", "ui developer", "react", "vue", "angular",
];
const BACKEND_MARKERS: &[&str] = &["backend", "back-end", "back end", "server", "api developer"];
const FULLSTACK_MARKERS: &[&str] = &["fullstack", "full-stack", "full stack"];
const DATA_MARKERS: &[&str] = &[
    "data", "ml", "machine learning", "ai", "scientist", "analyst",
];
const DEVOPS_MARKERS: &[&str] = &["devops", "sre", "platform", "infrastructure", "cloud"];

/// Broad role family inferred from a job title.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleFamily {
    Frontend,
    Backend,
    Fullstack,
    Data,
    Devops,
    General,
}

impl RoleFamily {
    /// First matching family wins, in the order frontend, backend, fullstack, data, devops.
    pub fn detect(title: &str) -> Self {
        let title = title.to_lowercase();
        let words: Vec<&str> = title
            .split(|c: char| !c.is_alphanumeric() && c != '-')
            .filter(|w| !w.is_empty())
            .collect();
        let has = |markers: &[&str]| {
            markers.iter().any(|m| {
                // Short markers ("ml", "ai", "ui") must be whole words.
                if m.len() <= 3 && !m.contains(' ') {
                    words.iter().any(|w| w == m)
                } else {
                    title.contains(m)
                }
            })
        };
        if has(FRONTEND_MARKERS) {
            RoleFamily::Frontend
        } else if has(BACKEND_MARKERS) {
            RoleFamily::Backend
        } else if has(FULLSTACK_MARKERS) {
            RoleFamily::Fullstack
        } else if has(DATA_MARKERS) {
            RoleFamily::Data
        } else if has(DEVOPS_MARKERS) {
            RoleFamily::Devops
        } else {
            RoleFamily::General
        }
    }

    fn base_skills(self) -> &'static [&'static str] {
        match self {
            RoleFamily::Frontend => FRONTEND_SKILLS,
            RoleFamily::Backend => BACKEND_SKILLS,
            RoleFamily::Fullstack => FULLSTACK_SKILLS,
            RoleFamily::Data => DATA_SKILLS,
            RoleFamily::Devops => DEVOPS_SKILLS,
            RoleFamily::General => GENERAL_SKILLS,
        }
    }

    fn senior_skills(self) -> &'static [&'static str] {
        match self {
            RoleFamily::Frontend => FRONTEND_SENIOR_SKILLS,
            RoleFamily::Backend => BACKEND_SENIOR_SKILLS,
            RoleFamily::Fullstack | RoleFamily::General => GENERAL_SENIOR_SKILLS,
            RoleFamily::Data => DATA_SENIOR_SKILLS,
            RoleFamily::Devops => DEVOPS_SENIOR_SKILLS,
        }
    }

    fn prompt_hint(self) -> &'static str {
        match self {
            RoleFamily::Frontend => "Focus on modern frontend: React/Vue/Angular, TypeScript, state management, testing, performance optimization, accessibility. ",
            RoleFamily::Backend => "Focus on backend: APIs, databases, microservices, cloud services, system design. ",
            RoleFamily::Fullstack => "Include both frontend and backend skills plus DevOps basics. ",
            RoleFamily::Data => "Focus on data skills: Python, SQL, ML frameworks, data pipelines, statistics. ",
            RoleFamily::Devops => "Focus on DevOps: CI/CD, containers, Kubernetes, cloud platforms, IaC, monitoring. ",
            RoleFamily::General => "",
        }
    }
}

fn contains_any(text: &str, markers: &[&str]) -> bool {
    markers.iter().any(|m| text.contains(m))
}

pub fn is_senior_title(title: &str) -> bool {
    contains_any(&title.to_lowercase(), SENIOR_MARKERS)
}

fn is_junior_title(title: &str) -> bool {
    contains_any(&title.to_lowercase(), JUNIOR_MARKERS)
}

fn is_stopword(word: &str) -> bool {
    let lower = word.to_lowercase();
    STOPWORDS.contains(&lower.as_str())
}

/// Keeps first occurrences, compared case-insensitively.
fn dedup_preserving_order(skills: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    skills
        .into_iter()
        .filter(|s| seen.insert(s.to_lowercase()))
        .collect()
}

/// Deterministic role-table extraction. Never empty.
pub fn fallback_skill_extract(title: &str) -> Vec<String> {
    let family = RoleFamily::detect(title);
    let mut skills: Vec<String> = family.base_skills().iter().map(|s| s.to_string()).collect();
    if is_senior_title(title) {
        skills.extend(family.senior_skills().iter().map(|s| s.to_string()));
    }
    let mut skills = dedup_preserving_order(skills);
    skills.truncate(MAX_FALLBACK_SKILLS);
    skills
}

/// Accepts either a bare array or an object wrapping one under `skills`.
fn skills_from_reply(reply: &Value) -> Vec<String> {
    let items = match reply {
        Value::Array(items) => items.as_slice(),
        Value::Object(map) => match map.get("skills") {
            Some(Value::Array(items)) => items.as_slice(),
            _ => &[],
        },
        _ => &[],
    };
    let skills = items
        .iter()
        .filter_map(|v| match v {
            Value::String(s) => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .filter(|s| !s.is_empty() && !is_stopword(s));
    let mut skills = dedup_preserving_order(skills);
    skills.truncate(MAX_MODEL_SKILLS);
    skills
}

/// Model-backed skill extraction with the role-table fallback.
#[derive(Clone)]
pub struct SkillExtractor {
    llm: Arc<dyn LanguageModel>,
}

impl SkillExtractor {
    pub fn new(llm: Arc<dyn LanguageModel>) -> Self {
        Self { llm }
    }

    pub async fn extract(&self, title: &str, description: &str) -> Vec<String> {
        let family = RoleFamily::detect(title);
        let seniority_hint = if is_senior_title(title) {
            "This is a SENIOR role - include advanced skills, architecture patterns, and leadership/mentoring abilities. "
        } else if is_junior_title(title) {
            "This is a junior role - focus on fundamental skills. "
        } else {
            ""
        };

        let prompt = format!(
            "Extract technical skills and technologies required for this job. {seniority_hint}{}\
             Return ONLY a JSON array of specific, modern skill names. \
             Include frameworks (not just languages), tools, and methodologies. \
             Example for Senior Frontend: [\"React\", \"TypeScript\", \"Next.js\", \"GraphQL\", \"Jest\", \"Webpack\", \"Performance Optimization\", \"System Design\"]",
            family.prompt_hint()
        );

        let mut content = format!("Job Title: {title}");
        if !description.trim().is_empty() {
            content.push_str(&format!("\n\nJob Description: {description}"));
        }

        if let Some(reply) = ask_json(
            self.llm.as_ref(),
            SKILLS_SYSTEM,
            &prompt,
            &[ChatMessage::user(content)],
        )
        .await
        {
            let skills = skills_from_reply(&reply);
            if !skills.is_empty() {
                debug!("Model extracted {} skills for '{title}'", skills.len());
                return skills;
            }
            warn!("Model skill list for '{title}' was empty or malformed; using role table");
        }

        fallback_skill_extract(title)
    }
}
