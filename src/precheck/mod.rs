//! Advisory draft pre-check
//!
//! A pre-check inspects draft content for required sections and vague
//! wording and produces a baseline score. Results are recorded in the audit
//! log but never change a task's score or status.

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Sections expected when a task lists no requirements of its own
pub const DEFAULT_SECTIONS: [&str; 5] = [
    "Executive summary",
    "Budget justification",
    "Target audience analysis",
    "Success metrics",
    "Legal compliance review",
];

const VAGUE_WORDS: [&str; 5] = ["vague", "generic", "optimize", "maximize", "estimated"];

/// Similarity used when there is no corpus of earlier drafts to compare with
const BASELINE_SIMILARITY: f64 = 0.75;

const MIN_HEADING_SECTION_CHARS: usize = 8;
const MIN_LOOSE_SECTION_CHARS: usize = 20;
const LOOSE_WINDOW_CHARS: usize = 500;
const SECTION_CAP_CHARS: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrecheckRequest {
    pub task_id: String,
    pub content: String,
    pub requirements: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrecheckReport {
    pub task_id: String,
    pub missing_sections: Vec<String>,
    pub flagged_phrases: Vec<String>,
    pub suggestions: Vec<String>,
    /// 0.0..=1.0, four decimal places
    pub pre_score: f64,
    pub checked_at: DateTime<Utc>,
    pub passed_checks: Vec<String>,
    pub failed_checks: Vec<String>,
}

impl PrecheckReport {
    /// Baseline score as a whole percentage
    pub fn baseline_percent(&self) -> u32 {
        (self.pre_score * 100.0).round().clamp(0.0, 100.0) as u32
    }
}

#[async_trait]
pub trait PrecheckService: Send + Sync {
    async fn run(&self, request: PrecheckRequest) -> Result<PrecheckReport>;
}

/// Offline pre-check based on heading detection and word lists
#[derive(Debug, Default, Clone)]
pub struct HeuristicPrecheck;

impl HeuristicPrecheck {
    pub fn new() -> Self {
        Self
    }

    pub fn check(&self, request: &PrecheckRequest) -> Result<PrecheckReport> {
        if request.task_id.trim().is_empty() || request.content.trim().is_empty() {
            bail!("task_id and content are required");
        }

        let requirements: Vec<String> = if request.requirements.is_empty() {
            DEFAULT_SECTIONS.iter().map(|s| s.to_string()).collect()
        } else {
            request.requirements.clone()
        };

        let barrier = Regex::new(r"(?m)^[ \t]*#{1,6}[ \t]+\S")?;
        let mut passed = Vec::new();
        let mut failed = Vec::new();
        for requirement in &requirements {
            let present = section_present(&request.content, requirement, &barrier)?;
            debug!(requirement = %requirement, present, "Section check");
            if present {
                passed.push(requirement.clone());
            } else {
                failed.push(requirement.clone());
            }
        }

        let lowered = request.content.to_lowercase();
        let flagged_phrases: Vec<String> = VAGUE_WORDS
            .iter()
            .filter(|word| lowered.contains(*word))
            .map(|word| word.to_string())
            .collect();

        let checks = passed.len() + failed.len();
        let coverage = if checks == 0 {
            0.5
        } else {
            passed.len() as f64 / checks as f64
        };
        let pre_score = round4(0.6 * BASELINE_SIMILARITY + 0.4 * coverage);

        Ok(PrecheckReport {
            task_id: request.task_id.clone(),
            missing_sections: failed.clone(),
            flagged_phrases,
            suggestions: vec![
                "Clarify vague language.".to_string(),
                "Provide concrete metrics.".to_string(),
                "Add missing strategic sections if any.".to_string(),
            ],
            pre_score,
            checked_at: Utc::now(),
            passed_checks: passed,
            failed_checks: failed,
        })
    }
}

#[async_trait]
impl PrecheckService for HeuristicPrecheck {
    async fn run(&self, request: PrecheckRequest) -> Result<PrecheckReport> {
        self.check(&request)
    }
}

/// A section is present when a heading names it and is followed by enough
/// body text, or, failing that, when its key words appear with enough text
/// after them.
fn section_present(content: &str, requirement: &str, barrier: &Regex) -> Result<bool> {
    let core: String = requirement
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || c.is_whitespace())
        .collect();
    let words: Vec<String> = core.split_whitespace().map(regex::escape).collect();

    if !words.is_empty() {
        let heading = Regex::new(&format!(
            r"(?im)^\s*(?:#{{1,6}}\s*)?(?:\d+[\).]\s*)?(?:[-*]\s*)?{}\b[:\-]?",
            words.join(r"\s+")
        ))?;
        if let Some(found) = heading.find(content) {
            let tail = &content[found.end()..];
            let body: String = match barrier.find(tail) {
                Some(next) => tail[..next.start()].to_string(),
                None => tail.chars().take(SECTION_CAP_CHARS).collect(),
            };
            return Ok(meaningful_chars(&body) >= MIN_HEADING_SECTION_CHARS);
        }
    }

    let mut tokens: Vec<&str> = requirement
        .split_whitespace()
        .filter(|t| t.chars().count() > 2)
        .collect();
    if tokens.is_empty() {
        tokens.push(requirement.trim());
    }
    let pattern = tokens
        .iter()
        .take(2)
        .map(|t| regex::escape(&t.to_lowercase()))
        .collect::<Vec<_>>()
        .join("|");
    if pattern.is_empty() {
        return Ok(false);
    }
    let loose = Regex::new(&format!("(?i){pattern}"))?;
    Ok(match loose.find(content) {
        Some(found) => {
            let window: String = content[found.end()..].chars().take(LOOSE_WINDOW_CHARS).collect();
            meaningful_chars(&window) >= MIN_LOOSE_SECTION_CHARS
        }
        None => false,
    })
}

fn meaningful_chars(text: &str) -> usize {
    text.chars().filter(|c| !c.is_whitespace()).count()
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(content: &str, requirements: &[&str]) -> PrecheckRequest {
        PrecheckRequest {
            task_id: "task_1".to_string(),
            content: content.to_string(),
            requirements: requirements.iter().map(|r| r.to_string()).collect(),
        }
    }

    #[test]
    fn test_heading_with_body_passes() {
        let content = "# Executive Summary\nQ4 revenue grew 18% across regions.\n\n# Budget\nTBD";
        let report = HeuristicPrecheck::new()
            .check(&request(content, &["Executive summary", "Success metrics"]))
            .unwrap();
        assert_eq!(report.passed_checks, vec!["Executive summary"]);
        assert_eq!(report.failed_checks, vec!["Success metrics"]);
        assert_eq!(report.missing_sections, report.failed_checks);
        // 0.6 * 0.75 + 0.4 * 0.5
        assert_eq!(report.pre_score, 0.65);
        assert_eq!(report.baseline_percent(), 65);
    }

    #[test]
    fn test_heading_with_thin_body_fails() {
        let content = "## Success metrics\nTBD\n## Next\nmore text here";
        let report = HeuristicPrecheck::new()
            .check(&request(content, &["Success metrics"]))
            .unwrap();
        assert_eq!(report.failed_checks, vec!["Success metrics"]);
    }

    #[test]
    fn test_loose_keyword_match() {
        let content =
            "Our budget covers design, printing and distribution for all four regional offices.";
        let report = HeuristicPrecheck::new()
            .check(&request(content, &["Budget justification"]))
            .unwrap();
        assert_eq!(report.passed_checks, vec!["Budget justification"]);
        assert_eq!(report.pre_score, 0.85);
    }

    #[test]
    fn test_default_sections_and_vague_words() {
        let content = "We will optimize reach with a generic approach.";
        let report = HeuristicPrecheck::new().check(&request(content, &[])).unwrap();
        assert_eq!(report.passed_checks.len() + report.failed_checks.len(), DEFAULT_SECTIONS.len());
        assert_eq!(report.flagged_phrases, vec!["generic", "optimize"]);
        assert_eq!(report.suggestions.len(), 3);
    }

    #[test]
    fn test_blank_content_is_rejected() {
        let err = HeuristicPrecheck::new().check(&request("   ", &[])).unwrap_err();
        assert_eq!(err.to_string(), "task_id and content are required");
    }

    #[tokio::test]
    async fn test_service_trait_runs_heuristic() {
        let service: Box<dyn PrecheckService> = Box::new(HeuristicPrecheck::new());
        let report = service
            .run(request("# Success metrics\nOpen rate above 30 percent", &["Success metrics"]))
            .await
            .unwrap();
        assert_eq!(report.failed_checks.len(), 0);
        assert_eq!(report.pre_score, 0.85);
    }
}
