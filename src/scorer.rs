//! Turns token level differences between a reference run and a candidate run
//! into a penalty, a grade and feedback.

use similar::{Algorithm, ChangeTag, TextDiff};

use crate::settings::Settings;
use crate::test_case::TestResult;
use crate::token::{Token, TokenValue};

/// Below this magnitude the numeric penalty is divided by
/// `ln(cosh(x)) + 0.25` instead of `|x|`; the two meet exactly here.
pub const SCALE_CROSSOVER: f64 = 0.292055305409401;

/// Divisor for numeric differences. Behaves like `|reference|` for large
/// values and stays positive around zero.
pub fn numeric_scale(reference: f64) -> f64 {
    if reference.abs() < SCALE_CROSSOVER {
        reference.cosh().ln() + 0.25
    } else {
        reference.abs()
    }
}

/// Number of inserted plus deleted characters needed to turn `a` into `b`.
pub fn character_edits(a: &str, b: &str) -> usize {
    TextDiff::configure()
        .algorithm(Algorithm::Myers)
        .diff_chars(a, b)
        .iter_all_changes()
        .filter(|c| c.tag() != ChangeTag::Equal)
        .count()
}

/// Penalty and feedback for one test case.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Assessment {
    pub penalty: f64,
    /// Sorted and free of duplicates
    pub feedback: Vec<String>,
}

impl Assessment {
    fn add(&mut self, penalty: f64, feedback: Option<String>) {
        self.penalty += penalty;
        if let Some(f) = feedback {
            self.feedback.push(f);
        }
    }
}

fn quoted_list(tokens: &[Token]) -> String {
    let items: Vec<String> = tokens.iter().map(|t| format!("'{t}'")).collect();
    format!("[{}]", items.join(", "))
}

#[derive(Debug, Clone, Copy)]
pub struct Scorer<'a> {
    settings: &'a Settings,
}

impl<'a> Scorer<'a> {
    pub fn new(settings: &'a Settings) -> Self {
        Self { settings }
    }

    /// `100 * exp(-penalty_weight * penalty)`
    pub fn grade_from_penalty(&self, penalty: f64) -> f64 {
        100.0 * (-self.settings.penalty_weight * penalty).exp()
    }

    /// Grade given to every test case when the candidate could not be built.
    pub fn compile_failure_grade(&self) -> f64 {
        self.grade_from_penalty(self.settings.penalties.compile_failure)
    }

    pub fn assess(
        &self,
        reference: &TestResult,
        candidate: &TestResult,
        reference_tokens: &[Token],
        candidate_tokens: &[Token],
    ) -> Assessment {
        let penalties = &self.settings.penalties;
        let mut assessment = Assessment::default();

        if candidate.timed_out && !reference.timed_out {
            assessment.add(penalties.timeout, Some("Program timed out".to_string()));
        } else if candidate.exit_code != 0 && reference.exit_code == 0 {
            assessment.add(
                penalties.run_failure,
                Some(format!(
                    "Program encountered an unexpected runtime error (exit code {})",
                    candidate.exit_code
                )),
            );
        }

        for s in &candidate.test_case.required_strings {
            if !candidate.stdout.contains(s.as_str()) {
                assessment.add(
                    penalties.missing_string,
                    Some(format!("Missing string '{s}' in standard output")),
                );
            }
        }

        for s in &candidate.test_case.required_strings_stderr {
            if !candidate.stderr.contains(s.as_str()) {
                assessment.add(
                    penalties.missing_string,
                    Some(format!("Missing string '{s}' in standard error")),
                );
            }
        }

        if reference_tokens.len() != candidate_tokens.len() {
            assessment.add(
                penalties.token_count_mismatch,
                Some(format!(
                    "Expected {}, got {}",
                    quoted_list(reference_tokens),
                    quoted_list(candidate_tokens)
                )),
            );
        }

        for (expected, actual) in reference_tokens.iter().zip(candidate_tokens) {
            let (penalty, feedback) = self.compare(&expected.value, &actual.value);
            assessment.add(penalty, feedback);
        }

        assessment.feedback.sort();
        assessment.feedback.dedup();
        assessment
    }

    fn compare(&self, expected: &TokenValue, actual: &TokenValue) -> (f64, Option<String>) {
        use TokenValue::*;

        let penalties = &self.settings.penalties;
        let type_mismatch = || {
            (
                penalties.type_mismatch,
                Some(format!(
                    "Expected a {} ({expected}), got a {} ({actual})",
                    expected.type_name(),
                    actual.type_name()
                )),
            )
        };
        let value_mismatch = || format!("Expected '{expected}', got '{actual}'");

        match (expected, actual) {
            (Word(e), Word(a)) if e == a => (0.0, None),
            (Word(e), Word(a)) => (
                penalties.character_mismatch * character_edits(e, a) as f64,
                Some(value_mismatch()),
            ),
            (Word(_), _) | (_, Word(_)) => type_mismatch(),
            (Integer(_), Float(_)) | (Float(_), Integer(_))
                if self.settings.enforce_floating_point =>
            {
                type_mismatch()
            }
            _ => {
                // both numeric from here on
                let e = expected.as_f64().unwrap_or_default();
                let a = actual.as_f64().unwrap_or_default();
                if e == a {
                    (0.0, None)
                } else {
                    (
                        penalties.numeric_mismatch * (e - a).abs() / numeric_scale(e),
                        Some(value_mismatch()),
                    )
                }
            }
        }
    }
}
