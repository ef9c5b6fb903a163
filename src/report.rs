use anyhow::Result;
use colored::Colorize;
use serde::Serialize;

use crate::scorer::Scorer;
use crate::smart_grader::SmartGrader;
use crate::test_case::GradingConfig;

const CHECKMARK: &str = "✔";
const XMARK: &str = "✘";

#[derive(Debug, Clone, Serialize)]
pub struct CaseReport {
    pub description: String,
    pub grade: f64,
    pub passed: bool,
    pub timed_out: bool,
    pub feedback: Vec<String>,
}

#[derive(Debug, Serialize, Default)]
pub struct FinalScore {
    pub passed: usize,
    pub failed: usize,
    pub timeout: usize,
    pub overall_grade: f64,
    pub tests: Vec<CaseReport>,
}

impl FinalScore {
    pub fn from_grader(sg: &SmartGrader) -> Result<Self> {
        let mut score = FinalScore {
            overall_grade: sg.overall_grade()?,
            ..Default::default()
        };

        for (i, result) in sg.candidate_results().iter().enumerate() {
            let assessment = sg.assess(i)?;
            let grade = Scorer::new(sg.settings()).grade_from_penalty(assessment.penalty);
            let passed = grade >= sg.settings().pass_threshold;

            if passed {
                score.passed += 1;
            } else {
                score.failed += 1;
            }
            if result.timed_out {
                score.timeout += 1;
            }

            score.tests.push(CaseReport {
                description: result.test_case.description.clone(),
                grade,
                passed,
                timed_out: result.timed_out,
                feedback: assessment.feedback,
            });
        }

        Ok(score)
    }

    /// Every test gets the compile failure grade.
    pub fn compile_failure(config: &GradingConfig) -> Self {
        let grade = Scorer::new(&config.settings).compile_failure_grade();
        let passed = grade >= config.settings.pass_threshold;

        let tests: Vec<CaseReport> = config
            .tests
            .iter()
            .map(|t| CaseReport {
                description: t.description.clone(),
                grade,
                passed,
                timed_out: false,
                feedback: vec!["Program failed to compile".to_string()],
            })
            .collect();

        FinalScore {
            passed: if passed { tests.len() } else { 0 },
            failed: if passed { 0 } else { tests.len() },
            timeout: 0,
            overall_grade: grade,
            tests,
        }
    }
}

/// Grades below 100 never round up to look perfect.
fn display_grade(grade: f64) -> String {
    let shown = if grade < 100.0 { grade.min(99.0) } else { grade };
    format!("{shown:3.0}%")
}

pub fn print_results(score: &FinalScore) {
    println!("{}", "Test Case Results".bold().underline());

    for (i, test) in score.tests.iter().enumerate() {
        let mark = if test.passed {
            CHECKMARK.green().bold()
        } else if test.timed_out {
            XMARK.yellow().bold()
        } else {
            XMARK.red().bold()
        };

        println!("{mark} ({i}) {}:", test.description);
        match test.feedback.split_first() {
            None => println!("{}", display_grade(test.grade).dimmed()),
            Some((first, rest)) => {
                println!("{}    {first}", display_grade(test.grade).dimmed());
                for f in rest {
                    println!("        {f}");
                }
            }
        }
    }

    println!(
        "{}",
        format!(
            "Tests Passed: [{}/{}]",
            score.passed,
            score.passed + score.failed
        )
        .bold()
    );
    println!(
        "{}",
        format!("Overall Grade: {:.02}%", score.overall_grade).bold()
    );
}

/// The candidate's stdout for `test_case` with every combined-vector token
/// highlighted: green when it matches the reference token at the same vector
/// position, red followed by the expected text otherwise.
pub fn highlight_output(sg: &SmartGrader, test_case: usize) -> Result<String> {
    let (expected_tokens, actual_tokens) =
        sg.combined_vectors(test_case, Some(sg.success_mask().as_slice()))?;

    let expected_out = &sg.reference_results()[test_case].stdout;
    let actual_out = &sg.candidate_results()[test_case].stdout;

    let mut rendered = String::new();
    let mut last_end = 0;

    for (k, token) in actual_tokens.iter().enumerate() {
        // merged word runs from different baselines can overlap
        if token.start < last_end {
            continue;
        }
        let expected = match expected_tokens.get(k.min(expected_tokens.len().saturating_sub(1))) {
            Some(t) => &expected_out[t.start..t.end],
            None => "",
        };
        let actual = &actual_out[token.start..token.end];

        rendered.push_str(&actual_out[last_end..token.start]);
        if expected == actual {
            rendered.push_str(&actual.green().bold().to_string());
        } else {
            rendered.push_str(&actual.red().bold().to_string());
            rendered.push_str(&format!("[{expected}]").dimmed().italic().to_string());
        }
        last_end = token.end;
    }
    rendered.push_str(&actual_out[last_end..]);

    Ok(rendered)
}

pub fn print_failing_outputs(sg: &SmartGrader, score: &FinalScore) -> Result<()> {
    for (i, test) in score.tests.iter().enumerate() {
        if !test.passed {
            println!("\n({i}) {}:\n", test.description.bold());
            println!("{}", highlight_output(sg, i)?);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::settings::Settings;
    use crate::test_case::{TestCase, TestResult};

    fn grader(reference: &[&str], candidate: &[&str]) -> SmartGrader {
        grader_with(Settings::default(), reference, candidate)
    }

    fn grader_with(settings: Settings, reference: &[&str], candidate: &[&str]) -> SmartGrader {
        let case = Arc::new(TestCase::new("case"));
        let to_results = |outputs: &[&str]| -> Vec<TestResult> {
            outputs
                .iter()
                .map(|o| TestResult::new(case.clone(), *o, 0))
                .collect()
        };
        let mut sg =
            SmartGrader::new(settings, to_results(reference), to_results(candidate))
                .unwrap();
        sg.analyze().unwrap();
        sg
    }

    #[test]
    fn display_grade_never_rounds_to_perfect() {
        assert_eq!(display_grade(100.0), "100%");
        assert_eq!(display_grade(99.7), " 99%");
        assert_eq!(display_grade(42.2), " 42%");
    }

    #[test]
    fn final_score_counts() {
        let sg = grader(&["x = 1", "x = 2"], &["x = 1", "x = 5"]);
        let score = FinalScore::from_grader(&sg).unwrap();
        assert_eq!(score.tests.len(), 2);
        assert_eq!(score.passed + score.failed, 2);
        assert!(score.overall_grade < 100.0);
    }

    #[test]
    fn highlight_keeps_candidate_text() {
        colored::control::set_override(false);
        let sg = grader(&["x = 1", "x = 2"], &["x = 1", "x = 5"]);
        assert_eq!(highlight_output(&sg, 1).unwrap(), "x = 5[2]");
    }

    #[test]
    fn highlight_skips_overlapping_word_runs() {
        colored::control::set_override(false);
        let outputs = ["the quick fox", "a slow fox", "the slow fox"];
        let sg = grader_with(
            Settings::default().with_connect_adjacent_words(true),
            &outputs,
            &outputs,
        );
        assert_eq!(highlight_output(&sg, 0).unwrap(), "the quick fox");
    }

    #[test]
    fn compile_failure_fails_every_test() {
        let config = GradingConfig::parse(r#"{ "tests": [ {}, {} ] }"#).unwrap();
        let score = FinalScore::compile_failure(&config);
        assert_eq!(score.failed, 2);
        assert!(score.overall_grade < 1.0);
    }
}
