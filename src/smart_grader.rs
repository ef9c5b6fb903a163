use rayon::prelude::*;

use crate::aligner::DiffAligner;
use crate::error::{GraderError, Result};
use crate::scorer::{Assessment, Scorer};
use crate::settings::Settings;
use crate::test_case::TestResult;
use crate::token::{normalize, Token};

/// Square table of diff token vectors. Cell `(i, j)` holds the tokens of
/// output `i` that differ from output `j`, in output `i`'s coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenMatrix {
    size: usize,
    cells: Vec<Vec<Token>>,
}

impl TokenMatrix {
    /// Every cell is independent, so the sweep runs on the rayon pool.
    pub fn build(outputs: &[&str], aligner: &DiffAligner) -> Self {
        let size = outputs.len();
        let cells = (0..size * size)
            .into_par_iter()
            .map(|k| {
                let (i, j) = (k / size, k % size);
                let tokens = aligner.diff_output(outputs[i], outputs[j]);
                tracing::debug!("cell ({i}, {j}): {} tokens", tokens.len());
                tokens
            })
            .collect();

        Self { size, cells }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn get(&self, i: usize, j: usize) -> &[Token] {
        &self.cells[i * self.size + j]
    }

    /// Union of row `i` over the columns selected by `mask`, sorted and
    /// deduplicated.
    pub fn combined_row(&self, i: usize, mask: &[bool]) -> Vec<Token> {
        let mut tokens: Vec<Token> = (0..self.size)
            .filter(|&j| mask[j])
            .flat_map(|j| self.get(i, j).iter().cloned())
            .collect();
        normalize(&mut tokens);
        tokens
    }
}

/// Grades candidate outputs against reference outputs of the same test cases.
#[derive(Debug, Clone)]
pub struct SmartGrader {
    settings: Settings,
    reference: Vec<TestResult>,
    candidate: Vec<TestResult>,
    matrices: Option<(TokenMatrix, TokenMatrix)>,
}

impl SmartGrader {
    pub fn new(
        settings: Settings,
        reference: Vec<TestResult>,
        candidate: Vec<TestResult>,
    ) -> Result<Self> {
        settings.validate()?;

        Ok(Self {
            settings,
            reference,
            candidate,
            matrices: None,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn reference_results(&self) -> &[TestResult] {
        &self.reference
    }

    pub fn candidate_results(&self) -> &[TestResult] {
        &self.candidate
    }

    pub fn case_count(&self) -> usize {
        self.reference.len()
    }

    /// Builds the reference and candidate token matrices.
    pub fn analyze(&mut self) -> Result<()> {
        if self.reference.len() != self.candidate.len() {
            return Err(GraderError::MismatchedCaseCount {
                reference: self.reference.len(),
                candidate: self.candidate.len(),
            });
        }

        tracing::info!("Analyzing {} test cases", self.case_count());

        let aligner = DiffAligner::new(&self.settings);
        let reference: Vec<&str> = self.reference.iter().map(|r| r.stdout.as_str()).collect();
        let candidate: Vec<&str> = self.candidate.iter().map(|r| r.stdout.as_str()).collect();

        let (reference, candidate) = rayon::join(
            || TokenMatrix::build(&reference, &aligner),
            || TokenMatrix::build(&candidate, &aligner),
        );
        self.matrices = Some((reference, candidate));

        Ok(())
    }

    fn check_index(&self, test_case: usize) -> Result<()> {
        if test_case >= self.case_count() {
            return Err(GraderError::TestCaseIndex {
                index: test_case,
                case_count: self.case_count(),
            });
        }
        Ok(())
    }

    fn matrices(&self) -> Result<&(TokenMatrix, TokenMatrix)> {
        self.matrices.as_ref().ok_or(GraderError::NotAnalyzed)
    }

    /// Test cases the candidate ran to completion with exit code 0.
    pub fn success_mask(&self) -> Vec<bool> {
        self.candidate.iter().map(TestResult::succeeded).collect()
    }

    /// The tokens of `test_case` that differ from any masked test case, for the
    /// reference and the candidate. `None` selects every test case.
    pub fn combined_vectors(
        &self,
        test_case: usize,
        mask: Option<&[bool]>,
    ) -> Result<(Vec<Token>, Vec<Token>)> {
        self.check_index(test_case)?;
        let (reference, candidate) = self.matrices()?;

        let all = vec![true; self.case_count()];
        let mask = mask.unwrap_or(all.as_slice());
        if mask.len() != self.case_count() {
            return Err(GraderError::MaskLength {
                expected: self.case_count(),
                actual: mask.len(),
            });
        }

        Ok((
            reference.combined_row(test_case, mask),
            candidate.combined_row(test_case, mask),
        ))
    }

    pub fn assess(&self, test_case: usize) -> Result<Assessment> {
        let (reference_tokens, candidate_tokens) =
            self.combined_vectors(test_case, Some(self.success_mask().as_slice()))?;

        Ok(Scorer::new(&self.settings).assess(
            &self.reference[test_case],
            &self.candidate[test_case],
            &reference_tokens,
            &candidate_tokens,
        ))
    }

    /// Grade in `0..=100`; exactly 100 only when nothing was penalized.
    pub fn grade(&self, test_case: usize) -> Result<f64> {
        let assessment = self.assess(test_case)?;
        Ok(Scorer::new(&self.settings).grade_from_penalty(assessment.penalty))
    }

    pub fn feedback(&self, test_case: usize) -> Result<Vec<String>> {
        Ok(self.assess(test_case)?.feedback)
    }

    pub fn passed(&self, test_case: usize) -> Result<bool> {
        Ok(self.grade(test_case)? >= self.settings.pass_threshold)
    }

    /// Weighted mean of all grades; 100 if every weight is zero.
    pub fn overall_grade(&self) -> Result<f64> {
        let mut total = 0.0;
        let mut weight = 0.0;

        for i in 0..self.case_count() {
            let w = self.reference[i].test_case.weight;
            total += self.grade(i)? * w;
            weight += w;
        }

        if weight == 0.0 {
            self.matrices()?;
            return Ok(100.0);
        }
        Ok(total / weight)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::test_case::TestCase;
    use crate::token::TokenValue;

    fn results(outputs: &[&str]) -> Vec<TestResult> {
        outputs
            .iter()
            .map(|o| TestResult::new(Arc::new(TestCase::default()), *o, 0))
            .collect()
    }

    #[test]
    fn diagonal_is_empty() {
        let aligner = DiffAligner::new(&Settings::default());
        let m = TokenMatrix::build(&["a 1", "a 2", "b 2"], &aligner);
        assert_eq!(m.size(), 3);
        for i in 0..3 {
            assert!(m.get(i, i).is_empty());
        }
        assert_eq!(
            m.get(0, 1),
            &[Token::new(TokenValue::Integer(1), 2, 3)]
        );
    }

    #[test]
    fn combined_row_is_a_sorted_union() {
        let aligner = DiffAligner::new(&Settings::default());
        let m = TokenMatrix::build(&["a 1", "a 2", "b 1"], &aligner);
        let row = m.combined_row(0, &[true, true, true]);
        assert_eq!(
            row,
            vec![
                Token::word("a", 0, 1),
                Token::new(TokenValue::Integer(1), 2, 3)
            ]
        );

        let row = m.combined_row(0, &[true, false, true]);
        assert_eq!(row, vec![Token::word("a", 0, 1)]);
    }

    #[test]
    fn requires_analyze_and_valid_indices() {
        let mut grader =
            SmartGrader::new(Settings::default(), results(&["x"]), results(&["x"])).unwrap();
        assert_eq!(grader.grade(0), Err(GraderError::NotAnalyzed));

        grader.analyze().unwrap();
        assert_eq!(grader.grade(0), Ok(100.0));
        assert_eq!(
            grader.feedback(3),
            Err(GraderError::TestCaseIndex {
                index: 3,
                case_count: 1
            })
        );
        assert!(matches!(
            grader.combined_vectors(0, Some(&[true, false][..])),
            Err(GraderError::MaskLength { .. })
        ));
    }

    #[test]
    fn mismatched_case_counts_fail_analyze() {
        let mut grader =
            SmartGrader::new(Settings::default(), results(&["a", "b"]), results(&["a"])).unwrap();
        assert_eq!(
            grader.analyze(),
            Err(GraderError::MismatchedCaseCount {
                reference: 2,
                candidate: 1
            })
        );
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let settings = Settings::default().with_penalty_weight(-1.0);
        assert!(SmartGrader::new(settings, results(&[]), results(&[])).is_err());
    }

    #[test]
    fn overall_grade_is_weighted() {
        let light = Arc::new(TestCase::default());
        let mut heavy = TestCase::default();
        heavy.weight = 3.0;
        let heavy = Arc::new(heavy);

        let reference = vec![
            TestResult::new(light.clone(), "n = 1", 0),
            TestResult::new(heavy.clone(), "n = 2", 0),
        ];
        let candidate = vec![
            TestResult::new(light, "n = 1", 1),
            TestResult::new(heavy, "n = 2", 0),
        ];

        let mut grader = SmartGrader::new(Settings::default(), reference, candidate).unwrap();
        grader.analyze().unwrap();

        let first = grader.grade(0).unwrap();
        assert!(first < 100.0);
        assert_eq!(grader.grade(1).unwrap(), 100.0);
        let expected = (first + 3.0 * 100.0) / 4.0;
        assert!((grader.overall_grade().unwrap() - expected).abs() < 1e-9);
    }
}
