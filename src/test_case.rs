use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::settings::Settings;

fn default_timeout() -> f64 {
    5.0
}

fn default_weight() -> f64 {
    1.0
}

/// Everything needed to run one test case and check its output.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TestCase {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub stdin: String,
    /// Extra arguments appended to the program's command line
    #[serde(default)]
    pub args: Vec<String>,
    /// Seconds
    #[serde(default = "default_timeout")]
    pub timeout: f64,
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default)]
    pub required_strings: Vec<String>,
    #[serde(default)]
    pub required_strings_stderr: Vec<String>,
}

impl Default for TestCase {
    fn default() -> Self {
        Self {
            description: String::new(),
            stdin: String::new(),
            args: Vec::new(),
            timeout: default_timeout(),
            weight: default_weight(),
            required_strings: Vec::new(),
            required_strings_stderr: Vec::new(),
        }
    }
}

impl TestCase {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..Self::default()
        }
    }

    pub fn with_stdin(mut self, stdin: impl Into<String>) -> Self {
        self.stdin = stdin.into();
        self
    }

    pub fn with_required_string(mut self, s: impl Into<String>) -> Self {
        self.required_strings.push(s.into());
        self
    }

    pub fn with_required_string_stderr(mut self, s: impl Into<String>) -> Self {
        self.required_strings_stderr.push(s.into());
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout.max(0.0))
    }
}

/// Outcome of running one program on one test case.
#[derive(Debug, Clone, PartialEq)]
pub struct TestResult {
    pub test_case: Arc<TestCase>,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub timed_out: bool,
}

impl TestResult {
    pub fn new(test_case: Arc<TestCase>, stdout: impl Into<String>, exit_code: i32) -> Self {
        Self {
            test_case,
            stdout: stdout.into(),
            stderr: String::new(),
            exit_code,
            timed_out: false,
        }
    }

    pub fn with_stderr(mut self, stderr: impl Into<String>) -> Self {
        self.stderr = stderr.into();
        self
    }

    pub fn with_timed_out(mut self, timed_out: bool) -> Self {
        self.timed_out = timed_out;
        self
    }

    pub fn succeeded(&self) -> bool {
        self.exit_code == 0 && !self.timed_out
    }
}

#[derive(Deserialize)]
struct RawConfig {
    #[serde(default)]
    settings: serde_json::Value,
    tests: Vec<TestCase>,
}

/// A grading configuration file: settings plus the test cases to run.
#[derive(Debug, Clone)]
pub struct GradingConfig {
    pub settings: Settings,
    pub tests: Vec<Arc<TestCase>>,
}

impl GradingConfig {
    pub fn load<P>(p: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let text = fs::read_to_string(p.as_ref())
            .with_context(|| format!("Failed to read config {:?}", p.as_ref()))?;
        Self::parse(&text).with_context(|| format!("Config {:?} is invalid", p.as_ref()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        let raw: RawConfig = serde_json::from_str(text)?;

        if raw.tests.is_empty() {
            bail!("Expected at least one test case");
        }

        let settings = if raw.settings.is_null() {
            Settings::default()
        } else {
            Settings::from_json(raw.settings)?
        };
        settings.validate()?;

        for (i, test) in raw.tests.iter().enumerate() {
            if !test.timeout.is_finite() || test.timeout <= 0.0 {
                bail!("Test {i} has an invalid timeout: {}", test.timeout);
            }
            if !test.weight.is_finite() || test.weight < 0.0 {
                bail!("Test {i} has an invalid weight: {}", test.weight);
            }
        }

        Ok(Self {
            settings,
            tests: raw.tests.into_iter().map(Arc::new).collect(),
        })
    }
}
