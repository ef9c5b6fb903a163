use std::io::{self, Read, Write};
use std::os::unix::process::ExitStatusExt;
use std::process::{Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::{anyhow, bail, Context, Result};
use rayon::prelude::*;
use wait_timeout::ChildExt;

use crate::test_case::{TestCase, TestResult};

/// A program to run, as an argv. Parsed from a comma-separated command line
/// (`python3,solution.py`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    argv: Vec<String>,
}

fn exit_code(status: ExitStatus) -> i32 {
    match status.code() {
        Some(code) => code,
        None => 128 + status.signal().unwrap_or(0),
    }
}

fn read_in_background<R>(mut reader: R) -> JoinHandle<io::Result<String>>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    })
}

fn join_output(handle: JoinHandle<io::Result<String>>) -> Result<String> {
    handle
        .join()
        .map_err(|_| anyhow!("Output reader thread panicked"))?
        .context("Failed to read program output")
}

impl Program {
    pub fn parse(command: &str) -> Result<Self> {
        let argv: Vec<String> = command
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();

        if argv.is_empty() {
            bail!("Expected a command to run instead got: {command:?}");
        }

        Ok(Self { argv })
    }

    pub fn name(&self) -> &str {
        &self.argv[0]
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.argv[0]);
        cmd.args(&self.argv[1..]);
        cmd
    }

    /// Runs the program as a build step. Returns whether it succeeded.
    pub fn build(&self) -> Result<bool> {
        let output = self
            .command()
            .output()
            .with_context(|| format!("Failed to start build command {:?}", self.name()))?;

        if !output.status.success() {
            tracing::warn!(
                "Build command {:?} failed:\n{}{}",
                self.name(),
                String::from_utf8_lossy(&output.stdout),
                String::from_utf8_lossy(&output.stderr)
            );
        }

        Ok(output.status.success())
    }

    /// Runs one test case: writes its stdin, closes it, and waits up to the
    /// test's timeout before killing the program.
    pub fn run(&self, test: &Arc<TestCase>) -> Result<TestResult> {
        tracing::debug!("Running {:?} on {:?}", self.name(), test.description);

        let mut child = self
            .command()
            .args(&test.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to start {:?}", self.name()))?;

        let mut stdin = child.stdin.take().ok_or(anyhow!("No stdin for child"))?;
        let input = test.stdin.clone();
        // stdin is closed when the writer thread drops it
        let writer = thread::spawn(move || stdin.write_all(input.as_bytes()));

        let stdout = read_in_background(child.stdout.take().ok_or(anyhow!("No stdout for child"))?);
        let stderr = read_in_background(child.stderr.take().ok_or(anyhow!("No stderr for child"))?);

        let (exit_code, timed_out) = match child.wait_timeout(test.timeout())? {
            Some(status) => (exit_code(status), false),
            None => {
                child.kill()?;
                let status = child.wait()?;
                tracing::debug!("{:?} timed out on {:?}", self.name(), test.description);
                (exit_code(status), true)
            }
        };

        if let Ok(Err(e)) = writer.join() {
            // programs that never read their input close the pipe early
            if e.kind() != io::ErrorKind::BrokenPipe {
                tracing::warn!("Failed to write stdin of {:?}: {e}", self.name());
            }
        }

        Ok(TestResult {
            test_case: Arc::clone(test),
            stdout: join_output(stdout)?,
            stderr: join_output(stderr)?,
            exit_code,
            timed_out,
        })
    }

    /// Runs every test case on the rayon pool, keeping their order.
    pub fn run_all(&self, tests: &[Arc<TestCase>]) -> Result<Vec<TestResult>> {
        tests.par_iter().map(|test| self.run(test)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_comma_separated_commands() {
        let p = Program::parse("python3, solution.py ,").unwrap();
        assert_eq!(p.argv, vec!["python3", "solution.py"]);
        assert_eq!(p.name(), "python3");
        assert!(Program::parse(" , ").is_err());
    }

    #[test]
    fn captures_output_and_exit_code() {
        let program = Program::parse("sh,-c,cat; echo oops >&2; exit 3").unwrap();
        let test = Arc::new(TestCase::new("echo").with_stdin("hello\n"));
        let result = program.run(&test).unwrap();

        assert_eq!(result.stdout, "hello\n");
        assert_eq!(result.stderr, "oops\n");
        assert_eq!(result.exit_code, 3);
        assert!(!result.timed_out);
    }

    #[test]
    fn kills_programs_that_time_out() {
        let program = Program::parse("sleep,5").unwrap();
        let mut test = TestCase::new("slow");
        test.timeout = 0.2;
        let result = program.run(&Arc::new(test)).unwrap();

        assert!(result.timed_out);
        assert_ne!(result.exit_code, 0);
    }
}
