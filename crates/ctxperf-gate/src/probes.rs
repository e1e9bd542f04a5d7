//! Sources of external evidence for checks: benchmark scores and
//! integration test runs.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ctxperf_core::PerformanceOptimizer;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tokio::time::Instant;
use tracing::debug;

/// Produces a normalized benchmark score, higher is better.
#[async_trait]
pub trait BenchmarkProbe: Send + Sync {
    async fn measure(&self) -> anyhow::Result<f64>;
}

/// Benchmarks the engine and reports its composite score as 0.0 - 1.0.
#[derive(Debug, Clone)]
pub struct OptimizerBenchmark {
    optimizer: Arc<PerformanceOptimizer>,
}

impl OptimizerBenchmark {
    pub fn new(optimizer: Arc<PerformanceOptimizer>) -> Self {
        Self { optimizer }
    }
}

#[async_trait]
impl BenchmarkProbe for OptimizerBenchmark {
    async fn measure(&self) -> anyhow::Result<f64> {
        let result = self.optimizer.run_benchmark("quality-gate").await;
        Ok(result.score / 100.0)
    }
}

/// An integration test selected when a changed path starts with one of
/// `paths`. An empty `paths` selects the test for every change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrationTest {
    pub name: String,
    pub command: Vec<String>,
    #[serde(default)]
    pub paths: Vec<String>,
    #[serde(default = "default_test_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_test_timeout_ms() -> u64 {
    120_000
}

impl IntegrationTest {
    pub fn new<I, S>(name: impl Into<String>, command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            command: command.into_iter().map(Into::into).collect(),
            paths: Vec::new(),
            timeout_ms: default_test_timeout_ms(),
        }
    }

    pub fn for_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.paths = paths.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn applies_to<'a>(&self, mut changed: impl Iterator<Item = &'a str>) -> bool {
        self.paths.is_empty() || changed.any(|p| self.paths.iter().any(|prefix| p.starts_with(prefix.as_str())))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestRun {
    pub name: String,
    pub passed: bool,
    pub exit_code: i32,
    pub duration_ms: u64,
    /// Tail of stderr, or the launch error.
    pub output: String,
}

/// Runs integration tests.
#[async_trait]
pub trait IntegrationSuite: Send + Sync {
    async fn run(&self, test: &IntegrationTest) -> anyhow::Result<TestRun>;
}

/// Runs each test as a child process. A non-zero exit or timeout fails the test.
#[derive(Debug, Clone, Default)]
pub struct CommandSuite {
    working_dir: Option<std::path::PathBuf>,
}

impl CommandSuite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_dir(dir: impl Into<std::path::PathBuf>) -> Self {
        Self {
            working_dir: Some(dir.into()),
        }
    }
}

const OUTPUT_TAIL: usize = 2_000;

fn tail(text: &str) -> String {
    let start = text.len().saturating_sub(OUTPUT_TAIL);
    let start = (start..text.len()).find(|&i| text.is_char_boundary(i)).unwrap_or(text.len());
    text[start..].to_string()
}

#[async_trait]
impl IntegrationSuite for CommandSuite {
    async fn run(&self, test: &IntegrationTest) -> anyhow::Result<TestRun> {
        let Some((exe, args)) = test.command.split_first() else {
            anyhow::bail!("integration test {} has empty command", test.name);
        };
        let started = Instant::now();

        let mut command = Command::new(exe);
        command
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }
        let child = command.spawn()?;

        let output = match tokio::time::timeout(Duration::from_millis(test.timeout_ms), child.wait_with_output()).await
        {
            Ok(output) => output?,
            Err(_) => {
                return Ok(TestRun {
                    name: test.name.clone(),
                    passed: false,
                    exit_code: -1,
                    duration_ms: started.elapsed().as_millis() as u64,
                    output: format!("timed out after {}ms", test.timeout_ms),
                })
            }
        };

        let run = TestRun {
            name: test.name.clone(),
            passed: output.status.success(),
            exit_code: output.status.code().unwrap_or(-1),
            duration_ms: started.elapsed().as_millis() as u64,
            output: tail(&String::from_utf8_lossy(&output.stderr)),
        };
        debug!(test = %run.name, passed = run.passed, exit_code = run.exit_code, "integration test finished");
        Ok(run)
    }
}
