// Test suite definition.
//
// A `TestSuite` names a batch of conformance cases and tracks statistics
// (pass/fail/skip counts, duration) while `TestAdapter` drives it.

use std::time::Instant;

use crate::cases::{Case, Outcome};

/// Statistics for a completed test suite.
#[derive(Debug, Clone)]
pub struct TestSuiteStats {
    pub suite_name: String,
    pub test_count: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub suite_start_time: Instant,
    pub suite_duration_ms: f64,
}

impl TestSuiteStats {
    fn new(suite_name: &str) -> Self {
        Self {
            suite_name: suite_name.to_string(),
            test_count: 0,
            passed: 0,
            failed: 0,
            skipped: 0,
            suite_start_time: Instant::now(),
            suite_duration_ms: 0.0,
        }
    }
}

/// Configuration for a test suite.
#[derive(Debug, Clone)]
pub struct TestSuiteConfig {
    /// Name of the test suite.
    pub name: String,
    /// Stop at the first failing case.
    pub fail_fast: bool,
}

impl Default for TestSuiteConfig {
    fn default() -> Self {
        Self {
            name: "session store conformance".to_string(),
            fail_fast: false,
        }
    }
}

/// A failed case with its rendered error chain.
#[derive(Debug, Clone)]
pub struct CaseFailure {
    pub case: Case,
    pub error: String,
}

/// Logger scoped to one backend; everything goes through `tracing`.
#[derive(Debug, Clone)]
pub struct TestLogger {
    pub adapter_name: String,
}

impl TestLogger {
    pub fn new(adapter_name: &str) -> Self {
        Self {
            adapter_name: adapter_name.to_string(),
        }
    }

    pub fn info(&self, msg: &str) {
        tracing::info!(adapter = %self.adapter_name, "{msg}");
    }

    pub fn success(&self, msg: &str) {
        tracing::info!(adapter = %self.adapter_name, "✓ {msg}");
    }

    pub fn warn(&self, msg: &str) {
        tracing::warn!(adapter = %self.adapter_name, "{msg}");
    }

    pub fn error(&self, msg: &str) {
        tracing::error!(adapter = %self.adapter_name, "✗ {msg}");
    }
}

/// A batch of conformance cases.
#[derive(Debug, Clone)]
pub struct TestSuite {
    pub config: TestSuiteConfig,
    pub cases: Vec<Case>,
    pub stats: TestSuiteStats,
    pub failures: Vec<CaseFailure>,
}

impl TestSuite {
    /// A suite holding every case.
    pub fn new(name: &str) -> Self {
        Self::with_cases(name, Case::ALL)
    }

    pub fn with_cases(name: &str, cases: impl IntoIterator<Item = Case>) -> Self {
        Self {
            config: TestSuiteConfig {
                name: name.to_string(),
                ..TestSuiteConfig::default()
            },
            cases: cases.into_iter().collect(),
            stats: TestSuiteStats::new(name),
            failures: Vec::new(),
        }
    }

    pub fn fail_fast(mut self, fail_fast: bool) -> Self {
        self.config.fail_fast = fail_fast;
        self
    }

    pub fn test_count(&self) -> usize {
        self.cases.len()
    }

    /// Record the result of one case.
    pub fn record(&mut self, case: Case, result: &anyhow::Result<Outcome>) {
        match result {
            Ok(Outcome::Passed) => self.stats.passed += 1,
            Ok(Outcome::Skipped(_)) => self.stats.skipped += 1,
            Err(e) => {
                self.stats.failed += 1;
                self.failures.push(CaseFailure {
                    case,
                    error: format!("{e:#}"),
                });
            }
        }
    }

    pub fn finalize_stats(&mut self) {
        self.stats.test_count = self.stats.passed + self.stats.failed + self.stats.skipped;
        self.stats.suite_duration_ms =
            self.stats.suite_start_time.elapsed().as_secs_f64() * 1000.0;
    }

    pub fn succeeded(&self) -> bool {
        self.failures.is_empty()
    }

    /// Print a statistics summary.
    pub fn print_stats(&self) {
        let dash = "─".repeat(80);
        println!("\n{dash}");
        println!("TEST SUITE STATISTICS: {}", self.stats.suite_name);
        println!("{dash}");
        println!("  Tests: {}", self.stats.test_count);
        println!("  Passed: {}", self.stats.passed);
        println!("  Failed: {}", self.stats.failed);
        println!("  Skipped: {}", self.stats.skipped);
        println!("  Suite Duration: {:.2}ms", self.stats.suite_duration_ms);
        for failure in &self.failures {
            println!("    ✗ {}: {}", failure.case.name(), failure.error);
        }
        println!("{dash}\n");
    }
}
