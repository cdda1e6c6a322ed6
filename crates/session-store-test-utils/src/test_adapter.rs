// Test adapter runner.
//
// The `TestAdapter` runs test suites against one backend:
// 1. Builds a fresh adapter per case through the fixture
// 2. Executes each case and records the outcome
// 3. Reports per-suite and aggregate statistics
// 4. Fails if any case failed

use anyhow::bail;

use crate::fixture::AdapterFixture;
use crate::test_suite::{TestLogger, TestSuite, TestSuiteStats};

/// The test adapter runner.
pub struct TestAdapter<F> {
    fixture: F,
    suites: Vec<TestSuite>,
    log: TestLogger,
    all_stats: Vec<TestSuiteStats>,
}

impl<F: AdapterFixture> TestAdapter<F> {
    /// Runner with the full conformance suite.
    pub fn new(fixture: F) -> Self {
        let log = TestLogger::new(fixture.name());
        let suite = TestSuite::new(&format!("{} conformance", fixture.name()));
        Self {
            fixture,
            suites: vec![suite],
            log,
            all_stats: Vec::new(),
        }
    }

    /// Runner with custom suites instead of the full one.
    pub fn with_suites(fixture: F, suites: Vec<TestSuite>) -> Self {
        let log = TestLogger::new(fixture.name());
        Self {
            fixture,
            suites,
            log,
            all_stats: Vec::new(),
        }
    }

    pub fn stats(&self) -> &[TestSuiteStats] {
        &self.all_stats
    }

    /// Run all suites; errors when any case failed.
    pub async fn execute(&mut self) -> anyhow::Result<()> {
        self.log.info("Starting test adapter execution");

        let mut failed = Vec::new();
        for suite in &mut self.suites {
            self.log.info(&format!("Running suite: {}", suite.config.name));
            let cases = suite.cases.clone();

            for case in cases {
                let result = case.run(&self.fixture).await;
                match &result {
                    Ok(crate::cases::Outcome::Passed) => self.log.success(case.name()),
                    Ok(crate::cases::Outcome::Skipped(reason)) => self
                        .log
                        .warn(&format!("skipped {}: {reason}", case.name())),
                    Err(e) => self.log.error(&format!("{}: {e:#}", case.name())),
                }
                suite.record(case, &result);
                if result.is_err() && suite.config.fail_fast {
                    break;
                }
            }

            suite.finalize_stats();
            suite.print_stats();
            failed.extend(
                suite
                    .failures
                    .iter()
                    .map(|f| format!("{} > {}", suite.config.name, f.case.name())),
            );
            self.all_stats.push(suite.stats.clone());
        }

        self.print_aggregate_stats();

        if !failed.is_empty() {
            bail!("{} case(s) failed: {}", failed.len(), failed.join(", "));
        }
        Ok(())
    }

    fn print_aggregate_stats(&self) {
        if self.all_stats.len() < 2 {
            return;
        }
        let total = |f: fn(&TestSuiteStats) -> usize| -> usize { self.all_stats.iter().map(f).sum() };
        let duration: f64 = self.all_stats.iter().map(|s| s.suite_duration_ms).sum();

        let dash = "─".repeat(80);
        println!("\n{dash}");
        println!("AGGREGATE STATISTICS: {}", self.fixture.name());
        println!("{dash}");
        println!("  Suites: {}", self.all_stats.len());
        println!("  Tests: {}", total(|s| s.test_count));
        println!("  Passed: {}", total(|s| s.passed));
        println!("  Failed: {}", total(|s| s.failed));
        println!("  Skipped: {}", total(|s| s.skipped));
        println!("  Total Duration: {duration:.2}ms");
        println!("{dash}\n");
    }
}
