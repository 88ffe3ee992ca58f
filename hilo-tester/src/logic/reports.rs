use anyhow::Result;
use chrono::{DateTime, Utc};
use colored::Colorize;
use hilo_game::{LeaderboardEntry, StreakTier, format_with_commas};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::time::Duration;

use super::ScenarioResult;

/// Everything a report renders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestReport {
    pub generated_at: DateTime<Utc>,
    pub catalog_size: usize,
    pub high_score: u32,
    pub results: Vec<ScenarioResult>,
    pub leaderboard: Vec<LeaderboardEntry>,
}

impl TestReport {
    #[must_use]
    pub fn passed(&self) -> bool {
        self.results.iter().all(|r| r.passed)
    }

    fn counts(&self) -> (usize, usize, f64) {
        let total = self.results.len();
        let passed = self.results.iter().filter(|r| r.passed).count();
        #[allow(clippy::cast_precision_loss)]
        let rate = if total == 0 {
            0.0
        } else {
            (passed as f64 / total as f64) * 100.0
        };
        (total, passed, rate)
    }
}

pub fn generate_console_report<W: Write + ?Sized>(
    writer: &mut W,
    report: &TestReport,
    total_duration: Duration,
) -> Result<()> {
    writeln!(writer)?;
    writeln!(writer, "{}", "📊 Simulation Results Summary".bright_cyan().bold())?;
    writeln!(writer, "{}", "=============================".cyan())?;

    let (total, passed, rate) = report.counts();
    writeln!(writer, "Catalog size: {}", report.catalog_size)?;
    writeln!(writer, "Policies: {total}")?;
    writeln!(writer, "Passed: {}", passed.to_string().green())?;
    writeln!(writer, "Failed: {}", (total - passed).to_string().red())?;
    writeln!(writer, "Success rate: {rate:.1}%")?;
    writeln!(writer, "Total time: {total_duration:?}")?;
    writeln!(writer)?;

    for result in &report.results {
        let status = if result.passed {
            "✅ PASS".green()
        } else {
            "❌ FAIL".red()
        };
        writeln!(writer, "{} {}", status, result.policy.bold())?;
        writeln!(
            writer,
            "   Runs: {}/{} clean ({} capped)",
            result.successful_iterations, result.iterations_run, result.capped_runs
        )?;
        writeln!(
            writer,
            "   Best streak: {} | average {:.2} | guesses {}",
            result.best_streak,
            result.average_streak,
            format_with_commas(result.total_guesses)
        )?;
        writeln!(writer, "   Pool resets: {}", result.pool_resets)?;
        writeln!(writer, "   Average time: {:?}", result.average_duration)?;
        if !result.failures.is_empty() {
            writeln!(writer, "   Failures:")?;
            for failure in &result.failures {
                writeln!(writer, "     • {}", failure.red())?;
            }
        }
        writeln!(writer)?;
    }

    writeln!(writer, "{}", "🏆 Leaderboard".bright_yellow().bold())?;
    writeln!(writer, "{}", "==============".yellow())?;
    writeln!(
        writer,
        "High score: {} ({})",
        report.high_score,
        StreakTier::for_score(report.high_score).message()
    )?;
    if report.leaderboard.is_empty() {
        writeln!(writer, "No scores submitted.")?;
    }
    for (index, entry) in report.leaderboard.iter().enumerate() {
        writeln!(
            writer,
            "{:>2}. {:<20} {}",
            index + 1,
            entry.player_name,
            entry.score
        )?;
    }
    Ok(())
}

pub fn generate_json_report<W: Write + ?Sized>(writer: &mut W, report: &TestReport) -> Result<()> {
    serde_json::to_writer_pretty(&mut *writer, report)?;
    writeln!(writer)?;
    Ok(())
}

pub fn generate_markdown_report<W: Write + ?Sized>(
    writer: &mut W,
    report: &TestReport,
) -> Result<()> {
    writeln!(writer, "# Meme Higher or Lower Simulation Results\n")?;
    writeln!(writer, "_Generated {}_\n", report.generated_at.to_rfc3339())?;

    let (total, passed, rate) = report.counts();
    writeln!(writer, "## Summary\n")?;
    writeln!(writer, "- **Catalog size**: {}", report.catalog_size)?;
    writeln!(writer, "- **Policies**: {total}")?;
    writeln!(writer, "- **Passed**: {passed}")?;
    writeln!(writer, "- **Failed**: {}", total - passed)?;
    writeln!(writer, "- **Success rate**: {rate:.1}%")?;
    writeln!(writer, "- **High score**: {}\n", report.high_score)?;

    writeln!(writer, "## Policies\n")?;
    writeln!(
        writer,
        "| Policy | Status | Runs | Capped | Best | Average | Pool resets |"
    )?;
    writeln!(writer, "|---|---|---|---|---|---|---|")?;
    for result in &report.results {
        let status = if result.passed { "✅" } else { "❌" };
        writeln!(
            writer,
            "| {} | {} | {}/{} | {} | {} | {:.2} | {} |",
            result.policy,
            status,
            result.successful_iterations,
            result.iterations_run,
            result.capped_runs,
            result.best_streak,
            result.average_streak,
            result.pool_resets
        )?;
    }

    let failing: Vec<_> = report.results.iter().filter(|r| !r.passed).collect();
    if !failing.is_empty() {
        writeln!(writer, "\n## Failures\n")?;
        for result in failing {
            writeln!(writer, "### {}\n", result.policy)?;
            for failure in &result.failures {
                writeln!(writer, "- {failure}")?;
            }
            writeln!(writer)?;
        }
    }

    writeln!(writer, "\n## Leaderboard\n")?;
    if report.leaderboard.is_empty() {
        writeln!(writer, "_No scores submitted._")?;
    } else {
        writeln!(writer, "| Rank | Player | Score |")?;
        writeln!(writer, "|---|---|---|")?;
        for (index, entry) in report.leaderboard.iter().enumerate() {
            writeln!(
                writer,
                "| {} | {} | {} |",
                index + 1,
                entry.player_name,
                entry.score
            )?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(policy: &str, passed: bool) -> ScenarioResult {
        ScenarioResult {
            policy: policy.to_string(),
            passed,
            iterations_run: 4,
            successful_iterations: if passed { 4 } else { 3 },
            failures: if passed {
                Vec::new()
            } else {
                vec!["seed 9: streak changed on a miss".to_string()]
            },
            best_streak: 7,
            average_streak: 2.5,
            total_guesses: 1_234,
            capped_runs: 0,
            pool_resets: 1,
            average_duration: Duration::from_micros(40),
            runs: Vec::new(),
        }
    }

    fn report() -> TestReport {
        TestReport {
            generated_at: Utc::now(),
            catalog_size: 16,
            high_score: 7,
            results: vec![result("random", true), result("always-higher", false)],
            leaderboard: vec![LeaderboardEntry {
                id: "entry-000001".to_string(),
                player_name: "random-3".to_string(),
                score: 7,
                timestamp: 1,
            }],
        }
    }

    #[test]
    fn json_report_round_trips() {
        let mut buffer = Vec::new();
        generate_json_report(&mut buffer, &report()).unwrap();
        let parsed: TestReport = serde_json::from_slice(&buffer).unwrap();
        assert_eq!(parsed.results.len(), 2);
        assert!(!parsed.passed());
        assert_eq!(parsed.leaderboard[0].player_name, "random-3");
    }

    #[test]
    fn markdown_lists_failures_and_leaderboard() {
        let mut buffer = Vec::new();
        generate_markdown_report(&mut buffer, &report()).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert!(text.contains("| random | ✅ | 4/4 |"));
        assert!(text.contains("### always-higher"));
        assert!(text.contains("streak changed on a miss"));
        assert!(text.contains("| 1 | random-3 | 7 |"));
    }

    #[test]
    fn console_report_groups_thousands() {
        colored::control::set_override(false);
        let mut buffer = Vec::new();
        generate_console_report(&mut buffer, &report(), Duration::from_millis(3)).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert!(text.contains("guesses 1,234"));
        assert!(text.contains("Success rate: 50.0%"));
        assert!(text.contains("Nice streak!"));
    }
}
