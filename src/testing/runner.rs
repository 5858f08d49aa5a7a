//! Test runner implementation
//!
//! Executes test scenarios against a harness backed by the mock engine,
//! asserting on the exact protocol transcript the session produces.

use std::collections::VecDeque;
use std::path::Path;

use colored::Colorize;
use serde_json::Value;

use crate::backend::{MockBackend, SourceUnit};
use crate::common::config::Config;
use crate::common::{Error, Result};
use crate::harness::{HarnessOptions, InspectorTester, PendingResult, RECORD_TERMINATOR};

use super::config::{EvalExpectation, TestScenario, TestStep};

/// Result of a test run
#[derive(Debug)]
pub struct TestResult {
    pub name: String,
    pub passed: bool,
    pub steps_run: usize,
    pub steps_total: usize,
    pub error: Option<String>,
}

/// State carried between steps
struct StepContext<'a> {
    tester: &'a InspectorTester<MockBackend>,
    config: &'a Config,
    in_flight: VecDeque<(String, PendingResult<Value>)>,
}

/// Run a test scenario from a YAML file
pub fn run_scenario(path: &Path, config: &Config, verbose: bool) -> Result<TestResult> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!(
            "Failed to read test scenario '{}': {}",
            path.display(),
            e
        ))
    })?;

    let scenario: TestScenario = serde_yaml::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse test scenario: {}", e)))?;

    run(scenario, config, verbose)
}

/// Run an already parsed scenario
pub fn run(scenario: TestScenario, config: &Config, verbose: bool) -> Result<TestResult> {
    let steps_total = scenario.steps.len();

    println!(
        "\n{} {}",
        "Running Test:".blue().bold(),
        scenario.name.white().bold()
    );

    if let Some(desc) = &scenario.description {
        println!("  {}", desc.dimmed());
    }

    let options = HarnessOptions {
        suspend_on_entry: scenario.suspend_on_entry || config.harness.suspend_on_entry,
        ..HarnessOptions::from_config(config)
    };
    let tester = InspectorTester::start_with(MockBackend::new(), options)?;

    if verbose {
        println!(
            "  Context: {}",
            tester.context_id().to_string().dimmed()
        );
    }

    println!("\n{}", "Steps:".cyan());

    let mut cx = StepContext {
        tester: &tester,
        config,
        in_flight: VecDeque::new(),
    };

    for (i, step) in scenario.steps.iter().enumerate() {
        let step_num = i + 1;

        if let Err(e) = execute_step(&mut cx, step, step_num, verbose) {
            println!("  {} Step {}: {}", "✗".red(), step_num, e);

            drop(cx);
            if let Err(e) = tester.finish() {
                tracing::warn!(error = %e, "harness shutdown failed");
            }

            return Ok(TestResult {
                name: scenario.name,
                passed: false,
                steps_run: step_num,
                steps_total,
                error: Some(e.to_string()),
            });
        }
    }

    if let Some((name, _)) = cx.in_flight.front() {
        let error = format!("Evaluation '{}' was never awaited", name);
        println!("  {} {}", "✗".red(), error);
        drop(cx);
        tester.finish()?;
        return Ok(TestResult {
            name: scenario.name,
            passed: false,
            steps_run: steps_total,
            steps_total,
            error: Some(error),
        });
    }

    drop(cx);
    tester.finish()?;

    println!(
        "\n{} {}\n",
        "✓".green().bold(),
        "Test Passed".green().bold()
    );

    Ok(TestResult {
        name: scenario.name,
        passed: true,
        steps_run: steps_total,
        steps_total,
        error: None,
    })
}

/// Execute a single test step
fn execute_step(cx: &mut StepContext<'_>, step: &TestStep, step_num: usize, verbose: bool) -> Result<()> {
    match step {
        TestStep::Send { message } => {
            cx.tester.send_message(message)?;
            println!("  {} Step {}: send {}", "✓".green(), step_num, message.dimmed());
            Ok(())
        }
        TestStep::Eval {
            name,
            source,
            wait,
            expect,
        } => {
            let name = name.clone().unwrap_or_else(|| "scenario".to_string());
            let pending = cx.tester.eval(SourceUnit::new(name.as_str(), source.as_str()));
            if *wait {
                let outcome = wait_for(cx.config, pending);
                check_eval(&name, outcome, expect.as_ref(), step_num, verbose)
            } else {
                println!(
                    "  {} Step {}: eval {} (in flight)",
                    "✓".green(),
                    step_num,
                    name.dimmed()
                );
                cx.in_flight.push_back((name, pending));
                Ok(())
            }
        }
        TestStep::AwaitEval { expect } => {
            let (name, pending) = cx.in_flight.pop_front().ok_or_else(|| {
                Error::TestAssertion("await_eval without an evaluation in flight".to_string())
            })?;
            let outcome = wait_for(cx.config, pending);
            check_eval(&name, outcome, expect.as_ref(), step_num, verbose)
        }
        TestStep::ExpectMessages { messages } => {
            let expected = transcript(messages);
            match cx.config.timeouts.receive() {
                Some(timeout) => cx.tester.compare_received_messages_within(&expected, timeout)?,
                None => cx.tester.compare_received_messages(&expected)?,
            }
            println!(
                "  {} Step {}: received {} message(s)",
                "✓".green(),
                step_num,
                messages.len()
            );
            if verbose {
                for message in messages {
                    println!("      {}", message.dimmed());
                }
            }
            Ok(())
        }
        TestStep::GetMessages {
            wait,
            equals,
            contains,
        } => {
            let received = match (*wait, cx.config.timeouts.receive()) {
                (true, Some(timeout)) => cx.tester.get_messages_timeout(timeout)?,
                (wait, _) => cx.tester.get_messages(wait)?,
            };

            if let Some(expected) = equals {
                if &received != expected {
                    return Err(Error::message_mismatch(expected, &received));
                }
            }
            if let Some(needle) = contains {
                if !received.contains(needle.as_str()) {
                    return Err(Error::TestAssertion(format!(
                        "Expected messages to contain '{}', got '{}'",
                        needle, received
                    )));
                }
            }

            println!(
                "  {} Step {}: drained {} character(s)",
                "✓".green(),
                step_num,
                received.chars().count()
            );
            Ok(())
        }
    }
}

/// Join messages the way the session log records them
fn transcript(messages: &[String]) -> String {
    let mut text = String::new();
    for message in messages {
        text.push_str(message);
        text.push(RECORD_TERMINATOR);
    }
    text
}

fn wait_for(config: &Config, pending: PendingResult<Value>) -> Result<Value> {
    match config.timeouts.eval() {
        Some(timeout) => pending.wait_timeout(timeout),
        None => pending.wait(),
    }
}

/// Check an evaluation outcome against its expectation
fn check_eval(
    name: &str,
    outcome: Result<Value>,
    expect: Option<&EvalExpectation>,
    step_num: usize,
    verbose: bool,
) -> Result<()> {
    let should_succeed = expect.and_then(|e| e.success).unwrap_or(true);

    match outcome {
        Ok(value) => {
            if !should_succeed {
                return Err(Error::TestAssertion(format!(
                    "Evaluation '{}' expected to fail, got {}",
                    name, value
                )));
            }
            if let Some(expected) = expect.and_then(|e| e.value.as_ref()) {
                if &value != expected {
                    return Err(Error::TestAssertion(format!(
                        "Evaluation '{}' expected {}, got {}",
                        name, expected, value
                    )));
                }
            }
            println!(
                "  {} Step {}: eval {} = {}",
                "✓".green(),
                step_num,
                name,
                value.to_string().dimmed()
            );
            Ok(())
        }
        Err(e) if e.is_evaluation_failure() && !should_succeed => {
            if let Some(needle) = expect.and_then(|e| e.error_contains.as_ref()) {
                if !e.to_string().contains(needle.as_str()) {
                    return Err(Error::TestAssertion(format!(
                        "Evaluation '{}' failure '{}' does not contain '{}'",
                        name, e, needle
                    )));
                }
            }
            println!(
                "  {} Step {}: eval {} (expected failure)",
                "✓".green(),
                step_num,
                name
            );
            if verbose {
                println!("      {}", e.to_string().dimmed());
            }
            Ok(())
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_transcript_terminates_each_message() {
        let messages = vec!["a".to_string(), "b".to_string()];
        assert_eq!(transcript(&messages), "a\nb\n");
        assert_eq!(transcript(&[]), "");
    }

    #[test]
    fn test_check_eval_expected_failure() {
        let expect = EvalExpectation {
            success: Some(false),
            value: None,
            error_contains: Some("boom".to_string()),
        };
        let outcome = Err(Error::evaluation_failed("u", "boom"));
        check_eval("u", outcome, Some(&expect), 1, false).unwrap();
    }

    #[test]
    fn test_check_eval_value_mismatch() {
        let expect = EvalExpectation {
            success: None,
            value: Some(json!(1)),
            error_contains: None,
        };
        let err = check_eval("u", Ok(json!(2)), Some(&expect), 1, false).unwrap_err();
        assert!(matches!(err, Error::TestAssertion(_)));
    }

    #[test]
    fn test_check_eval_unexpected_failure_propagates() {
        let outcome = Err(Error::evaluation_failed("u", "boom"));
        let err = check_eval("u", outcome, None, 1, false).unwrap_err();
        assert!(err.is_evaluation_failure());
    }
}
