//! Test scenario configuration types
//!
//! Defines the data structures for deserializing YAML test scenarios.

use serde::Deserialize;
use serde_json::Value;

/// A complete test scenario loaded from a YAML file
#[derive(Deserialize, Debug)]
pub struct TestScenario {
    /// Name of the test scenario
    pub name: String,
    /// Optional description of what the test verifies
    pub description: Option<String>,
    /// Pause the session before the first evaluation runs
    #[serde(default)]
    pub suspend_on_entry: bool,
    /// The sequence of test steps to execute
    pub steps: Vec<TestStep>,
}

/// A single test step in the execution flow
#[derive(Deserialize, Debug)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TestStep {
    /// Inject an inbound protocol message
    Send {
        /// Raw message text
        message: String,
    },
    /// Submit a unit for evaluation
    Eval {
        /// Unit name (default: "scenario")
        name: Option<String>,
        /// Script source
        source: String,
        /// Wait for the result in this step (default: true)
        ///
        /// When false the result is kept and checked by a later
        /// `await_eval` step, leaving the worker busy in the meantime.
        #[serde(default = "default_true")]
        wait: bool,
        /// Expected outcome
        expect: Option<EvalExpectation>,
    },
    /// Wait for the oldest evaluation submitted with `wait: false`
    AwaitEval {
        /// Expected outcome
        expect: Option<EvalExpectation>,
    },
    /// Require exactly these messages to arrive next, in order
    ExpectMessages {
        /// One entry per message, without the trailing newline
        messages: Vec<String>,
    },
    /// Drain whatever has been received
    GetMessages {
        /// Block until something arrives (default: false)
        #[serde(default)]
        wait: bool,
        /// Expected exact text
        equals: Option<String>,
        /// Expected substring
        contains: Option<String>,
    },
}

fn default_true() -> bool {
    true
}

/// Expectations for an evaluation result
#[derive(Deserialize, Debug)]
pub struct EvalExpectation {
    /// Whether the evaluation should succeed (default: true)
    pub success: Option<bool>,
    /// Expected result value
    pub value: Option<Value>,
    /// Expected substring of the failure message
    pub error_contains: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scenario() {
        let yaml = r#"
name: basic
steps:
  - action: send
    message: '{"id":1,"method":"Debugger.enable"}'
  - action: expect_messages
    messages:
      - '{"id":1,"result":{}}'
  - action: eval
    source: |
      print hi
      return 3
    expect:
      value: 3
  - action: get_messages
    equals: ""
"#;
        let scenario: TestScenario = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(scenario.name, "basic");
        assert!(!scenario.suspend_on_entry);
        assert_eq!(scenario.steps.len(), 4);
        assert!(matches!(
            &scenario.steps[2],
            TestStep::Eval { wait: true, expect: Some(EvalExpectation { value: Some(v), .. }), .. } if v == 3
        ));
    }
}
