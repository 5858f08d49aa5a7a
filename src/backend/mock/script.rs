//! Line-oriented script language run by the mock engine
//!
//! One statement per line; blank lines and `#` comments are skipped:
//!
//! ```text
//! print <text>      console.log a string
//! inspect <json>    console.log an object reference
//! throw <text>      fail the evaluation
//! panic <text>      panic inside the engine
//! sleep <millis>    block the engine
//! pause             stop until the debugger resumes
//! return <json>     finish with a value
//! ```

use std::time::Duration;

use serde_json::Value;

use crate::backend::SourceUnit;
use crate::common::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Print(String),
    Inspect(Value),
    Throw(String),
    Panic(String),
    Sleep(Duration),
    Pause,
    Return(Value),
}

/// A statement with its zero-based source line
#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub number: usize,
    pub statement: Statement,
}

/// Parse a whole unit up front; nothing runs if any line is malformed
pub fn parse(unit: &SourceUnit) -> Result<Vec<Line>> {
    let mut lines = Vec::new();

    for (number, raw) in unit.text().lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let (keyword, rest) = match line.split_once(char::is_whitespace) {
            Some((keyword, rest)) => (keyword, rest.trim()),
            None => (line, ""),
        };

        let syntax_error = |message: String| {
            Error::evaluation_failed(
                unit.name(),
                &format!("SyntaxError at line {}: {}", number + 1, message),
            )
        };
        let json = |text: &str| {
            serde_json::from_str::<Value>(text).map_err(|e| syntax_error(format!("invalid JSON: {e}")))
        };

        let statement = match keyword {
            "print" => Statement::Print(rest.to_string()),
            "inspect" => Statement::Inspect(json(rest)?),
            "throw" => Statement::Throw(rest.to_string()),
            "panic" => Statement::Panic(rest.to_string()),
            "sleep" => {
                let millis = rest
                    .parse::<u64>()
                    .map_err(|e| syntax_error(format!("invalid duration '{rest}': {e}")))?;
                Statement::Sleep(Duration::from_millis(millis))
            }
            "pause" | "debugger" => Statement::Pause,
            "return" if rest.is_empty() => Statement::Return(Value::Null),
            "return" => Statement::Return(json(rest)?),
            other => return Err(syntax_error(format!("unknown statement '{other}'"))),
        };

        lines.push(Line { number, statement });
    }

    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse_text(text: &str) -> Result<Vec<Line>> {
        parse(&SourceUnit::new("test", text))
    }

    #[test]
    fn test_parse_statements_with_line_numbers() {
        let lines = parse_text("# setup\nprint hello world\n\nreturn {\"a\": 1}\n").unwrap();
        assert_eq!(
            lines,
            vec![
                Line {
                    number: 1,
                    statement: Statement::Print("hello world".to_string()),
                },
                Line {
                    number: 3,
                    statement: Statement::Return(json!({"a": 1})),
                },
            ]
        );
    }

    #[test]
    fn test_bare_return_is_null() {
        let lines = parse_text("return").unwrap();
        assert_eq!(lines[0].statement, Statement::Return(Value::Null));
    }

    #[test]
    fn test_sleep_and_pause() {
        let lines = parse_text("sleep 15\ndebugger").unwrap();
        assert_eq!(
            lines[0].statement,
            Statement::Sleep(Duration::from_millis(15))
        );
        assert_eq!(lines[1].statement, Statement::Pause);
    }

    #[test]
    fn test_unknown_statement_is_syntax_error() {
        let err = parse_text("print ok\nfrobnicate").unwrap_err();
        match err {
            Error::EvaluationFailed { unit, message } => {
                assert_eq!(unit, "test");
                assert!(message.contains("line 2"));
                assert!(message.contains("frobnicate"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_invalid_json_is_syntax_error() {
        assert!(parse_text("inspect {nope").is_err());
        assert!(parse_text("sleep soon").is_err());
    }
}
