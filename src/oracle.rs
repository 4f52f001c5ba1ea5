//! Relation inference oracle: the external capability that proposes a
//! relation label for a pair of entities.
//!
//! Three implementations:
//! - `CommandOracle`: spawns an external command per request (production)
//! - `MockOracle`: returns scripted answers and records calls (testing)
//! - `NoopOracle`: never infers anything
//!
//! Oracle answers are untrusted. The curator checks every returned label
//! against the valid relation set before writing anything.

use async_trait::async_trait;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::process::Stdio;
use std::sync::Mutex;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Errors from oracle calls.
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error("oracle not available: {0}")]
    Unavailable(String),
    #[error("inference failed: {0}")]
    InvocationFailed(String),
    #[error("response parse error: {0}")]
    ParseError(String),
    #[error("oracle timed out after {0} ms")]
    Timeout(u64),
}

/// Client trait for relation inference.
///
/// Abstracts over transport (subprocess, HTTP, mock) so the curator
/// doesn't depend on how the oracle is reached.
#[async_trait]
pub trait RelationOracle: Send + Sync {
    /// Propose a relation from `entity_a` to `entity_b`, chosen from
    /// `candidates`, or `None` if no relation applies.
    async fn infer_relation(
        &self,
        entity_a: &str,
        entity_b: &str,
        candidates: &BTreeSet<String>,
    ) -> Result<Option<String>, OracleError>;
}

/// Oracle that never proposes a relation.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopOracle;

#[async_trait]
impl RelationOracle for NoopOracle {
    async fn infer_relation(
        &self,
        _entity_a: &str,
        _entity_b: &str,
        _candidates: &BTreeSet<String>,
    ) -> Result<Option<String>, OracleError> {
        Ok(None)
    }
}

/// Mock oracle for testing. Returns scripted answers per ordered pair.
///
/// Pairs without a scripted answer get the default answer (`None` unless
/// set with [`MockOracle::with_default`]). Every call is recorded.
#[derive(Default)]
pub struct MockOracle {
    answers: HashMap<(String, String), Result<Option<String>, String>>,
    default_answer: Option<String>,
    delay: Option<Duration>,
    calls: Mutex<Vec<(String, String)>>,
}

impl MockOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `label` for the ordered pair `(a, b)`.
    pub fn with_answer(mut self, a: impl Into<String>, b: impl Into<String>, label: impl Into<String>) -> Self {
        self.answers
            .insert((a.into(), b.into()), Ok(Some(label.into())));
        self
    }

    /// Fail with `InvocationFailed(message)` for the ordered pair `(a, b)`.
    pub fn with_failure(mut self, a: impl Into<String>, b: impl Into<String>, message: impl Into<String>) -> Self {
        self.answers.insert((a.into(), b.into()), Err(message.into()));
        self
    }

    /// Answer `label` for every pair without a scripted answer.
    pub fn with_default(mut self, label: impl Into<String>) -> Self {
        self.default_answer = Some(label.into());
        self
    }

    /// Sleep before answering (for timeout tests).
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Pairs the oracle was asked about, in call order.
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl RelationOracle for MockOracle {
    async fn infer_relation(
        &self,
        entity_a: &str,
        entity_b: &str,
        _candidates: &BTreeSet<String>,
    ) -> Result<Option<String>, OracleError> {
        self.calls
            .lock()
            .unwrap()
            .push((entity_a.to_string(), entity_b.to_string()));

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match self
            .answers
            .get(&(entity_a.to_string(), entity_b.to_string()))
        {
            Some(Ok(answer)) => Ok(answer.clone()),
            Some(Err(message)) => Err(OracleError::InvocationFailed(message.clone())),
            None => Ok(self.default_answer.clone()),
        }
    }
}

/// Request payload written to a [`CommandOracle`]'s stdin.
#[derive(Debug, Serialize)]
struct InferenceRequest<'a> {
    entity_a: &'a str,
    entity_b: &'a str,
    candidates: &'a BTreeSet<String>,
}

/// Oracle backed by an external command.
///
/// For every pair the command is spawned once, receives a JSON request
/// `{"entity_a", "entity_b", "candidates"}` on stdin and answers on stdout
/// with either a bare label or a JSON object with a `relation` field.
/// Empty output, `null`, `none` or a null `relation` mean "no relation".
#[derive(Debug, Clone)]
pub struct CommandOracle {
    program: String,
    args: Vec<String>,
}

impl CommandOracle {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }
}

#[async_trait]
impl RelationOracle for CommandOracle {
    async fn infer_relation(
        &self,
        entity_a: &str,
        entity_b: &str,
        candidates: &BTreeSet<String>,
    ) -> Result<Option<String>, OracleError> {
        let request = serde_json::to_vec(&InferenceRequest {
            entity_a,
            entity_b,
            candidates,
        })
        .map_err(|e| OracleError::InvocationFailed(e.to_string()))?;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| OracleError::Unavailable(format!("{}: {}", self.program, e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(&request)
                .await
                .map_err(|e| OracleError::InvocationFailed(e.to_string()))?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| OracleError::InvocationFailed(e.to_string()))?;

        if !output.status.success() {
            return Err(OracleError::InvocationFailed(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let stdout = String::from_utf8(output.stdout)
            .map_err(|e| OracleError::ParseError(e.to_string()))?;
        parse_label(&stdout)
    }
}

/// Extract a relation label from oracle output text.
///
/// Models sometimes wrap JSON in markdown code fences or answer in plain
/// text. This tries, in order:
/// 1. A JSON value (string, null, or object with a `relation` field),
///    optionally inside a ```json fence
/// 2. The first non-empty line as a bare label, quotes stripped
pub fn parse_label(text: &str) -> Result<Option<String>, OracleError> {
    let trimmed = strip_fence(text.trim()).trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        return match value {
            serde_json::Value::Null => Ok(None),
            serde_json::Value::String(s) => Ok(non_empty_label(&s)),
            serde_json::Value::Object(map) => match map.get("relation") {
                None | Some(serde_json::Value::Null) => Ok(None),
                Some(serde_json::Value::String(s)) => Ok(non_empty_label(s)),
                Some(other) => Err(OracleError::ParseError(format!(
                    "relation field is not a string: {}",
                    other
                ))),
            },
            other => Err(OracleError::ParseError(format!(
                "unexpected JSON answer: {}",
                other
            ))),
        };
    }

    let first_line = trimmed.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or("");
    Ok(non_empty_label(first_line.trim_matches(|c| c == '"' || c == '\'')))
}

fn strip_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest)
}

fn non_empty_label(s: &str) -> Option<String> {
    let s = s.trim();
    if s.is_empty() || s.eq_ignore_ascii_case("none") || s.eq_ignore_ascii_case("null") {
        None
    } else {
        Some(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidates() -> BTreeSet<String> {
        ["transmits", "preys-on"].iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn mock_returns_scripted_answer_and_records_calls() {
        let oracle = MockOracle::new().with_answer("a", "b", "preys-on");

        let answer = oracle.infer_relation("a", "b", &candidates()).await.unwrap();
        assert_eq!(answer.as_deref(), Some("preys-on"));

        // Pairs are ordered: (b, a) is not scripted
        let answer = oracle.infer_relation("b", "a", &candidates()).await.unwrap();
        assert_eq!(answer, None);

        assert_eq!(
            oracle.calls(),
            vec![("a".to_string(), "b".to_string()), ("b".to_string(), "a".to_string())]
        );
    }

    #[tokio::test]
    async fn mock_failure_is_invocation_error() {
        let oracle = MockOracle::new().with_failure("a", "b", "rate limited");
        let err = oracle.infer_relation("a", "b", &candidates()).await.unwrap_err();
        assert!(matches!(err, OracleError::InvocationFailed(m) if m == "rate limited"));
    }

    #[tokio::test]
    async fn noop_never_infers() {
        let answer = NoopOracle.infer_relation("a", "b", &candidates()).await.unwrap();
        assert!(answer.is_none());
    }

    #[test]
    fn parse_bare_label() {
        assert_eq!(parse_label("transmits\n").unwrap().as_deref(), Some("transmits"));
        assert_eq!(parse_label("\"transmits\"").unwrap().as_deref(), Some("transmits"));
    }

    #[test]
    fn parse_json_object() {
        let answer = parse_label(r#"{"relation": "preys-on", "why": "..."}"#).unwrap();
        assert_eq!(answer.as_deref(), Some("preys-on"));
        assert_eq!(parse_label(r#"{"relation": null}"#).unwrap(), None);
    }

    #[test]
    fn parse_fenced_json() {
        let text = "```json\n{\"relation\": \"transmits\"}\n```";
        assert_eq!(parse_label(text).unwrap().as_deref(), Some("transmits"));
    }

    #[test]
    fn parse_no_relation_answers() {
        assert_eq!(parse_label("").unwrap(), None);
        assert_eq!(parse_label("null").unwrap(), None);
        assert_eq!(parse_label("None").unwrap(), None);
    }

    #[test]
    fn parse_rejects_non_string_relation() {
        assert!(matches!(
            parse_label(r#"{"relation": 3}"#),
            Err(OracleError::ParseError(_))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_oracle_reads_stdout() {
        let oracle = CommandOracle::new("sh").with_args(["-c", "cat > /dev/null; echo transmits"]);
        let answer = oracle.infer_relation("a", "b", &candidates()).await.unwrap();
        assert_eq!(answer.as_deref(), Some("transmits"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_oracle_receives_request_on_stdin() {
        // Echo the request back; it parses as an object without a relation field
        let oracle = CommandOracle::new("cat");
        let answer = oracle.infer_relation("a", "b", &candidates()).await.unwrap();
        assert_eq!(answer, None);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_oracle_nonzero_exit_is_error() {
        let oracle = CommandOracle::new("sh").with_args(["-c", "cat > /dev/null; echo broken >&2; exit 3"]);
        let err = oracle.infer_relation("a", "b", &candidates()).await.unwrap_err();
        assert!(matches!(err, OracleError::InvocationFailed(m) if m.contains("broken")));
    }

    #[tokio::test]
    async fn missing_command_is_unavailable() {
        let oracle = CommandOracle::new("definitely-not-an-installed-oracle");
        let err = oracle.infer_relation("a", "b", &candidates()).await.unwrap_err();
        assert!(matches!(err, OracleError::Unavailable(_)));
    }
}
