use chromiumoxide::Page;
use serde::Deserialize;
use std::time::Duration;
use tessel_engine::session::SessionError;

const SNAPSHOT_JS: &str = include_str!("snapshot.js");

/// Upper bound for one evaluation. A dialog the listener has not dismissed
/// yet blocks the JS thread, so evaluations can otherwise hang.
const EVAL_TIMEOUT: Duration = Duration::from_secs(10);

const MAX_CONTEXT_RETRIES: u32 = 10;

const CONTEXT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// The page context is gone or not yet created, usually mid-navigation.
fn is_context_error(err: &str) -> bool {
    err.contains("Cannot find context")
        || err.contains("Execution context was destroyed")
        || err.contains("-32000")
}

enum EvalError {
    Timeout,
    Context(String),
    Other(String),
}

/// Result of `window.__tessel.perform`.
#[derive(Debug, Deserialize)]
pub struct ActionReply {
    pub ok: bool,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

impl ActionReply {
    pub fn into_result(self, id: u32) -> Result<(), SessionError> {
        if self.ok {
            return Ok(());
        }
        let reason = self.reason.unwrap_or_default();
        match self.kind.as_deref() {
            Some("stale") => Err(SessionError::StaleElement(id)),
            Some("not_interactable") => Err(SessionError::NotInteractable { id, reason }),
            _ => Err(SessionError::Script(reason)),
        }
    }
}

/// Evaluates `call` against the injected helpers and returns the string it
/// produced. Injects the helpers first when the page does not carry them
/// (fresh document after a navigation).
pub async fn call(page: &Page, call: &str) -> Result<String, SessionError> {
    let expression = format!(
        "(function () {{ if (!window.__tessel) {{ {SNAPSHOT_JS} }} return {call}; }})()"
    );

    let mut last_error = None;
    for attempt in 0..MAX_CONTEXT_RETRIES {
        match evaluate_with_timeout(page, &expression).await {
            Ok(value) => return Ok(value),
            Err(EvalError::Timeout) => {
                return Err(SessionError::Timeout(EVAL_TIMEOUT.as_millis() as u64));
            }
            Err(EvalError::Context(err)) => {
                tracing::debug!(
                    "Context error (attempt {}/{}), retrying",
                    attempt + 1,
                    MAX_CONTEXT_RETRIES
                );
                last_error = Some(err);
                tokio::time::sleep(CONTEXT_RETRY_DELAY).await;
            }
            Err(EvalError::Other(err)) => return Err(SessionError::Script(err)),
        }
    }

    Err(SessionError::Script(last_error.unwrap_or_else(|| {
        "page context unavailable after retries".to_string()
    })))
}

async fn evaluate_with_timeout(page: &Page, expression: &str) -> Result<String, EvalError> {
    match tokio::time::timeout(EVAL_TIMEOUT, page.evaluate(expression)).await {
        Err(_) => Err(EvalError::Timeout),
        Ok(Err(e)) => {
            let err = e.to_string();
            if is_context_error(&err) {
                Err(EvalError::Context(err))
            } else {
                Err(EvalError::Other(err))
            }
        }
        Ok(Ok(result)) => result
            .into_value::<String>()
            .map_err(|e| EvalError::Other(format!("Unexpected script result: {}", e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_errors_are_recognized() {
        assert!(is_context_error("Execution context was destroyed."));
        assert!(is_context_error("Cannot find context with specified id"));
        assert!(!is_context_error("ReferenceError: foo is not defined"));
    }

    #[test]
    fn test_action_reply_mapping() {
        let reply: ActionReply = serde_json::from_str(r#"{"ok":true}"#).unwrap();
        assert!(reply.into_result(3).is_ok());

        let reply: ActionReply =
            serde_json::from_str(r#"{"ok":false,"kind":"stale","reason":"gone"}"#).unwrap();
        assert!(matches!(
            reply.into_result(3),
            Err(SessionError::StaleElement(3))
        ));

        let reply: ActionReply = serde_json::from_str(
            r#"{"ok":false,"kind":"not_interactable","reason":"element is disabled"}"#,
        )
        .unwrap();
        match reply.into_result(7) {
            Err(SessionError::NotInteractable { id, reason }) => {
                assert_eq!(id, 7);
                assert_eq!(reason, "element is disabled");
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
