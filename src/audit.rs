//! Audit bridge: pre/post/error hooks wrapped around every play invocation.

/// A strategy for recording play invocations, selectable from configuration.
pub trait Auditor: Send + Sync {
    /// Called before a play runs.
    fn action(&self, names: &[String], verb: &str);
    /// Called after a play completes without error.
    fn success(&self, names: &[String], verb: &str);
    /// Called when a play fails; the error has already been (or is about to
    /// be) propagated to the caller.
    fn error(&self, names: &[String], verb: &str, message: &str);
}

/// Records nothing; the default when no audit sink is configured.
#[derive(Debug, Default)]
pub struct NoopAuditor;

impl Auditor for NoopAuditor {
    fn action(&self, _names: &[String], _verb: &str) {}
    fn success(&self, _names: &[String], _verb: &str) {}
    fn error(&self, _names: &[String], _verb: &str, _message: &str) {}
}

/// Logs each hook via `tracing`.
#[derive(Debug, Default)]
pub struct TracingAuditor;

impl Auditor for TracingAuditor {
    fn action(&self, names: &[String], verb: &str) {
        tracing::info!(verb, ?names, "play starting");
    }

    fn success(&self, names: &[String], verb: &str) {
        tracing::info!(verb, ?names, "play succeeded");
    }

    fn error(&self, names: &[String], verb: &str, message: &str) {
        tracing::error!(verb, ?names, message, "play failed");
    }
}

/// Run `body`, wrapping it with the auditor's action/success/error hooks.
///
/// `body` returning `Err` does not stop the error from propagating to the
/// caller; the auditor observes it on the way out.
pub async fn audited<F, Fut, T>(
    auditor: &dyn Auditor,
    names: &[String],
    verb: &str,
    body: F,
) -> crate::error::Result<T>
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = crate::error::Result<T>>,
{
    auditor.action(names, verb);
    match body().await {
        Ok(value) => {
            auditor.success(names, verb);
            Ok(value)
        }
        Err(err) => {
            auditor.error(names, verb, &err.to_string());
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MaestroError;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingAuditor {
        calls: Mutex<Vec<String>>,
    }

    impl Auditor for RecordingAuditor {
        fn action(&self, _names: &[String], verb: &str) {
            self.calls.lock().unwrap().push(format!("action:{verb}"));
        }
        fn success(&self, _names: &[String], verb: &str) {
            self.calls.lock().unwrap().push(format!("success:{verb}"));
        }
        fn error(&self, _names: &[String], verb: &str, _message: &str) {
            self.calls.lock().unwrap().push(format!("error:{verb}"));
        }
    }

    #[tokio::test]
    async fn success_path_calls_action_then_success() {
        let auditor = RecordingAuditor::default();
        let result: crate::error::Result<()> =
            audited(&auditor, &["c1".to_string()], "start", || async { Ok(()) }).await;
        assert!(result.is_ok());
        assert_eq!(
            *auditor.calls.lock().unwrap(),
            vec!["action:start".to_string(), "success:start".to_string()]
        );
    }

    #[tokio::test]
    async fn failure_path_calls_action_then_error() {
        let auditor = RecordingAuditor::default();
        let result: crate::error::Result<()> = audited(&auditor, &["c1".to_string()], "start", || async {
            Err(MaestroError::configuration("bad"))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(
            *auditor.calls.lock().unwrap(),
            vec!["action:start".to_string(), "error:start".to_string()]
        );
    }
}
