//! Audit bridge and bounded-concurrency executor, exercised end to end
//! without a real `docker` binary (the per-task bodies are plain closures).

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use maestro::audit::{audited, Auditor};
use maestro::error::MaestroError;
use maestro::planner::Plan;
use maestro::progress::CapturingProgressSink;
use maestro::play_executor::{execute, FailureMode, Outcome};

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

#[test]
fn audited_wraps_a_synchronous_future_with_action_then_success() {
    let auditor = RecordingAuditor::default();
    let names = vec!["db1".to_string()];
    let result: Result<(), MaestroError> =
        tokio_test::block_on(audited(&auditor, &names, "status", || async { Ok(()) }));
    assert!(result.is_ok());
    assert_eq!(
        *auditor.calls.lock().unwrap(),
        vec!["action:status".to_string(), "success:status".to_string()]
    );
}

#[tokio::test]
async fn full_fleet_plan_runs_every_container_exactly_once_under_contention() {
    let names: Vec<String> = (0..24).map(|i| format!("c{i}")).collect();
    let plan = Plan { order: names.clone() };
    let predecessors: HashMap<String, BTreeSet<String>> = HashMap::new();
    let sink = CapturingProgressSink::new();
    let runs = std::sync::Arc::new(AtomicUsize::new(0));

    let outcomes = execute(&plan, &predecessors, 4, FailureMode::FailSoft, &sink, {
        let runs = runs.clone();
        move |_name| {
            let runs = runs.clone();
            Box::pin(async move {
                runs.fetch_add(1, Ordering::SeqCst);
                tokio::task::yield_now().await;
                Ok(())
            })
        }
    })
    .await;

    assert_eq!(runs.load(Ordering::SeqCst), 24);
    assert_eq!(outcomes.len(), 24);
    assert!(outcomes.values().all(|o| matches!(o, Outcome::Completed)));
}
