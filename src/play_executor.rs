//! Bounded-concurrency dispatcher: runs one task per container in the plan,
//! respecting dependency edges, with fail-soft or fail-fast failure
//! semantics.

use std::collections::{HashMap, VecDeque};
use std::pin::Pin;
use std::future::Future;

use tokio::task::JoinSet;

use crate::error::Result;
use crate::planner::Plan;
use crate::progress::{Event, Phase, ProgressSink};

/// A per-task async closure's return type.
pub type TaskFuture = Pin<Box<dyn Future<Output = Result<()>> + Send>>;

/// How a predecessor's failure affects its successors and the rest of the
/// plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureMode {
    /// `status`, `clean`, `pull`: a per-container failure doesn't cascade;
    /// every other container still runs as scheduled.
    FailSoft,
    /// `start`, `restart`, `stop`: the first failure stops new tasks from
    /// being admitted (in-flight tasks still drain to completion).
    FailFast,
}

/// The terminal outcome of one container's task.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// The task ran and returned `Ok`.
    Completed,
    /// A predecessor failed in a fail-fast play, or scheduling was already
    /// aborted; this task never ran.
    Skipped,
    /// The task ran and returned `Err`.
    Failed(crate::error::MaestroError),
}

/// Run `task` once per container named in `plan.order`, in dependency order
/// with up to `concurrency` tasks in flight at once.
pub async fn execute<F>(
    plan: &Plan,
    predecessors: &HashMap<String, std::collections::BTreeSet<String>>,
    concurrency: usize,
    failure_mode: FailureMode,
    progress: &dyn ProgressSink,
    task: F,
) -> HashMap<String, Outcome>
where
    F: Fn(String) -> TaskFuture,
{
    let concurrency = concurrency.max(1);
    let index_of: HashMap<&str, usize> = plan
        .order
        .iter()
        .enumerate()
        .map(|(i, n)| (n.as_str(), i))
        .collect();

    let mut successors: HashMap<String, Vec<String>> =
        plan.order.iter().map(|n| (n.clone(), Vec::new())).collect();
    let mut remaining: HashMap<String, usize> = HashMap::new();
    for name in &plan.order {
        let preds = predecessors.get(name).cloned().unwrap_or_default();
        remaining.insert(name.clone(), preds.len());
        for pred in preds {
            successors.entry(pred).or_default().push(name.clone());
        }
    }

    let mut ready: VecDeque<String> = VecDeque::new();
    for name in &plan.order {
        if remaining[name] == 0 {
            ready.push_back(name.clone());
            progress.emit(Event {
                task_index: index_of[name.as_str()],
                phase: Phase::Pending,
                text: name.clone(),
            });
        }
    }

    let mut outcomes: HashMap<String, Outcome> = HashMap::new();
    let mut aborted = false;
    let mut in_flight: JoinSet<(String, Result<()>)> = JoinSet::new();

    let finish = |name: String,
                  outcome: Outcome,
                  outcomes: &mut HashMap<String, Outcome>,
                  ready: &mut VecDeque<String>,
                  remaining: &mut HashMap<String, usize>,
                  successors: &HashMap<String, Vec<String>>,
                  progress: &dyn ProgressSink| {
        progress.emit(Event {
            task_index: index_of[name.as_str()],
            phase: Phase::Ended,
            text: name.clone(),
        });
        for succ in successors.get(&name).into_iter().flatten() {
            if let Some(count) = remaining.get_mut(succ) {
                *count -= 1;
                if *count == 0 {
                    ready.push_back(succ.clone());
                    progress.emit(Event {
                        task_index: index_of[succ.as_str()],
                        phase: Phase::Pending,
                        text: succ.clone(),
                    });
                }
            }
        }
        outcomes.insert(name, outcome);
    };

    loop {
        while in_flight.len() < concurrency {
            let Some(name) = ready.pop_front() else { break };
            if aborted {
                finish(
                    name,
                    Outcome::Skipped,
                    &mut outcomes,
                    &mut ready,
                    &mut remaining,
                    &successors,
                    progress,
                );
                continue;
            }
            progress.emit(Event {
                task_index: index_of[name.as_str()],
                phase: Phase::Committed,
                text: name.clone(),
            });
            let fut = task(name.clone());
            in_flight.spawn(async move { (name, fut.await) });
        }

        if in_flight.is_empty() {
            if ready.is_empty() {
                break;
            }
            continue;
        }

        if let Some(joined) = in_flight.join_next().await {
            let (name, result) = joined.expect("task panicked");
            let outcome = match result {
                Ok(()) => Outcome::Completed,
                Err(e) => {
                    if failure_mode == FailureMode::FailFast {
                        aborted = true;
                    }
                    Outcome::Failed(e)
                }
            };
            finish(
                name,
                outcome,
                &mut outcomes,
                &mut ready,
                &mut remaining,
                &successors,
                progress,
            );
        }
    }

    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::CapturingProgressSink;
    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn plan(names: &[&str]) -> Plan {
        Plan {
            order: names.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn fail_soft_runs_independent_siblings_after_a_failure() {
        let p = plan(&["a", "b"]);
        let preds = HashMap::new();
        let sink = CapturingProgressSink::new();
        let ran = Arc::new(AtomicUsize::new(0));
        let ran2 = ran.clone();
        let outcomes = execute(&p, &preds, 2, FailureMode::FailSoft, &sink, move |name| {
            let ran = ran2.clone();
            Box::pin(async move {
                ran.fetch_add(1, Ordering::SeqCst);
                if name == "a" {
                    Err(crate::error::MaestroError::orchestration("a", "boom"))
                } else {
                    Ok(())
                }
            })
        })
        .await;
        assert_eq!(ran.load(Ordering::SeqCst), 2);
        assert!(matches!(outcomes["a"], Outcome::Failed(_)));
        assert!(matches!(outcomes["b"], Outcome::Completed));
    }

    #[tokio::test]
    async fn fail_fast_skips_successor_of_a_failed_predecessor() {
        let p = plan(&["a", "b"]);
        let mut preds = HashMap::new();
        preds.insert("b".to_string(), BTreeSet::from(["a".to_string()]));
        let sink = CapturingProgressSink::new();
        let outcomes = execute(&p, &preds, 4, FailureMode::FailFast, &sink, |name| {
            Box::pin(async move {
                if name == "a" {
                    Err(crate::error::MaestroError::orchestration("a", "boom"))
                } else {
                    Ok(())
                }
            })
        })
        .await;
        assert!(matches!(outcomes["a"], Outcome::Failed(_)));
        assert!(matches!(outcomes["b"], Outcome::Skipped));
    }

    #[tokio::test]
    async fn respects_concurrency_limit() {
        let names: Vec<String> = (0..6).map(|i| format!("c{i}")).collect();
        let p = Plan { order: names.clone() };
        let preds = HashMap::new();
        let sink = CapturingProgressSink::new();
        let concurrent = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));
        let c1 = concurrent.clone();
        let m1 = max_seen.clone();
        let outcomes = execute(&p, &preds, 2, FailureMode::FailSoft, &sink, move |_name| {
            let concurrent = c1.clone();
            let max_seen = m1.clone();
            Box::pin(async move {
                let now = concurrent.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                concurrent.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            })
        })
        .await;
        assert_eq!(outcomes.len(), 6);
        assert!(max_seen.load(Ordering::SeqCst) <= 2);
    }
}
