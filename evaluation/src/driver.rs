use anyhow::{anyhow, Result};
use ct2_runner::{SubwordTokenizer, TranslatorRunnerTrait};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, instrument};

use crate::bleu::BleuScorer;
use crate::dataset::FloresDataset;
use crate::packages::Package;
use crate::progress::ProgressTracker;
use crate::tasks::flores::{evaluate_package, FloresOptions, PairReport};

/// Runs `job` over `items` with at most `limit` jobs in flight. Jobs start in
/// item order; `on_done` sees `(index, result)` in completion order.
pub async fn run_bounded<T, R, F, Fut, D>(items: Vec<T>, limit: usize, job: F, mut on_done: D)
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(T) -> Fut,
    Fut: Future<Output = Result<R>> + Send + 'static,
    D: FnMut(usize, Result<R>),
{
    let semaphore = Arc::new(Semaphore::new(limit.max(1)));
    let mut set = JoinSet::new();

    for (idx, item) in items.into_iter().enumerate() {
        let semaphore = semaphore.clone();
        let fut = job(item);
        set.spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => return (idx, Err(anyhow!(e))),
            };
            (idx, fut.await)
        });
    }

    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((idx, result)) => on_done(idx, result),
            Err(e) => error!("Evaluation task failed to complete: {}", e),
        }
    }
}

/// Scores keyed by `from-to`, plus the pairs that failed.
#[derive(Debug, Default)]
pub struct EvaluationSummary {
    pub scores: BTreeMap<String, f64>,
    pub failures: Vec<(String, String)>,
}

/// Evaluates every package, `limit` at a time, printing each report as it
/// completes. A failing pair is logged and recorded; the others keep going.
#[instrument(skip_all, fields(packages = packages.len(), limit = limit))]
pub async fn evaluate_packages<R, T>(
    packages: Vec<Package>,
    dataset: Arc<FloresDataset>,
    scorer: Arc<BleuScorer>,
    options: Arc<FloresOptions>,
    limit: usize,
) -> EvaluationSummary
where
    R: TranslatorRunnerTrait + 'static,
    T: SubwordTokenizer + 'static,
{
    info!("Evaluating {} packages, {} at a time", packages.len(), limit);
    let pairs: Vec<String> = packages.iter().map(|p| p.pair().to_string()).collect();
    let mut progress = ProgressTracker::new(packages.len());
    let mut summary = EvaluationSummary::default();

    run_bounded(
        packages,
        limit,
        |package| {
            evaluate_package::<R, T>(package, dataset.clone(), scorer.clone(), options.clone())
        },
        |idx, result: Result<PairReport>| match result {
            Ok(report) => {
                progress.add_sentences(report.sentences);
                progress.println(report.sample());
                progress.println(report.summary());
                progress.update(report.pair.to_string());
                summary.scores.insert(report.pair.to_string(), report.score);
            }
            Err(e) => {
                error!("{}: {:#}", pairs[idx], e);
                progress.update(format!("{} failed", pairs[idx]));
                summary.failures.push((pairs[idx].clone(), format!("{:#}", e)));
            }
        },
    )
    .await;

    progress.finish();
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn never_exceeds_limit() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let mut done = Vec::new();

        run_bounded(
            (0..8).collect(),
            3,
            |i: usize| {
                let running = running.clone();
                let peak = peak.clone();
                async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                    Ok::<usize, anyhow::Error>(i * 10)
                }
            },
            |idx, result| done.push((idx, result.unwrap())),
        )
        .await;

        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert!(peak.load(Ordering::SeqCst) >= 1);
        done.sort();
        assert_eq!(done, (0..8).map(|i| (i, i * 10)).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn errors_are_reported_per_item() {
        let mut outcomes = Vec::new();
        run_bounded(
            vec![1, 2, 3],
            2,
            |i: i32| async move {
                if i == 2 {
                    anyhow::bail!("boom")
                }
                Ok(i)
            },
            |idx, result| outcomes.push((idx, result.is_ok())),
        )
        .await;
        outcomes.sort();
        assert_eq!(outcomes, vec![(0, true), (1, false), (2, true)]);
    }

    #[tokio::test]
    async fn zero_limit_still_makes_progress() {
        let mut count = 0;
        run_bounded(vec![(); 3], 0, |_| async { Ok::<(), anyhow::Error>(()) }, |_, _| count += 1).await;
        assert_eq!(count, 3);
    }
}
