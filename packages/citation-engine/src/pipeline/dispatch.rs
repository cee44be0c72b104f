//! Query dispatcher: fans a query set out to every configured engine.
//!
//! Each (query, engine) pair becomes one task. Concurrency is bounded twice:
//! a global worker pool and a per-engine limit, so a slow engine cannot
//! starve the others and no engine sees more than its configured in-flight
//! calls. Retries release both permits while backing off.
//!
//! The batch always resolves. Call failures become statuses; a batch deadline
//! or caller cancellation abandons whatever is still pending and records it
//! as `timeout`.

use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{ConfigError, ConfigResult};
use crate::traits::engine::{self, AnswerEngine};
use crate::types::batch::{Batch, BatchState, Interruption};
use crate::types::config::DispatchConfig;
use crate::types::domain::Query;
use crate::types::engine::{CallOutcome, CallStatus, EngineConfig, EngineResult, ErrorKind};

/// One configured engine and its in-flight limit.
struct EngineSlot {
    engine: Arc<dyn AnswerEngine>,
    permits: Arc<Semaphore>,
}

/// Shared state handed to every call task.
#[derive(Clone)]
struct CallContext {
    engine: Arc<dyn AnswerEngine>,
    engine_permits: Arc<Semaphore>,
    workers: Arc<Semaphore>,
    retry_base_delay: Duration,
}

/// Dispatches query batches across a fixed engine set.
pub struct Dispatcher {
    engines: Vec<EngineSlot>,
    workers: Arc<Semaphore>,
    config: DispatchConfig,
}

impl Dispatcher {
    /// Create a dispatcher.
    ///
    /// Fails on an empty or duplicated engine set, zero limits, or a per-call
    /// timeout that is not shorter than the batch deadline.
    pub fn new(engines: Vec<Arc<dyn AnswerEngine>>, config: DispatchConfig) -> ConfigResult<Self> {
        if engines.is_empty() {
            return Err(ConfigError::NoEngines);
        }
        if config.worker_limit == 0 {
            return Err(ConfigError::ZeroLimit {
                field: "worker_limit",
            });
        }

        let mut seen = HashSet::new();
        for engine in &engines {
            let engine_config = engine.config();
            if !seen.insert(engine_config.id.clone()) {
                return Err(ConfigError::DuplicateEngine(engine_config.id.to_string()));
            }
            if engine_config.max_concurrency == 0 {
                return Err(ConfigError::ZeroLimit {
                    field: "max_concurrency",
                });
            }
        }

        let dispatcher = Self {
            workers: Arc::new(Semaphore::new(config.worker_limit)),
            engines: engines
                .into_iter()
                .map(|engine| EngineSlot {
                    permits: Arc::new(Semaphore::new(engine.config().max_concurrency)),
                    engine,
                })
                .collect(),
            config,
        };

        if let Some(deadline) = dispatcher.config.batch_deadline {
            dispatcher.check_deadline(deadline)?;
        }

        Ok(dispatcher)
    }

    /// Engine configs in dispatch order.
    pub fn engine_configs(&self) -> impl Iterator<Item = &EngineConfig> {
        self.engines.iter().map(|slot| slot.engine.config())
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Verify a batch deadline leaves room for every engine's per-call timeout.
    pub fn check_deadline(&self, deadline: Duration) -> ConfigResult<()> {
        match self
            .engine_configs()
            .find(|c| c.per_call_timeout >= deadline)
        {
            Some(c) => Err(ConfigError::TimeoutExceedsDeadline {
                engine: c.id.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Dispatch a batch using the configured deadline.
    pub async fn dispatch(&self, queries: &[Query]) -> Batch {
        self.dispatch_with(queries, self.config.batch_deadline, CancellationToken::new())
            .await
    }

    /// Dispatch a batch with an explicit deadline and cancellation token.
    ///
    /// At the deadline or on cancellation, pending calls are aborted and
    /// recorded as `timeout` with zero attempts; completed results are kept.
    pub async fn dispatch_with(
        &self,
        queries: &[Query],
        deadline: Option<Duration>,
        cancel: CancellationToken,
    ) -> Batch {
        let id = Uuid::now_v7();
        let started_at = Utc::now();
        let engine_count = self.engines.len();
        let total = queries.len() * engine_count;

        debug!(batch_id = %id, state = ?BatchState::Pending, "Batch created");
        info!(
            batch_id = %id,
            state = ?BatchState::Dispatched,
            queries = queries.len(),
            engines = engine_count,
            "Dispatching {} engine calls",
            total
        );

        let mut tasks = JoinSet::new();
        for (qi, query) in queries.iter().enumerate() {
            for (ei, slot) in self.engines.iter().enumerate() {
                let ctx = CallContext {
                    engine: Arc::clone(&slot.engine),
                    engine_permits: Arc::clone(&slot.permits),
                    workers: Arc::clone(&self.workers),
                    retry_base_delay: self.config.retry_base_delay,
                };
                let text = query.text.clone();
                tasks.spawn(async move { (qi * engine_count + ei, call_with_retry(ctx, text).await) });
            }
        }

        let mut slots: Vec<Option<EngineResult>> = vec![None; total];

        let expiry = async {
            match deadline {
                Some(d) => tokio::time::sleep(d).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(expiry);

        let interrupted = loop {
            tokio::select! {
                joined = tasks.join_next() => match joined {
                    None => break None,
                    Some(Ok((slot, result))) => slots[slot] = Some(result),
                    Some(Err(e)) => warn!(batch_id = %id, error = %e, "Engine call task failed"),
                },
                _ = &mut expiry => break Some(Interruption::DeadlineExceeded),
                _ = cancel.cancelled() => break Some(Interruption::Cancelled),
            }
        };

        if let Some(reason) = interrupted {
            tasks.abort_all();
            let pending = slots.iter().filter(|s| s.is_none()).count();
            warn!(batch_id = %id, reason = ?reason, pending, "Batch interrupted; abandoning pending calls");
        }

        let results: Vec<EngineResult> = slots
            .into_iter()
            .enumerate()
            .map(|(i, slot)| {
                slot.unwrap_or_else(|| {
                    let query = &queries[i / engine_count].text;
                    let engine = self.engines[i % engine_count].engine.config().id.clone();
                    let outcome = if interrupted.is_some() {
                        CallOutcome::Timeout
                    } else {
                        CallOutcome::Error {
                            kind: ErrorKind::Api,
                            message: "engine call task did not complete".into(),
                        }
                    };
                    EngineResult::new(engine, query.as_str(), outcome).with_attempts(0)
                })
            })
            .collect();

        let state = BatchState::from_statuses(results.iter().map(|r| r.status()));
        let batch = Batch {
            id,
            state,
            results,
            started_at,
            finished_at: Utc::now(),
            interrupted,
        };

        info!(
            batch_id = %id,
            state = ?batch.state,
            ok = batch.status_count(CallStatus::Ok),
            total,
            "Batch finished"
        );

        batch
    }
}

/// Call one engine, retrying retryable outcomes with jittered exponential
/// backoff. Returns the final result with its attempt count.
async fn call_with_retry(ctx: CallContext, text: String) -> EngineResult {
    let config = ctx.engine.config();
    let max_attempts = config.max_retries.saturating_add(1);
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        let result = {
            // Permits are held for the attempt only, never across a backoff.
            let _engine_permit = ctx.engine_permits.acquire().await;
            let _worker_permit = ctx.workers.acquire().await;

            match tokio::time::timeout(config.per_call_timeout, engine::query(ctx.engine.as_ref(), &text)).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(engine = %config.id, query = %text, attempt, "Engine call exceeded per-call timeout");
                    EngineResult::new(config.id.clone(), text.as_str(), CallOutcome::Timeout)
                        .with_latency(config.per_call_timeout)
                }
            }
        };

        if !result.outcome.is_retryable() || attempt >= max_attempts {
            return result.with_attempts(attempt);
        }

        let delay = backoff(ctx.retry_base_delay, attempt);
        debug!(
            engine = %config.id,
            query = %text,
            attempt,
            status = ?result.status(),
            delay_ms = delay.as_millis() as u64,
            "Retrying engine call"
        );
        tokio::time::sleep(delay).await;
    }
}

/// `base * 2^(attempt-1)`, jittered into [0.5x, 1.5x).
fn backoff(base: Duration, attempt: u32) -> Duration {
    let exp = base.saturating_mul(1u32 << attempt.saturating_sub(1).min(16));
    exp.mul_f64(0.5 + fastrand::f64())
}
