//! Concurrent criterion scoring with warm-up, batching, and backoff.
//!
//! The scheduler drives every scoring unit through the oracle exactly once
//! per run. Concurrency ramps up in two phases: a strictly sequential
//! warm-up slice that discovers the oracle's tolerance before any burst,
//! then fixed-size batches dispatched concurrently under a semaphore, with
//! a hard barrier and a pause between batches. Rate limits and transient
//! failures are retried with exponential backoff and jitter; a unit that
//! exhausts its retries ends as a null-score result instead of an error, so
//! one oracle outage never sinks the rest of the run.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use panelgrade_rubric::{render, unit_template, ScoringUnit, SECTION_TEXT_VAR};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::documents::DocumentBundle;
use crate::oracle::{parse_score_response, ScoringOracle};

/// Reasoning text recorded when a unit exhausts its retries.
const PARSE_FAILURE_REASONING: &str = "Could not parse response";

/// Scheduling knobs, fixed at construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Hard ceiling on simultaneously in-flight oracle calls.
    pub max_concurrent: usize,

    /// Units released into flight together after warm-up.
    pub batch_size: usize,

    /// Units processed one at a time before batching begins.
    pub warmup_count: usize,

    /// Pause after each warm-up unit, in milliseconds.
    pub warmup_delay_ms: u64,

    /// Base for exponential backoff and the inter-batch pause, in
    /// milliseconds.
    pub base_delay_ms: u64,

    /// Per-unit attempt ceiling.
    pub max_retries: u32,

    /// Character budget for the section text embedded in each prompt.
    pub section_char_budget: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 4,
            batch_size: 5,
            warmup_count: 3,
            warmup_delay_ms: 2_000,
            base_delay_ms: 2_000,
            max_retries: 3,
            section_char_budget: 3_000,
        }
    }
}

impl SchedulerConfig {
    pub fn warmup_delay(&self) -> Duration {
        Duration::from_millis(self.warmup_delay_ms)
    }

    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }
}

/// Terminal outcome of scoring one unit.
///
/// `score` is `None` only after every retry failed; such units are excluded
/// from aggregation rather than counted as zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitResult {
    pub unit: ScoringUnit,
    pub score: Option<f64>,
    pub evidence: String,
    pub reasoning: String,
    pub improvements: String,
    pub attempts: u32,
}

impl UnitResult {
    /// `score * weight` for scored units.
    pub fn weighted_score(&self) -> Option<f64> {
        self.score.map(|s| s * self.unit.weight)
    }
}

/// Receives each unit result as it reaches a terminal state, so a crashed
/// run still leaves a partial, valid audit trail.
#[async_trait]
pub trait ScoreSink: Send + Sync {
    async fn record(&self, result: &UnitResult) -> crate::error::Result<()>;
}

/// Drives scoring units through the oracle under the configured schedule.
pub struct ScoreScheduler {
    config: SchedulerConfig,
    oracle: Arc<dyn ScoringOracle>,
}

impl ScoreScheduler {
    pub fn new(oracle: Arc<dyn ScoringOracle>, config: SchedulerConfig) -> Self {
        Self { config, oracle }
    }

    /// Score every unit, returning results in unit order.
    ///
    /// Warm-up units run strictly sequentially with a pause after each; the
    /// remainder runs in batches with a hard barrier between them. Within a
    /// batch there is no ordering guarantee.
    pub async fn run(
        &self,
        units: &[ScoringUnit],
        bundle: &DocumentBundle,
        sink: Option<Arc<dyn ScoreSink>>,
    ) -> Vec<UnitResult> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent.max(1)));
        let warmup = units.len().min(self.config.warmup_count);
        let mut results: Vec<UnitResult> = Vec::with_capacity(units.len());

        info!(
            units = units.len(),
            warmup,
            batch_size = self.config.batch_size,
            max_concurrent = self.config.max_concurrent,
            "starting scoring run"
        );

        for (i, unit) in units[..warmup].iter().enumerate() {
            let prompt = self.render_prompt(unit, bundle);
            let result = score_unit(
                Arc::clone(&self.oracle),
                Arc::clone(&semaphore),
                self.config.clone(),
                unit.clone(),
                prompt,
            )
            .await;
            record_result(sink.as_deref(), &result).await;
            results.push(result);
            if i + 1 < units.len() {
                sleep(self.config.warmup_delay()).await;
            }
        }

        let rest = &units[warmup..];
        let batch_size = self.config.batch_size.max(1);
        let batch_count = rest.chunks(batch_size).len();

        for (batch_idx, batch) in rest.chunks(batch_size).enumerate() {
            debug!(batch = batch_idx + 1, of = batch_count, size = batch.len(), "dispatching batch");
            let mut join_set: JoinSet<(usize, UnitResult)> = JoinSet::new();

            for (idx, unit) in batch.iter().enumerate() {
                let oracle = Arc::clone(&self.oracle);
                let semaphore = Arc::clone(&semaphore);
                let config = self.config.clone();
                let unit = unit.clone();
                let prompt = self.render_prompt(&unit, bundle);
                let sink = sink.clone();

                join_set.spawn(async move {
                    let result = score_unit(oracle, semaphore, config, unit, prompt).await;
                    record_result(sink.as_deref(), &result).await;
                    (idx, result)
                });
            }

            // Hard barrier: the next batch must not start until every task
            // in this one reached a terminal state.
            let mut slots: Vec<Option<UnitResult>> = vec![None; batch.len()];
            while let Some(joined) = join_set.join_next().await {
                match joined {
                    Ok((idx, result)) => slots[idx] = Some(result),
                    Err(e) => warn!(error = %e, "scoring task join error"),
                }
            }
            for (idx, slot) in slots.into_iter().enumerate() {
                results.push(slot.unwrap_or_else(|| UnitResult {
                    unit: batch[idx].clone(),
                    score: None,
                    evidence: String::new(),
                    reasoning: PARSE_FAILURE_REASONING.to_string(),
                    improvements: String::new(),
                    attempts: 0,
                }));
            }

            if batch_idx + 1 < batch_count {
                sleep(self.config.base_delay()).await;
            }
        }

        let scored = results.iter().filter(|r| r.score.is_some()).count();
        info!(scored, failed = results.len() - scored, "scoring run complete");
        results
    }

    fn render_prompt(&self, unit: &ScoringUnit, bundle: &DocumentBundle) -> String {
        let section_text =
            bundle.section_text(&unit.type_name, self.config.section_char_budget);
        render(&unit_template(unit), &[(SECTION_TEXT_VAR, &section_text)])
    }
}

/// Score one unit, retrying up to `max_retries` attempts.
///
/// The semaphore permit is held only across the oracle call itself, never
/// across backoff sleeps, so a unit backing off does not occupy a
/// concurrency slot.
async fn score_unit(
    oracle: Arc<dyn ScoringOracle>,
    semaphore: Arc<Semaphore>,
    config: SchedulerConfig,
    unit: ScoringUnit,
    prompt: String,
) -> UnitResult {
    let key = unit.key();

    for attempt in 0..config.max_retries {
        let outcome = {
            let permit = match semaphore.acquire().await {
                Ok(p) => p,
                Err(_) => break,
            };
            let outcome = oracle.complete(&prompt).await;
            drop(permit);
            outcome
        };

        match outcome {
            Ok(text) => match parse_score_response(&text) {
                Ok(decoded) => {
                    if let Some(score) = decoded.normalized_score() {
                        return UnitResult {
                            unit,
                            score: Some(score),
                            evidence: decoded.evidence,
                            reasoning: decoded.reasoning,
                            improvements: decoded.improvements.unwrap_or_default(),
                            attempts: attempt + 1,
                        };
                    }
                }
                Err(e) => {
                    debug!(unit = %key, attempt = attempt + 1, error = %e, "undecodable oracle response");
                }
            },
            Err(e) => {
                if e.is_rate_limit() {
                    warn!(unit = %key, attempt = attempt + 1, "oracle rate limited");
                } else {
                    warn!(unit = %key, attempt = attempt + 1, error = %e, "oracle call failed");
                }
                if attempt + 1 < config.max_retries {
                    sleep(backoff_delay(config.base_delay(), attempt)).await;
                }
            }
        }
    }

    UnitResult {
        unit,
        score: None,
        evidence: String::new(),
        reasoning: PARSE_FAILURE_REASONING.to_string(),
        improvements: String::new(),
        attempts: config.max_retries,
    }
}

/// `base * 2^attempt` plus up to one second of uniform jitter.
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let exponential = base.as_secs_f64() * 2f64.powi(attempt as i32);
    Duration::from_secs_f64(exponential + rand::random::<f64>())
}

async fn record_result(sink: Option<&dyn ScoreSink>, result: &UnitResult) {
    if let Some(sink) = sink {
        if let Err(e) = sink.record(result).await {
            warn!(unit = %result.unit.key(), error = %e, "audit sink write failed");
        }
    }
}
