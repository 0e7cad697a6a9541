use crate::algorithms::weights::{RankingWeights, WeightAdjuster, WeightStore};
use crate::config::RetrainerConfig;
use crate::error::Result;
use crate::services::store::InteractionLog;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrainReport {
    pub scanned: usize,
    pub reinforced: usize,
    pub failed: usize,
    pub weights: RankingWeights,
    pub finished_at: DateTime<Utc>,
}

/// Batch job that replays recent positive feedback through the weight adjuster.
///
/// Every run starts again from the floor weights and publishes the result in one
/// swap, so running it twice over the same log yields the same weights.
pub struct ModelRetrainer {
    log: Arc<dyn InteractionLog>,
    weights: Arc<WeightStore>,
    adjuster: Arc<dyn WeightAdjuster>,
    config: RetrainerConfig,
    run_lock: Mutex<()>,
    last_report: RwLock<Option<RetrainReport>>,
}

impl ModelRetrainer {
    pub fn new(
        log: Arc<dyn InteractionLog>,
        weights: Arc<WeightStore>,
        adjuster: Arc<dyn WeightAdjuster>,
        config: RetrainerConfig,
    ) -> Self {
        Self {
            log,
            weights,
            adjuster,
            config,
            run_lock: Mutex::new(()),
            last_report: RwLock::new(None),
        }
    }

    pub fn weights(&self) -> &Arc<WeightStore> {
        &self.weights
    }

    pub fn last_report(&self) -> Option<RetrainReport> {
        self.last_report.read().clone()
    }

    /// Safe to call repeatedly; overlapping runs queue behind each other.
    pub async fn retrain_model(&self) -> Result<RetrainReport> {
        let _run = self.run_lock.lock().await;
        let started = Instant::now();

        let events = self.log.query_recent(self.config.scan_limit).await?;
        let staged = WeightStore::new(self.weights.floor());
        let mut reinforced = 0;
        let mut failed = 0;

        for event in events.iter().filter(|e| e.interaction_type.is_positive_feedback()) {
            match self
                .adjuster
                .adjust_weights(
                    event.user_id,
                    event.video_id,
                    self.config.learning_rate,
                    &staged,
                )
                .await
            {
                Ok(()) => reinforced += 1,
                Err(e) => {
                    failed += 1;
                    warn!(
                        user_id = %event.user_id,
                        video_id = %event.video_id,
                        "Weight adjustment failed: {}", e
                    );
                }
            }
        }

        self.weights.publish(staged.snapshot());
        let report = RetrainReport {
            scanned: events.len(),
            reinforced,
            failed,
            weights: self.weights.snapshot(),
            finished_at: Utc::now(),
        };

        info!(
            "Retrain finished in {:?}: scanned {}, reinforced {}, failed {}",
            started.elapsed(),
            report.scanned,
            report.reinforced,
            report.failed
        );

        *self.last_report.write() = Some(report.clone());
        Ok(report)
    }

    /// Runs `retrain_model` every `every` on its own task, first run after one period.
    pub fn spawn_schedule(self: Arc<Self>, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // the first tick completes immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;
                if let Err(e) = self.retrain_model().await {
                    error!("Scheduled retrain failed: {}", e);
                }
            }
        })
    }
}
