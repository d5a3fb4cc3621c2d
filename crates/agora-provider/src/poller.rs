//! RFP polling loop

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use agora_types::{Result, Rfp, SubmitBid};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::ProviderAgent;

const BID_RETRY_BACKOFF: Duration = Duration::from_millis(500);

impl ProviderAgent {
    /// One polling pass: fetch open RFPs for our capabilities, decide and
    /// bid on the ones we have not seen. Returns how many bids went out.
    pub async fn poll_once(&self) -> Result<usize> {
        let open = self
            .registry
            .open_rfps(&self.config.capabilities)
            .await?;

        let fresh: Vec<Rfp> = {
            let mut seen = self.seen_rfps.lock().unwrap_or_else(|e| e.into_inner());
            open.rfps
                .into_iter()
                .filter(|rfp| seen.insert(rfp.rfp_id))
                .collect()
        };

        let mut submitted = 0;
        for rfp in fresh {
            debug!(rfp_id = %rfp.rfp_id, task_type = %rfp.task_type, "new RFP seen");
            let Some(base_price) = self.config.price_for(&rfp.task_type) else {
                continue;
            };
            let decision = self.policy.decide(&rfp, base_price).await;
            if !decision.should_bid {
                debug!(rfp_id = %rfp.rfp_id, reason = %decision.message, "passing on RFP");
                continue;
            }

            let bid = SubmitBid {
                bidder_agent_id: self.config.agent_id.clone(),
                bid_price_usdc: decision.price,
                estimated_completion_ms: Some(decision.estimated_completion_ms),
                confidence_score: decision.confidence,
                message: decision.message,
                expires_at: None,
            };

            match self.submit_with_retry(&rfp, &bid).await {
                Ok(()) => {
                    self.bids_submitted.fetch_add(1, Ordering::Relaxed);
                    submitted += 1;
                    info!(rfp_id = %rfp.rfp_id, price = %decision.price, "bid submitted");
                }
                Err(err) => {
                    warn!(rfp_id = %rfp.rfp_id, error = %err, "bid dropped");
                }
            }
        }
        Ok(submitted)
    }

    /// One retry after backoff for transient failures; anything else is
    /// dropped and logged by the caller.
    async fn submit_with_retry(&self, rfp: &Rfp, bid: &SubmitBid) -> Result<()> {
        match self.registry.submit_bid(&rfp.rfp_id, bid).await {
            Ok(_) => Ok(()),
            Err(err) if err.is_retriable() => {
                tokio::time::sleep(BID_RETRY_BACKOFF).await;
                self.registry.submit_bid(&rfp.rfp_id, bid).await.map(|_| ())
            }
            Err(err) => Err(err),
        }
    }

    /// Spawn the polling loop. Transient registry failures are swallowed
    /// and the loop continues on the next tick.
    pub fn spawn_polling(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.config.poll_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(err) = self.poll_once().await {
                    warn!(error = %err, "RFP poll failed, will retry next tick");
                }
            }
        })
    }
}
