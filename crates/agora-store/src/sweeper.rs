//! Background RFP expiry sweeper

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::MarketStore;

/// Spawn the expiry sweeper.
///
/// At each tick the sweeper moves RFPs past their `expires_at` to
/// `expired` and closes bidding on RFPs past their deadline. A failure in
/// one pass is logged and the loop continues; one bad entry must never
/// stall the sweep.
pub fn spawn_expiry_sweeper(
    store: Arc<dyn MarketStore>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match store.expire_stale(Utc::now()).await {
                Ok(0) => {}
                Ok(changed) => debug!(changed, "expiry sweep transitioned RFPs"),
                Err(err) => warn!(error = %err, "expiry sweep failed"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryStore;
    use agora_types::{AgentId, CreateRfp, RfpStatus, UsdcAmount};
    use std::collections::HashMap;

    #[tokio::test]
    async fn test_sweeper_expires_stale_rfps() {
        let store = Arc::new(InMemoryStore::new());
        let rfp = store
            .create_rfp(CreateRfp {
                requester_agent_id: AgentId::new("c1"),
                task_type: "price_data".to_string(),
                requirements: HashMap::new(),
                max_budget_usdc: UsdcAmount(200),
                required_delivery_time_ms: None,
                expires_in_seconds: 1,
                bidding_window_seconds: None,
            })
            .await
            .unwrap();

        let handle = spawn_expiry_sweeper(store.clone(), Duration::from_millis(200));
        tokio::time::sleep(Duration::from_millis(1600)).await;
        handle.abort();

        let rfp = store.get_rfp(&rfp.rfp_id).await.unwrap();
        assert_eq!(rfp.status, RfpStatus::Expired);
    }
}
