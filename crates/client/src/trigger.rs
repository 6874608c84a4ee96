use domain::Identified;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::feed::{FetchOutcome, PageSource, PaginationController};

pub const DEFAULT_ROOT_MARGIN_PX: u32 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedTrigger {
    Mount,
    /// The sentinel's distance below the viewport edge, in pixels. Zero or
    /// negative means it is on screen.
    SentinelVisible { distance_px: i32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerPolicy {
    pub root_margin_px: u32,
}

impl Default for TriggerPolicy {
    fn default() -> Self {
        Self {
            root_margin_px: DEFAULT_ROOT_MARGIN_PX,
        }
    }
}

impl TriggerPolicy {
    pub fn is_near(&self, distance_px: i32) -> bool {
        i64::from(distance_px) <= i64::from(self.root_margin_px)
    }

    pub async fn handle<T, S>(
        &self,
        feed: &PaginationController<T, S>,
        trigger: FeedTrigger,
    ) -> Option<FetchOutcome>
    where
        T: Identified + Clone + Send + 'static,
        S: PageSource<T>,
    {
        match trigger {
            FeedTrigger::Mount => Some(feed.on_mount().await),
            FeedTrigger::SentinelVisible { distance_px } if self.is_near(distance_px) => {
                Some(feed.fetch_next_page().await)
            }
            FeedTrigger::SentinelVisible { .. } => None,
        }
    }
}

/// Runs until the channel closes or `cancel` fires.
pub async fn run_triggers<T, S>(
    feed: Arc<PaginationController<T, S>>,
    policy: TriggerPolicy,
    mut rx: mpsc::Receiver<FeedTrigger>,
    cancel: CancellationToken,
) where
    T: Identified + Clone + Send + 'static,
    S: PageSource<T>,
{
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("Feed trigger loop cancelled");
                break;
            }
            trigger = rx.recv() => {
                let Some(trigger) = trigger else { break };
                if let Some(outcome) = policy.handle(&feed, trigger).await {
                    debug!("{:?} -> {:?}", trigger, outcome);
                }
            }
        }
    }
}
