use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use super::{board::TaskBoard, session::SessionContext};

pub const DEFAULT_PERIOD: Duration = Duration::from_secs(60);

/// Periodically persists every running timer on the board, and reloads the
/// board whenever the session token changes.
pub struct CheckpointSweep {
    board: Arc<Mutex<TaskBoard>>,
    session: SessionContext,
    tokens: watch::Receiver<Option<String>>,
    period: Duration,
}

impl CheckpointSweep {
    #[must_use]
    pub fn new(board: Arc<Mutex<TaskBoard>>, session: SessionContext) -> Self {
        Self {
            board,
            tokens: session.subscribe(),
            session,
            period: DEFAULT_PERIOD,
        }
    }

    #[must_use]
    pub const fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Runs until aborted. Token changes made after [`Self::new`] are
    /// observed.
    pub async fn run(mut self) {
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the first tick fires immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if !self.session.is_signed_in() {
                        continue;
                    }
                    let saved = self.board.lock().await.checkpoint_running().await;
                    if saved > 0 {
                        info!("Checkpointed {} running timers", saved);
                    }
                }
                changed = self.tokens.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let signed_in = self.tokens.borrow_and_update().is_some();
                    let mut board = self.board.lock().await;
                    if signed_in {
                        if let Err(e) = board.refresh().await {
                            warn!("Refreshing tasks after sign-in failed: {}", e);
                        }
                    } else {
                        board.clear();
                    }
                }
            }
        }
    }
}
