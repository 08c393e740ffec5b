//! Chat announcements for high-tier wins.
//!
//! Plays enqueue an [`Announcement`] without waiting; a background task sends
//! it to the [`NotificationSink`]. A full queue or a failed send is logged and
//! dropped, never surfaced to the play.

use anyhow::Result;
use mooncake_types::PrizeLevel;
use std::future::Future;
use tokio::{
    sync::mpsc::{self, error::TrySendError},
    task::JoinHandle,
};
use tracing::{debug, error, info, warn};

/// Chat broadcast target.
pub trait NotificationSink: Send + Sync + 'static {
    fn send(&self, message: &str) -> impl Future<Output = Result<()>> + Send;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Announcement {
    pub player: String,
    pub level: PrizeLevel,
    pub award: String,
    pub reward: Option<String>,
    /// Points paid, when a reward unit was granted.
    pub points: Option<u64>,
}

impl Announcement {
    pub fn render(&self, activity_url: &str) -> String {
        let prize = match &self.reward {
            Some(reward) => format!("**{}** ({reward})", self.award),
            None => format!("**{}**", self.award),
        };
        let mut message = match self.points {
            Some(points) => format!(
                "Congratulations @{} on rolling {prize} and winning {points} points!",
                self.player
            ),
            None => format!("@{} rolled {prize}!", self.player),
        };
        if !activity_url.is_empty() {
            message.push_str(&format!("\n\n> [Join the mooncake gambling]({activity_url})"));
        }
        message
    }
}

/// Handle used by plays to queue announcements.
#[derive(Clone)]
pub struct Announcer {
    tx: mpsc::Sender<Announcement>,
}

impl Announcer {
    /// Start the delivery task. It exits once every [`Announcer`] clone is dropped.
    pub fn spawn<N: NotificationSink>(
        sink: N,
        capacity: usize,
        activity_url: String,
        dry_run: bool,
    ) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<Announcement>(capacity.max(1));
        let handle = tokio::spawn(async move {
            while let Some(announcement) = rx.recv().await {
                let message = announcement.render(&activity_url);
                if dry_run {
                    info!(
                        player = %announcement.player,
                        text = %message,
                        "dry run, skipping announcement"
                    );
                    continue;
                }
                if let Err(err) = sink.send(&message).await {
                    error!(
                        player = %announcement.player,
                        ?err,
                        "failed to send announcement"
                    );
                }
            }
            debug!("announcer stopped");
        });
        (Self { tx }, handle)
    }

    /// Queue without waiting.
    pub fn announce(&self, announcement: Announcement) {
        match self.tx.try_send(announcement) {
            Ok(()) => {}
            Err(TrySendError::Full(dropped)) => {
                warn!(player = %dropped.player, "announcement queue full, dropping");
            }
            Err(TrySendError::Closed(dropped)) => {
                warn!(player = %dropped.player, "announcer stopped, dropping");
            }
        }
    }
}
