use mooncake_types::UserId;
use thiserror::Error;

/// Reasons a play is refused or aborted.
///
/// Missing catalog entries, quota races and payout failures are not errors:
/// the play still completes, without a reward unit or with a failed order.
#[derive(Error, Debug)]
pub enum PlayError {
    #[error("the activity has ended")]
    ActivityClosed,
    #[error("unknown player {0}")]
    UnknownPlayer(UserId),
    #[error("no plays left ({used} of {allowed} used)")]
    PlaysExhausted { used: u32, allowed: u32 },
    #[error("record store failure: {0:#}")]
    Store(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, PlayError>;
