//! Test doubles and catalog fixtures.

use crate::{
    announce::NotificationSink,
    dice::{DiceRoller, DiceSource},
    points::PointDistributor,
    store::RecordStore,
};
use anyhow::{anyhow, Result};
use mooncake_types::{Award, AwardId, DiceSet, Player, PrizeLevel, Reward, RewardId, UserId};
use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex, PoisonError,
    },
    time::Duration,
};

/// Replays scripted rolls, then falls back to a seeded roller.
pub struct ScriptedDice {
    rolls: VecDeque<DiceSet>,
    picks: VecDeque<usize>,
    fallback: DiceRoller,
}

impl ScriptedDice {
    pub fn new<I: IntoIterator<Item = [u8; 6]>>(rolls: I) -> Self {
        Self {
            rolls: rolls
                .into_iter()
                .map(|faces| DiceSet::new(faces).expect("scripted faces must be 1..=6"))
                .collect(),
            picks: VecDeque::new(),
            fallback: DiceRoller::from_seed(0),
        }
    }

    pub fn with_picks<I: IntoIterator<Item = usize>>(mut self, picks: I) -> Self {
        self.picks = picks.into_iter().collect();
        self
    }
}

impl DiceSource for ScriptedDice {
    fn roll(&mut self) -> DiceSet {
        self.rolls
            .pop_front()
            .unwrap_or_else(|| self.fallback.roll())
    }

    fn pick(&mut self, len: usize) -> usize {
        self.picks
            .pop_front()
            .unwrap_or_else(|| self.fallback.pick(len))
    }
}

/// Same roll forever.
pub struct FixedDice(pub DiceSet);

impl FixedDice {
    pub fn new(faces: [u8; 6]) -> Self {
        Self(DiceSet::new(faces).expect("fixed faces must be 1..=6"))
    }
}

impl DiceSource for FixedDice {
    fn roll(&mut self) -> DiceSet {
        self.0
    }

    fn pick(&mut self, _len: usize) -> usize {
        0
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DistributeCall {
    pub username: String,
    pub points: u64,
    pub memo: String,
}

/// Records every call; fails them while a failure message is set.
#[derive(Clone, Default)]
pub struct RecordingDistributor {
    calls: Arc<Mutex<Vec<DistributeCall>>>,
    failure: Arc<Mutex<Option<String>>>,
    delay: Duration,
}

impl RecordingDistributor {
    pub fn failing(message: &str) -> Self {
        let distributor = Self::default();
        distributor.set_failure(Some(message));
        distributor
    }

    /// Sleep this long inside every call, after recording it.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn set_failure(&self, message: Option<&str>) {
        *self.failure.lock().unwrap_or_else(PoisonError::into_inner) =
            message.map(str::to_string);
    }

    pub fn calls(&self) -> Vec<DistributeCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl PointDistributor for RecordingDistributor {
    async fn distribute(&self, username: &str, points: u64, memo: &str) -> Result<()> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(DistributeCall {
                username: username.to_string(),
                points,
                memo: memo.to_string(),
            });
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let failure = self
            .failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match failure {
            Some(message) => Err(anyhow!(message)),
            None => Ok(()),
        }
    }
}

/// Collects announcements; optionally fails every send.
#[derive(Clone, Default)]
pub struct RecordingSink {
    messages: Arc<Mutex<Vec<String>>>,
    attempts: Arc<AtomicUsize>,
    fail: bool,
}

impl RecordingSink {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl NotificationSink for RecordingSink {
    async fn send(&self, message: &str) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(anyhow!("chatroom unavailable"));
        }
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.to_string());
        Ok(())
    }
}

pub fn reward(id: &str, level: PrizeLevel, points: u64, amount: u32) -> Reward {
    Reward {
        id: RewardId::new(id),
        level,
        name: format!("{} reward", level.label()),
        points,
        amount,
    }
}

pub fn award(id: &str, level: PrizeLevel, reward: Option<&str>) -> Award {
    Award {
        id: AwardId::new(id),
        level,
        name: level.label().to_string(),
        description: String::new(),
        reward: reward.map(RewardId::new),
    }
}

pub fn player(id: &str, bonus_plays: u32) -> Player {
    Player {
        id: UserId::new(id),
        name: format!("{id}-name"),
        bonus_plays,
    }
}

/// Points and quota per level for [`seed_catalog`].
pub const CATALOG: [(PrizeLevel, u64, u32); 12] = [
    (PrizeLevel::OneFour, 8, 100),
    (PrizeLevel::TwoFours, 16, 50),
    (PrizeLevel::FourOfAKindNonFour, 32, 20),
    (PrizeLevel::ThreeFours, 64, 10),
    (PrizeLevel::FullSet, 128, 5),
    (PrizeLevel::FourFoursTop, 256, 3),
    (PrizeLevel::FiveOfAKindNonFour, 512, 2),
    (PrizeLevel::FiveFours, 666, 1),
    (PrizeLevel::SixOfAKindNonOneNonFour, 888, 1),
    (PrizeLevel::SixOnes, 888, 1),
    (PrizeLevel::FourFoursPlusTwoOnes, 1_888, 1),
    (PrizeLevel::SixFours, 2_888, 1),
];

/// One award and one reward per non-empty level, ids `a-{level}` / `r-{level}`.
pub async fn seed_catalog<S: RecordStore>(store: &S) -> Result<()> {
    for (level, points, amount) in CATALOG {
        let reward_id = format!("r-{}", level.value());
        store
            .upsert_reward(reward(&reward_id, level, points, amount))
            .await?;
        store
            .upsert_award(award(
                &format!("a-{}", level.value()),
                level,
                Some(&reward_id),
            ))
            .await?;
    }
    Ok(())
}
