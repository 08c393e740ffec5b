//! Quota and best-flag invariants under concurrent plays.

#[cfg(test)]
mod tests {
    use crate::{
        classify::evaluate,
        compare::{best_of, compare},
        dice::DiceSource,
        gate::AlwaysOpen,
        memory::MemoryStore,
        mocks::{award, player, reward, seed_catalog, FixedDice, RecordingDistributor, ScriptedDice},
        settings::{ActivitySettings, ThrottleSettings},
        store::RecordStore,
        Activity, PlayError,
    };
    use futures::future::join_all;
    use mooncake_types::{OrderDraft, OrderStatus, PrizeLevel, RewardId, UserId};
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use std::{cmp::Ordering, sync::Arc, time::Duration};

    type Shared<D> = Arc<Activity<MemoryStore, D, RecordingDistributor, AlwaysOpen>>;

    fn settings() -> ActivitySettings {
        ActivitySettings {
            throttle: ThrottleSettings::unthrottled(),
            ..Default::default()
        }
    }

    async fn shared<D: DiceSource>(dice: D, store: MemoryStore) -> Shared<D> {
        Arc::new(Activity::new(
            store,
            dice,
            RecordingDistributor::default(),
            AlwaysOpen,
            settings(),
        ))
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_quota_holds_across_players() {
        let store = MemoryStore::new();
        seed_catalog(&store).await.unwrap();
        for i in 0..64 {
            store.upsert_player(player(&format!("p{i}"), 0)).await.unwrap();
        }
        let activity = shared(FixedDice::new([1, 2, 3, 4, 5, 6]), store.clone()).await;

        let handles: Vec<_> = (0..64)
            .map(|i| {
                let activity = activity.clone();
                tokio::spawn(async move { activity.play(&UserId::new(format!("p{i}"))).await })
            })
            .collect();
        let outcomes: Vec<_> = join_all(handles)
            .await
            .into_iter()
            .map(|joined| joined.unwrap().unwrap())
            .collect();

        let granted = outcomes.iter().filter(|o| o.got_reward).count();
        assert_eq!(granted, 5);
        assert_eq!(store.count_granted(&RewardId::new("r-5")).await.unwrap(), 5);
        // One order per granted play.
        assert_eq!(store.orders().len(), 5);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_single_unit_top_reward_is_issued_once() {
        let store = MemoryStore::new();
        store
            .upsert_reward(reward("r-six", PrizeLevel::SixFours, 2_888, 1))
            .await
            .unwrap();
        store
            .upsert_award(award("a-six", PrizeLevel::SixFours, Some("r-six")))
            .await
            .unwrap();
        for i in 0..32 {
            store.upsert_player(player(&format!("p{i}"), 0)).await.unwrap();
        }
        let activity = shared(FixedDice::new([4, 4, 4, 4, 4, 4]), store.clone()).await;

        let handles: Vec<_> = (0..32)
            .map(|i| {
                let activity = activity.clone();
                tokio::spawn(async move { activity.play(&UserId::new(format!("p{i}"))).await })
            })
            .collect();
        let outcomes: Vec<_> = join_all(handles)
            .await
            .into_iter()
            .map(|joined| joined.unwrap().unwrap())
            .collect();

        // Every player's first top-tier play is their best; only one is paid.
        assert!(outcomes.iter().all(|o| o.is_best));
        assert_eq!(outcomes.iter().filter(|o| o.got_reward).count(), 1);
        assert_eq!(store.count_granted(&RewardId::new("r-six")).await.unwrap(), 1);
    }

    fn top_tier_rolls(seed: u64, n: usize) -> Vec<[u8; 6]> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n)
            .map(|_| match rng.gen_range(0..3) {
                0 => [4, 4, 4, 4, rng.gen_range(1..=6), rng.gen_range(1..=6)],
                1 => {
                    let face = rng.gen_range(1..=6);
                    [face, face, face, face, face, rng.gen_range(1..=6)]
                }
                _ => [rng.gen_range(1..=6); 6],
            })
            .collect()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_same_player_keeps_single_best_and_allowance() {
        let store = MemoryStore::new();
        seed_catalog(&store).await.unwrap();
        // Allowance caps at 20.
        store.upsert_player(player("solo", 100)).await.unwrap();
        let rolls = top_tier_rolls(7, 40);
        let activity = shared(ScriptedDice::new(rolls), store.clone()).await;

        let handles: Vec<_> = (0..40)
            .map(|_| {
                let activity = activity.clone();
                tokio::spawn(async move { activity.play(&UserId::new("solo")).await })
            })
            .collect();
        let mut played = 0;
        let mut exhausted = 0;
        for joined in join_all(handles).await {
            match joined.unwrap() {
                Ok(_) => played += 1,
                Err(PlayError::PlaysExhausted { allowed, .. }) => {
                    assert_eq!(allowed, 20);
                    exhausted += 1;
                }
                Err(err) => panic!("unexpected error: {err}"),
            }
        }
        assert_eq!((played, exhausted), (20, 20));

        let rows = store.histories();
        assert_eq!(rows.len(), 20);
        let mut times: Vec<_> = rows.iter().map(|h| h.times).collect();
        times.sort_unstable();
        assert_eq!(times, (1..=20).collect::<Vec<_>>());

        let flagged: Vec<_> = rows.iter().filter(|h| h.is_best).collect();
        assert_eq!(flagged.len(), 1);
        let results: Vec<_> = rows.iter().map(|h| evaluate(h.dice)).collect();
        let max = best_of(results.iter()).unwrap();
        assert_eq!(compare(&evaluate(flagged[0].dice), max), Ordering::Equal);

        // Granted top-tier rows were each best when played, so per reward the
        // grants never exceed the quota.
        for standing in activity.standings().await.unwrap() {
            assert!(standing.issued <= standing.amount);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_parallel_retry_jobs_pay_each_order_once() {
        let store = MemoryStore::new();
        store.upsert_player(player("vi", 0)).await.unwrap();
        for i in 0..3 {
            let mut order = store
                .insert_order(OrderDraft {
                    user: UserId::new("vi"),
                    history: None,
                    points: 10 + i,
                    memo: "m".to_string(),
                })
                .await
                .unwrap();
            order.fail("platform timeout").unwrap();
            store
                .transition_order(&order, OrderStatus::Pending)
                .await
                .unwrap();
        }
        let activity = Activity::new(
            store.clone(),
            FixedDice::new([1, 2, 3, 5, 6, 6]),
            RecordingDistributor::default().with_delay(Duration::from_millis(2)),
            AlwaysOpen,
            settings(),
        );

        let (first, second) = tokio::join!(
            activity.retry_failed_orders(),
            activity.retry_failed_orders()
        );
        let (first, second) = (first.unwrap(), second.unwrap());

        let mut memos: Vec<_> = activity
            .distributor()
            .calls()
            .into_iter()
            .map(|call| call.memo)
            .collect();
        memos.sort();
        assert_eq!(memos, vec!["m order #1", "m order #2", "m order #3"]);
        assert_eq!(first.succeeded + second.succeeded, 3);
        assert_eq!(first.failed + second.failed, 0);
        assert_eq!(
            first.skipped + second.skipped,
            first.total + second.total - 3
        );
        assert!(store
            .orders()
            .iter()
            .all(|order| order.status == OrderStatus::Success));
    }
}
