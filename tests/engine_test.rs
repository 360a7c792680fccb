//! Integration tests for the auto-assignment engine.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use helpdesk_autoassign::Engine;
use helpdesk_autoassign::error::{Error, Result};
use helpdesk_autoassign::model::*;
use helpdesk_autoassign::store::{ConversationStore, MemoryStore, TeamStore};

/// Wraps a `MemoryStore`, counting every call and failing on demand.
#[derive(Default)]
struct CountingStore {
    inner: MemoryStore,
    calls: AtomicUsize,
    fail_teams: AtomicBool,
    fail_update_for: Mutex<HashSet<ConversationId>>,
    fail_count_for: Mutex<HashSet<UserId>>,
    fetch_delay: Mutex<Option<Duration>>,
    fetches_in_flight: AtomicUsize,
    max_fetches_in_flight: AtomicUsize,
}

impl CountingStore {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    fn assignee(&self, id: ConversationId) -> Option<UserId> {
        self.inner.conversation(id).unwrap().assigned_user_id
    }

    fn max_fetches_in_flight(&self) -> usize {
        self.max_fetches_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConversationStore for CountingStore {
    async fn unassigned_conversations(&self) -> Result<Vec<Conversation>> {
        self.hit();
        let now = self.fetches_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_fetches_in_flight.fetch_max(now, Ordering::SeqCst);
        let delay = *self.fetch_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.fetches_in_flight.fetch_sub(1, Ordering::SeqCst);
        self.inner.unassigned_conversations().await
    }

    async fn update_user_assignee(
        &self,
        conversation_id: ConversationId,
        user_id: UserId,
        actor: &User,
    ) -> Result<()> {
        self.hit();
        if self.fail_update_for.lock().unwrap().contains(&conversation_id) {
            return Err(Error::Store("update rejected".to_string()));
        }
        self.inner
            .update_user_assignee(conversation_id, user_id, actor)
            .await
    }

    async fn active_user_conversations_count(&self, user_id: UserId) -> Result<u32> {
        self.hit();
        if self.fail_count_for.lock().unwrap().contains(&user_id) {
            return Err(Error::Store("count unavailable".to_string()));
        }
        self.inner.active_user_conversations_count(user_id).await
    }
}

#[async_trait]
impl TeamStore for CountingStore {
    async fn all_teams(&self) -> Result<Vec<Team>> {
        self.hit();
        if self.fail_teams.load(Ordering::SeqCst) {
            return Err(Error::Store("teams unavailable".to_string()));
        }
        self.inner.all_teams().await
    }

    async fn team_members(&self, team_id: TeamId) -> Result<Vec<UserId>> {
        self.hit();
        self.inner.team_members(team_id).await
    }
}

fn users(ids: &[i32]) -> Vec<UserId> {
    ids.iter().map(|id| UserId(*id)).collect()
}

fn system_user() -> User {
    User::new(1, "System")
}

async fn engine_with(stores: &Arc<CountingStore>) -> Engine {
    Engine::new(stores.clone(), stores.clone(), system_user())
        .await
        .expect("failed to create engine")
}

const TEAM_A: TeamId = TeamId(1);
const TEAM_B: TeamId = TeamId(2);

// ---------------------------------------------------------------------------
// Assignment behaviour
// ---------------------------------------------------------------------------

#[tokio::test]
async fn two_member_team_with_cap_one() {
    let stores = Arc::new(CountingStore::default());
    stores
        .inner
        .put_team(Team::round_robin(1, "A", 1), users(&[11, 12]));
    let c1 = stores.inner.add_conversation(Conversation::for_team(TEAM_A));
    let c2 = stores.inner.add_conversation(Conversation::for_team(TEAM_A));
    let engine = engine_with(&stores).await;

    // Cycle 1: U1 then U2, both under the cap.
    engine.tick().await.unwrap();
    assert_eq!(stores.assignee(c1), Some(UserId(11)));
    assert_eq!(stores.assignee(c2), Some(UserId(12)));

    // Cycle 2: the draw lands on U1 who is now at the cap.
    let c3 = stores.inner.add_conversation(Conversation::for_team(TEAM_A));
    engine.reload().await.unwrap();
    let report = engine.run_cycle().await.unwrap();
    assert_eq!(report.skipped_capacity, 1);
    assert_eq!(stores.assignee(c3), None);

    // Without a reload the rotation has moved on to U2, also at the cap.
    let report = engine.run_cycle().await.unwrap();
    assert_eq!(report.skipped_capacity, 1);
    assert_eq!(stores.assignee(c3), None);

    // U1 frees up; the next tick assigns the waiting conversation to them.
    stores.inner.close_conversation(c1).unwrap();
    engine.tick().await.unwrap();
    assert_eq!(stores.assignee(c3), Some(UserId(11)));
}

#[tokio::test]
async fn rotation_restarts_after_reload() {
    let stores = Arc::new(CountingStore::default());
    stores
        .inner
        .put_team(Team::round_robin(1, "A", 10), users(&[11, 12, 13]));
    let engine = engine_with(&stores).await;

    let first = stores.inner.add_conversation(Conversation::for_team(TEAM_A));
    engine.tick().await.unwrap();
    let second = stores.inner.add_conversation(Conversation::for_team(TEAM_A));
    engine.tick().await.unwrap();

    assert_eq!(stores.assignee(first), Some(UserId(11)));
    assert_eq!(stores.assignee(second), Some(UserId(11)));
}

#[tokio::test]
async fn draws_follow_membership_order() {
    let stores = Arc::new(CountingStore::default());
    stores
        .inner
        .put_team(Team::round_robin(1, "A", 10), users(&[13, 11, 12]));
    let ids: Vec<_> = (0..4)
        .map(|_| stores.inner.add_conversation(Conversation::for_team(TEAM_A)))
        .collect();
    let engine = engine_with(&stores).await;

    let report = engine.run_cycle().await.unwrap();

    assert_eq!(report.assigned, 4);
    let assigned: Vec<_> = ids.iter().map(|id| stores.assignee(*id).unwrap()).collect();
    assert_eq!(assigned, users(&[13, 11, 12, 13]));
}

#[tokio::test]
async fn never_assigns_to_user_at_cap() {
    let stores = Arc::new(CountingStore::default());
    stores
        .inner
        .put_team(Team::round_robin(1, "A", 2), users(&[11, 12]));
    let ids: Vec<_> = (0..10)
        .map(|_| stores.inner.add_conversation(Conversation::for_team(TEAM_A)))
        .collect();
    let engine = engine_with(&stores).await;

    for _ in 0..3 {
        engine.tick().await.unwrap();
    }

    let assigned: Vec<_> = ids.iter().filter_map(|id| stores.assignee(*id)).collect();
    assert_eq!(assigned.len(), 4);
    assert_eq!(assigned.iter().filter(|u| **u == UserId(11)).count(), 2);
    assert_eq!(assigned.iter().filter(|u| **u == UserId(12)).count(), 2);
}

#[tokio::test]
async fn manual_teams_are_never_assigned() {
    let stores = Arc::new(CountingStore::default());
    stores.inner.put_team(Team::manual(2, "B"), users(&[21, 22]));
    let id = stores.inner.add_conversation(Conversation::for_team(TEAM_B));
    let engine = engine_with(&stores).await;

    for _ in 0..3 {
        engine.tick().await.unwrap();
    }

    assert_eq!(stores.assignee(id), None);
    assert!(stores.inner.assignments().is_empty());
    assert!(engine.pool_sizes().await.is_empty());
}

#[tokio::test]
async fn switching_policy_takes_effect_on_reload() {
    let stores = Arc::new(CountingStore::default());
    stores.inner.put_team(Team::manual(2, "B"), users(&[21]));
    let id = stores.inner.add_conversation(Conversation::for_team(TEAM_B));
    let engine = engine_with(&stores).await;

    engine.tick().await.unwrap();
    assert_eq!(stores.assignee(id), None);

    stores
        .inner
        .put_team(Team::round_robin(2, "B", 5), users(&[21]));
    engine.tick().await.unwrap();
    assert_eq!(stores.assignee(id), Some(UserId(21)));
}

#[tokio::test]
async fn assignments_are_attributed_to_system_user() {
    let stores = Arc::new(CountingStore::default());
    stores
        .inner
        .put_team(Team::round_robin(1, "A", 5), users(&[11]));
    stores.inner.add_conversation(Conversation::for_team(TEAM_A));
    let engine = engine_with(&stores).await;

    engine.tick().await.unwrap();

    let records = stores.inner.assignments();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].actor_id, system_user().id);
}

#[tokio::test]
async fn empty_round_robin_team_is_skipped() {
    let stores = Arc::new(CountingStore::default());
    stores.inner.put_team(Team::round_robin(1, "A", 5), vec![]);
    let id = stores.inner.add_conversation(Conversation::for_team(TEAM_A));
    let engine = engine_with(&stores).await;

    let report = engine.run_cycle().await.unwrap();

    assert_eq!(report.skipped_empty_pool, 1);
    assert_eq!(stores.assignee(id), None);
    assert_eq!(engine.pool_sizes().await, vec![(TEAM_A, 0, 5)]);
}

// ---------------------------------------------------------------------------
// Error isolation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn failed_update_does_not_abort_cycle() {
    let stores = Arc::new(CountingStore::default());
    stores
        .inner
        .put_team(Team::round_robin(1, "A", 5), users(&[11, 12]));
    let bad = stores.inner.add_conversation(Conversation::for_team(TEAM_A));
    let good = stores.inner.add_conversation(Conversation::for_team(TEAM_A));
    stores.fail_update_for.lock().unwrap().insert(bad);
    let engine = engine_with(&stores).await;

    let report = engine.run_cycle().await.unwrap();

    assert_eq!(report.fetched, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.assigned, 1);
    assert_eq!(stores.assignee(bad), None);
    assert_eq!(stores.assignee(good), Some(UserId(12)));
}

#[tokio::test]
async fn failed_count_skips_only_that_conversation() {
    let stores = Arc::new(CountingStore::default());
    stores
        .inner
        .put_team(Team::round_robin(1, "A", 5), users(&[11, 12]));
    let first = stores.inner.add_conversation(Conversation::for_team(TEAM_A));
    let second = stores.inner.add_conversation(Conversation::for_team(TEAM_A));
    stores.fail_count_for.lock().unwrap().insert(UserId(11));
    let engine = engine_with(&stores).await;

    let report = engine.run_cycle().await.unwrap();

    assert_eq!(report.failed, 1);
    assert_eq!(stores.assignee(first), None);
    assert_eq!(stores.assignee(second), Some(UserId(12)));
}

#[tokio::test]
async fn failed_reload_keeps_previous_snapshot() {
    let stores = Arc::new(CountingStore::default());
    stores
        .inner
        .put_team(Team::round_robin(1, "A", 5), users(&[11]));
    let engine = engine_with(&stores).await;

    stores.fail_teams.store(true, Ordering::SeqCst);
    assert!(engine.reload().await.is_err());

    let id = stores.inner.add_conversation(Conversation::for_team(TEAM_A));
    engine.tick().await.unwrap();
    assert_eq!(stores.assignee(id), Some(UserId(11)));
}

#[tokio::test]
async fn construction_fails_when_teams_unavailable() {
    let stores = Arc::new(CountingStore::default());
    stores.fail_teams.store(true, Ordering::SeqCst);

    let result = Engine::new(stores.clone(), stores.clone(), system_user()).await;
    assert!(matches!(result, Err(Error::Store(_))));
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn ticks_on_interval_until_stopped() {
    let stores = Arc::new(CountingStore::default());
    stores
        .inner
        .put_team(Team::round_robin(1, "A", 100), users(&[11]));
    let engine = engine_with(&stores).await;

    engine.start(Duration::from_secs(10)).unwrap();
    assert!(engine.is_running());

    // Nothing fires before the first full interval.
    let id = stores.inner.add_conversation(Conversation::for_team(TEAM_A));
    tokio::time::sleep(Duration::from_secs(9)).await;
    assert_eq!(stores.assignee(id), None);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(stores.assignee(id), Some(UserId(11)));

    engine.stop().await;
    assert!(!engine.is_running());

    // After stop() returns the stores are never touched again.
    let calls = stores.calls();
    let late = stores.inner.add_conversation(Conversation::for_team(TEAM_A));
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(stores.calls(), calls);
    assert_eq!(stores.assignee(late), None);
}

#[tokio::test(start_paused = true)]
async fn stop_waits_for_in_flight_tick() {
    let stores = Arc::new(CountingStore::default());
    stores
        .inner
        .put_team(Team::round_robin(1, "A", 100), users(&[11]));
    let id = stores.inner.add_conversation(Conversation::for_team(TEAM_A));
    let engine = engine_with(&stores).await;
    *stores.fetch_delay.lock().unwrap() = Some(Duration::from_secs(30));

    engine.start(Duration::from_secs(10)).unwrap();

    // The tick starts at 10s and sits in the slow fetch until 40s.
    tokio::time::sleep(Duration::from_secs(15)).await;
    assert_eq!(stores.assignee(id), None);

    engine.stop().await;
    assert_eq!(stores.assignee(id), Some(UserId(11)));
}

#[tokio::test(start_paused = true)]
async fn concurrent_stop_also_waits_for_in_flight_tick() {
    let stores = Arc::new(CountingStore::default());
    stores
        .inner
        .put_team(Team::round_robin(1, "A", 100), users(&[11]));
    let id = stores.inner.add_conversation(Conversation::for_team(TEAM_A));
    let engine = engine_with(&stores).await;
    *stores.fetch_delay.lock().unwrap() = Some(Duration::from_secs(30));

    engine.start(Duration::from_secs(10)).unwrap();
    tokio::time::sleep(Duration::from_secs(15)).await;

    // The second stop() begins while the first is still joining the task.
    let ((), (assignee, calls)) = tokio::join!(engine.stop(), async {
        tokio::task::yield_now().await;
        engine.stop().await;
        (stores.assignee(id), stores.calls())
    });

    // When the second call returned the tick had already finished.
    assert_eq!(assignee, Some(UserId(11)));
    assert_eq!(calls, stores.calls());
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(calls, stores.calls());
}

#[tokio::test(start_paused = true)]
async fn manual_cycle_waits_for_loop_tick() {
    let stores = Arc::new(CountingStore::default());
    stores
        .inner
        .put_team(Team::round_robin(1, "A", 100), users(&[11, 12]));
    let id = stores.inner.add_conversation(Conversation::for_team(TEAM_A));
    let engine = engine_with(&stores).await;
    *stores.fetch_delay.lock().unwrap() = Some(Duration::from_secs(30));

    engine.start(Duration::from_secs(100)).unwrap();

    // The loop tick is inside its slow fetch from 100s to 130s.
    tokio::time::sleep(Duration::from_secs(105)).await;
    let report = engine.run_cycle().await.unwrap();

    // The manual cycle ran after the tick, so it found nothing left to do.
    assert_eq!(stores.max_fetches_in_flight(), 1);
    assert_eq!(report.fetched, 0);
    assert_eq!(stores.assignee(id), Some(UserId(11)));

    engine.stop().await;
}

#[tokio::test]
async fn manual_calls_fail_after_stop() {
    let stores = Arc::new(CountingStore::default());
    stores
        .inner
        .put_team(Team::round_robin(1, "A", 100), users(&[11]));
    let id = stores.inner.add_conversation(Conversation::for_team(TEAM_A));
    let engine = engine_with(&stores).await;

    engine.stop().await;
    let calls = stores.calls();
    assert!(matches!(engine.tick().await, Err(Error::Stopped)));
    assert!(matches!(engine.reload().await, Err(Error::Stopped)));
    assert!(matches!(engine.run_cycle().await, Err(Error::Stopped)));
    assert_eq!(stores.calls(), calls);
    assert_eq!(stores.assignee(id), None);
}

#[tokio::test]
async fn stop_is_idempotent() {
    let stores = Arc::new(CountingStore::default());
    let engine = engine_with(&stores).await;

    engine.start(Duration::from_secs(60)).unwrap();
    engine.stop().await;
    engine.stop().await;
    assert!(!engine.is_running());
}

#[tokio::test]
async fn stop_without_start_is_harmless() {
    let stores = Arc::new(CountingStore::default());
    let engine = engine_with(&stores).await;

    engine.stop().await;
    assert!(matches!(
        engine.start(Duration::from_secs(1)),
        Err(Error::Stopped)
    ));
}

#[tokio::test]
async fn start_rejects_bad_calls() {
    let stores = Arc::new(CountingStore::default());
    let engine = engine_with(&stores).await;

    assert!(matches!(
        engine.start(Duration::ZERO),
        Err(Error::InvalidInterval)
    ));
    engine.start(Duration::from_secs(60)).unwrap();
    assert!(matches!(
        engine.start(Duration::from_secs(60)),
        Err(Error::AlreadyStarted)
    ));
    engine.stop().await;
}
