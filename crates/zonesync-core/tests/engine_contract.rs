// Engine contract tests with a scripted provider double.
//
// These exercise the state-resolution rules end to end: validation happens
// before any provider call, the local store only ever reflects confirmed
// outcomes, ambiguity lands in `Conflicted`, and mutations for one identity
// are serialized.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use zonesync_core::error::ProviderError;
use zonesync_core::record::{
    DnsRecord, ProposedFields, RecordKey, RecordType, StoredRecord, SyncState,
};
use zonesync_core::traits::{Ack, ProviderClient, RecordStore};
use zonesync_core::{EngineConfig, Error, MemoryRecordStore, Outcome, ReconciliationEngine};

/// Provider double with scripted responses and call accounting.
///
/// Mutation responses are consumed in order; once the script is empty every
/// call succeeds with `Ack::Committed`. Each call holds an in-flight gauge
/// across a short sleep so overlap between concurrent calls is observable.
#[derive(Default)]
struct ScriptedProvider {
    mutation_script: StdMutex<VecDeque<Result<Ack, ProviderError>>>,
    fetch_script: StdMutex<VecDeque<Result<Option<DnsRecord>, ProviderError>>>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    call_delay: Option<Duration>,
}

impl ScriptedProvider {
    fn new() -> Self {
        Self::default()
    }

    fn with_call_delay(delay: Duration) -> Self {
        Self {
            call_delay: Some(delay),
            ..Self::default()
        }
    }

    fn script_mutations(&self, responses: Vec<Result<Ack, ProviderError>>) {
        self.mutation_script.lock().unwrap().extend(responses);
    }

    fn script_fetches(&self, responses: Vec<Result<Option<DnsRecord>, ProviderError>>) {
        self.fetch_script.lock().unwrap().extend(responses);
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn max_overlap(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn mutate(&self) -> Result<Ack, ProviderError> {
        self.enter().await;
        let response = self
            .mutation_script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(Ack::Committed));
        self.leave();
        response
    }

    async fn enter(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.call_delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn leave(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ProviderClient for ScriptedProvider {
    async fn create_record(&self, _record: &DnsRecord) -> Result<Ack, ProviderError> {
        self.mutate().await
    }

    async fn update_record(
        &self,
        _key: &RecordKey,
        _record: &DnsRecord,
    ) -> Result<Ack, ProviderError> {
        self.mutate().await
    }

    async fn delete_record(&self, _key: &RecordKey) -> Result<Ack, ProviderError> {
        self.mutate().await
    }

    async fn fetch_record(&self, _key: &RecordKey) -> Result<Option<DnsRecord>, ProviderError> {
        self.enter().await;
        let response = self
            .fetch_script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(None));
        self.leave();
        response
    }

    fn provider_name(&self) -> &'static str {
        "scripted"
    }
}

fn www_a(data: &str) -> DnsRecord {
    DnsRecord {
        name: "www".to_string(),
        kind: RecordType::A,
        data: data.to_string(),
        ttl: 3600,
        priority: None,
    }
}

fn fast_policy() -> EngineConfig {
    EngineConfig {
        retry_base_ms: 1,
        ..Default::default()
    }
}

struct Harness {
    provider: Arc<ScriptedProvider>,
    store: Arc<MemoryRecordStore>,
    engine: Arc<ReconciliationEngine>,
}

fn harness(provider: ScriptedProvider, policy: EngineConfig) -> Harness {
    let provider = Arc::new(provider);
    let store = Arc::new(MemoryRecordStore::new());
    let (engine, _events) =
        ReconciliationEngine::new(provider.clone(), store.clone(), policy).unwrap();
    Harness {
        provider,
        store,
        engine: Arc::new(engine),
    }
}

async fn seed_synced(store: &MemoryRecordStore, record: DnsRecord) -> RecordKey {
    let key = record.key();
    store.put(&key, &StoredRecord::synced(record)).await.unwrap();
    key
}

#[tokio::test]
async fn validation_failure_makes_no_provider_call() {
    let h = harness(ScriptedProvider::new(), fast_policy());
    let key = seed_synced(&h.store, www_a("192.0.2.1")).await;

    let fields = ProposedFields {
        ttl: Some(30), // below the allowed minimum
        ..Default::default()
    };
    let outcome = h.engine.update(&key, fields).await.unwrap();

    assert!(matches!(outcome, Outcome::ValidationFailed(_)));
    assert_eq!(h.provider.call_count(), 0);

    let stored = h.store.get(&key).await.unwrap().unwrap();
    assert_eq!(stored.state, SyncState::Synced);
    assert_eq!(stored.record.ttl, 3600);
}

#[tokio::test]
async fn confirmed_update_applies_merged_fields() {
    let h = harness(ScriptedProvider::new(), fast_policy());
    let key = seed_synced(&h.store, www_a("192.0.2.1")).await;

    let fields = ProposedFields {
        data: Some("198.51.100.7".to_string()),
        ..Default::default()
    };
    let outcome = h.engine.update(&key, fields).await.unwrap();

    assert_eq!(outcome, Outcome::Success);
    assert_eq!(h.provider.call_count(), 1);

    let stored = h.store.get(&key).await.unwrap().unwrap();
    assert_eq!(stored.state, SyncState::Synced);
    assert_eq!(stored.record.data, "198.51.100.7");
    assert_eq!(stored.record.ttl, 3600); // unproposed field carried over
}

#[tokio::test]
async fn update_of_unknown_identity_is_an_error() {
    let h = harness(ScriptedProvider::new(), fast_policy());
    let key = RecordKey::new("nothere", RecordType::A);

    let result = h.engine.update(&key, ProposedFields::default()).await;
    assert!(matches!(result, Err(Error::NoLocalRecord(_))));
    assert_eq!(h.provider.call_count(), 0);
}

#[tokio::test]
async fn provider_rejection_surfaces_reason_verbatim() {
    let provider = ScriptedProvider::new();
    provider.script_mutations(vec![Err(ProviderError::Rejected(
        "Only TTL between 600 and 86400 is allowed".to_string(),
    ))]);
    let h = harness(provider, fast_policy());
    let key = seed_synced(&h.store, www_a("192.0.2.1")).await;

    let fields = ProposedFields {
        data: Some("198.51.100.7".to_string()),
        ..Default::default()
    };
    let outcome = h.engine.update(&key, fields).await.unwrap();

    match outcome {
        Outcome::ProviderRejected(ProviderError::Rejected(msg)) => {
            assert_eq!(msg, "Only TTL between 600 and 86400 is allowed");
        }
        other => panic!("expected verbatim rejection, got {other:?}"),
    }

    // Definite refusal leaves the confirmed record untouched
    let stored = h.store.get(&key).await.unwrap().unwrap();
    assert_eq!(stored.state, SyncState::Synced);
    assert_eq!(stored.record.data, "192.0.2.1");
    assert_eq!(h.provider.call_count(), 1); // no retry on definite refusal
}

#[tokio::test]
async fn timeout_exhaustion_marks_conflicted_after_bounded_retries() {
    let provider = ScriptedProvider::new();
    provider.script_mutations(vec![
        Err(ProviderError::Timeout("t1".to_string())),
        Err(ProviderError::Timeout("t2".to_string())),
        Err(ProviderError::Timeout("t3".to_string())),
        Err(ProviderError::Timeout("t4".to_string())),
    ]);
    let policy = EngineConfig {
        max_retries: 3,
        retry_base_ms: 1,
        ..Default::default()
    };
    let h = harness(provider, policy);
    let key = seed_synced(&h.store, www_a("192.0.2.1")).await;

    let fields = ProposedFields {
        data: Some("198.51.100.7".to_string()),
        ..Default::default()
    };
    let outcome = h.engine.update(&key, fields).await.unwrap();

    assert_eq!(outcome, Outcome::Conflicted);
    // Exactly max_retries + 1 calls, never unbounded
    assert_eq!(h.provider.call_count(), 4);

    // Conflicted keeps the last confirmed fields, not the proposed ones
    let stored = h.store.get(&key).await.unwrap().unwrap();
    assert_eq!(stored.state, SyncState::Conflicted);
    assert_eq!(stored.record.data, "192.0.2.1");
}

#[tokio::test]
async fn transient_failure_then_success_retries_through() {
    let provider = ScriptedProvider::new();
    provider.script_mutations(vec![
        Err(ProviderError::RateLimited("slow down".to_string())),
        Ok(Ack::Committed),
    ]);
    let h = harness(provider, fast_policy());
    let key = seed_synced(&h.store, www_a("192.0.2.1")).await;

    let fields = ProposedFields {
        data: Some("198.51.100.7".to_string()),
        ..Default::default()
    };
    let outcome = h.engine.update(&key, fields).await.unwrap();

    assert_eq!(outcome, Outcome::Success);
    assert_eq!(h.provider.call_count(), 2);
    let stored = h.store.get(&key).await.unwrap().unwrap();
    assert_eq!(stored.record.data, "198.51.100.7");
}

#[tokio::test]
async fn queued_ack_is_never_success() {
    let provider = ScriptedProvider::new();
    provider.script_mutations(vec![Ok(Ack::Queued)]);
    let h = harness(provider, fast_policy());
    let key = seed_synced(&h.store, www_a("192.0.2.1")).await;

    let fields = ProposedFields {
        data: Some("198.51.100.7".to_string()),
        ..Default::default()
    };
    let outcome = h.engine.update(&key, fields).await.unwrap();

    assert_eq!(outcome, Outcome::Conflicted);
    let stored = h.store.get(&key).await.unwrap().unwrap();
    assert_eq!(stored.state, SyncState::Conflicted);
    assert_eq!(stored.record.data, "192.0.2.1");
}

#[tokio::test]
async fn conflicted_record_refuses_further_mutations() {
    let h = harness(ScriptedProvider::new(), fast_policy());
    let record = www_a("192.0.2.1");
    let key = record.key();
    h.store
        .put(
            &key,
            &StoredRecord::synced(record).with_state(SyncState::Conflicted),
        )
        .await
        .unwrap();

    let fields = ProposedFields {
        data: Some("198.51.100.7".to_string()),
        ..Default::default()
    };
    assert_eq!(h.engine.update(&key, fields).await.unwrap(), Outcome::Conflicted);
    assert_eq!(h.engine.delete(&key).await.unwrap(), Outcome::Conflicted);

    // Refusal happens before any network call
    assert_eq!(h.provider.call_count(), 0);
}

#[tokio::test]
async fn delete_of_locally_absent_identity_is_idempotent_success() {
    let h = harness(ScriptedProvider::new(), fast_policy());
    let key = RecordKey::new("ghost", RecordType::A);

    assert_eq!(h.engine.delete(&key).await.unwrap(), Outcome::Success);
    assert_eq!(h.provider.call_count(), 0);
}

#[tokio::test]
async fn delete_treats_provider_absence_as_success() {
    let provider = ScriptedProvider::new();
    provider.script_mutations(vec![Err(ProviderError::NotFound("no such record".to_string()))]);
    let h = harness(provider, fast_policy());
    let key = seed_synced(&h.store, www_a("192.0.2.1")).await;

    assert_eq!(h.engine.delete(&key).await.unwrap(), Outcome::Success);
    assert!(h.store.get(&key).await.unwrap().is_none());
}

#[tokio::test]
async fn delete_exhaustion_never_removes_local_record() {
    let provider = ScriptedProvider::new();
    provider.script_mutations(vec![
        Err(ProviderError::Timeout("t".to_string())),
        Err(ProviderError::Timeout("t".to_string())),
        Err(ProviderError::Timeout("t".to_string())),
        Err(ProviderError::Timeout("t".to_string())),
    ]);
    let h = harness(provider, fast_policy());
    let key = seed_synced(&h.store, www_a("192.0.2.1")).await;

    assert_eq!(h.engine.delete(&key).await.unwrap(), Outcome::Conflicted);

    let stored = h.store.get(&key).await.unwrap().unwrap();
    assert_eq!(stored.state, SyncState::Conflicted);
    assert_eq!(stored.record.data, "192.0.2.1");
}

#[tokio::test]
async fn create_writes_nothing_on_rejection() {
    let provider = ScriptedProvider::new();
    provider.script_mutations(vec![Err(ProviderError::Rejected(
        "DUPLICATE_RECORD".to_string(),
    ))]);
    let h = harness(provider, fast_policy());

    let outcome = h.engine.create(www_a("192.0.2.1")).await.unwrap();
    assert!(matches!(outcome, Outcome::ProviderRejected(_)));
    assert!(h.store.get(&RecordKey::new("www", RecordType::A)).await.unwrap().is_none());
}

#[tokio::test]
async fn create_inserts_synced_record_on_confirmation() {
    let h = harness(ScriptedProvider::new(), fast_policy());

    let outcome = h.engine.create(www_a("192.0.2.1")).await.unwrap();
    assert_eq!(outcome, Outcome::Success);

    let key = RecordKey::new("www", RecordType::A);
    let stored = h.store.get(&key).await.unwrap().unwrap();
    assert_eq!(stored.state, SyncState::Synced);
    assert_eq!(stored.record.data, "192.0.2.1");
}

#[tokio::test]
async fn create_of_existing_identity_rejected_locally() {
    let h = harness(ScriptedProvider::new(), fast_policy());
    seed_synced(&h.store, www_a("192.0.2.1")).await;

    let outcome = h.engine.create(www_a("198.51.100.7")).await.unwrap();
    assert!(matches!(outcome, Outcome::ProviderRejected(_)));
    assert_eq!(h.provider.call_count(), 0);
}

#[tokio::test]
async fn reconcile_adopts_provider_record() {
    let provider = ScriptedProvider::new();
    provider.script_fetches(vec![Ok(Some(www_a("203.0.113.9")))]);
    let h = harness(provider, fast_policy());

    let record = www_a("192.0.2.1");
    let key = record.key();
    h.store
        .put(
            &key,
            &StoredRecord::synced(record).with_state(SyncState::Conflicted),
        )
        .await
        .unwrap();

    assert_eq!(h.engine.reconcile(&key).await.unwrap(), Outcome::Success);

    let stored = h.store.get(&key).await.unwrap().unwrap();
    assert_eq!(stored.state, SyncState::Synced);
    assert_eq!(stored.record.data, "203.0.113.9");
}

#[tokio::test]
async fn reconcile_removes_record_absent_at_provider() {
    let provider = ScriptedProvider::new();
    provider.script_fetches(vec![Ok(None)]);
    let h = harness(provider, fast_policy());
    let key = seed_synced(&h.store, www_a("192.0.2.1")).await;

    assert_eq!(h.engine.reconcile(&key).await.unwrap(), Outcome::Success);
    assert!(h.store.get(&key).await.unwrap().is_none());
}

#[tokio::test]
async fn reconcile_read_failure_leaves_state_standing() {
    let provider = ScriptedProvider::new();
    provider.script_fetches(vec![Err(ProviderError::AuthFailure("bad key".to_string()))]);
    let h = harness(provider, fast_policy());

    let record = www_a("192.0.2.1");
    let key = record.key();
    h.store
        .put(
            &key,
            &StoredRecord::synced(record).with_state(SyncState::Conflicted),
        )
        .await
        .unwrap();

    let outcome = h.engine.reconcile(&key).await.unwrap();
    assert!(matches!(outcome, Outcome::ProviderRejected(_)));

    let stored = h.store.get(&key).await.unwrap().unwrap();
    assert_eq!(stored.state, SyncState::Conflicted);
}

#[tokio::test]
async fn same_identity_mutations_are_serialized() {
    let h = harness(
        ScriptedProvider::with_call_delay(Duration::from_millis(30)),
        fast_policy(),
    );
    let key = seed_synced(&h.store, www_a("192.0.2.1")).await;

    let mut handles = Vec::new();
    for i in 0..4 {
        let engine = h.engine.clone();
        let key = key.clone();
        handles.push(tokio::spawn(async move {
            let fields = ProposedFields {
                data: Some(format!("198.51.100.{i}")),
                ..Default::default()
            };
            engine.update(&key, fields).await
        }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), Outcome::Success);
    }

    assert_eq!(h.provider.call_count(), 4);
    assert_eq!(h.provider.max_overlap(), 1, "same-identity calls overlapped");
}

#[tokio::test]
async fn different_identities_proceed_in_parallel() {
    let h = harness(
        ScriptedProvider::with_call_delay(Duration::from_millis(100)),
        fast_policy(),
    );
    let key_a = seed_synced(&h.store, www_a("192.0.2.1")).await;
    let key_b = seed_synced(
        &h.store,
        DnsRecord {
            name: "api".to_string(),
            kind: RecordType::A,
            data: "192.0.2.2".to_string(),
            ttl: 3600,
            priority: None,
        },
    )
    .await;

    let e1 = h.engine.clone();
    let e2 = h.engine.clone();
    let t1 = tokio::spawn(async move {
        e1.update(
            &key_a,
            ProposedFields {
                data: Some("198.51.100.1".to_string()),
                ..Default::default()
            },
        )
        .await
    });
    let t2 = tokio::spawn(async move {
        e2.update(
            &key_b,
            ProposedFields {
                data: Some("198.51.100.2".to_string()),
                ..Default::default()
            },
        )
        .await
    });

    assert_eq!(t1.await.unwrap().unwrap(), Outcome::Success);
    assert_eq!(t2.await.unwrap().unwrap(), Outcome::Success);
    assert_eq!(h.provider.max_overlap(), 2, "distinct identities should not block each other");
}

#[tokio::test]
async fn cancelled_caller_does_not_orphan_the_outcome() {
    let h = harness(
        ScriptedProvider::with_call_delay(Duration::from_millis(100)),
        fast_policy(),
    );
    let key = seed_synced(&h.store, www_a("192.0.2.1")).await;

    let engine = h.engine.clone();
    let caller_key = key.clone();
    let caller = tokio::spawn(async move {
        engine
            .update(
                &caller_key,
                ProposedFields {
                    data: Some("198.51.100.7".to_string()),
                    ..Default::default()
                },
            )
            .await
    });

    // Let the mutation dispatch, then drop the caller mid-flight
    tokio::time::sleep(Duration::from_millis(30)).await;
    caller.abort();
    let _ = caller.await;

    // The in-flight call still resolves and its outcome is applied
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(h.provider.call_count(), 1);
    let stored = h.store.get(&key).await.unwrap().unwrap();
    assert_eq!(stored.state, SyncState::Synced);
    assert_eq!(stored.record.data, "198.51.100.7");
}

#[tokio::test]
async fn events_report_the_mutation_lifecycle() {
    let provider = Arc::new(ScriptedProvider::new());
    let store = Arc::new(MemoryRecordStore::new());
    let (engine, mut events) =
        ReconciliationEngine::new(provider, store.clone(), fast_policy()).unwrap();
    let key = seed_synced(&store, www_a("192.0.2.1")).await;

    engine
        .update(
            &key,
            ProposedFields {
                data: Some("198.51.100.7".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    use zonesync_core::EngineEvent;
    assert_eq!(
        events.recv().await,
        Some(EngineEvent::MutationStarted { key: key.clone() })
    );
    assert_eq!(events.recv().await, Some(EngineEvent::UpdateApplied { key }));
}
