//! Reconciliation engine
//!
//! The ReconciliationEngine takes an operator-requested mutation, validates
//! it, calls the provider, and resolves the local record's state from the
//! provider's response. The local store only ever reflects state the
//! provider has confirmed.
//!
//! ## Architecture
//!
//! ```text
//! Presentation ──update/delete──▶ ┌──────────────────────┐
//!                                 │ ReconciliationEngine │
//!                                 └──────────────────────┘
//!                                      │            │
//!                 validate ─▶ call ────┘            │
//!                      ▼                            ▼
//!               ┌──────────────┐            ┌─────────────┐
//!               │ProviderClient│            │ RecordStore │
//!               │  (mutate)    │            │  (resolve)  │
//!               └──────────────┘            └─────────────┘
//! ```
//!
//! ## Ownership rules
//!
//! - Retry/backoff policy lives here, never in provider clients
//! - All record-store writes happen here, after a provider outcome is known
//! - Mutations for one `(name, type)` identity are serialized; different
//!   identities proceed fully in parallel
//!
//! ## Cancellation
//!
//! The provider call and the state resolution that follows it run on a
//! detached task. A caller that cancels before dispatch aborts cleanly with
//! no state change; a caller that vanishes while a call is in flight does
//! not prevent the outcome from being applied to the store.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::{Error, ProviderError, ValidationError};
use crate::record::{DnsRecord, ProposedFields, RecordKey, StoredRecord, SyncState};
use crate::traits::{Ack, ProviderClient, RecordStore};
use crate::validate;

/// Outcome of a reconciliation operation, as surfaced to the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The provider confirmed the mutation and the local store reflects it
    Success,

    /// The proposed record failed local validation; no network call was
    /// made and no state changed
    ValidationFailed(ValidationError),

    /// The provider definitively refused the mutation; the local record is
    /// untouched and the provider's reason is carried verbatim
    ProviderRejected(ProviderError),

    /// The mutation's true effect at the provider is unknown. The record
    /// is marked `Conflicted` and must be resolved by an explicit
    /// reconciliation read, not by blind retries.
    Conflicted,
}

/// Events emitted by the ReconciliationEngine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// A mutation passed validation and is being dispatched
    MutationStarted { key: RecordKey },

    /// An update was confirmed and applied locally
    UpdateApplied { key: RecordKey },

    /// A record was created at the provider and inserted locally
    RecordCreated { key: RecordKey },

    /// A record was removed locally after provider confirmation (or
    /// provider-side absence)
    RecordDeleted { key: RecordKey },

    /// The provider refused a mutation; local state is unchanged
    ProviderRefused { key: RecordKey, reason: String },

    /// A record was marked `Conflicted`
    MarkedConflicted { key: RecordKey },

    /// A reconciliation read resolved a record against provider state
    Reconciled { key: RecordKey, present: bool },
}

/// Core reconciliation engine
///
/// Holds no persistent state itself: it is given the current stored record,
/// computes the next state from the provider's response, and hands it back
/// to the store.
pub struct ReconciliationEngine {
    ctx: EngineCtx,

    /// Single-flight guards, one per record identity.
    ///
    /// Entries are never removed; the map is bounded by the number of
    /// identities this process has mutated.
    locks: StdMutex<HashMap<RecordKey, Arc<tokio::sync::Mutex<()>>>>,
}

/// The engine state a detached mutation task needs
#[derive(Clone)]
struct EngineCtx {
    provider: Arc<dyn ProviderClient>,
    store: Arc<dyn RecordStore>,
    policy: EngineConfig,
    event_tx: mpsc::Sender<EngineEvent>,
}

impl ReconciliationEngine {
    /// Create a new engine
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields
    /// engine events for external observation.
    pub fn new(
        provider: Arc<dyn ProviderClient>,
        store: Arc<dyn RecordStore>,
        policy: EngineConfig,
    ) -> Result<(Self, mpsc::Receiver<EngineEvent>), Error> {
        policy.validate()?;

        let (tx, rx) = mpsc::channel(policy.event_channel_capacity);

        let engine = Self {
            ctx: EngineCtx {
                provider,
                store,
                policy,
                event_tx: tx,
            },
            locks: StdMutex::new(HashMap::new()),
        };

        Ok((engine, rx))
    }

    /// Update the record at `key` with the proposed field values.
    ///
    /// The existing record's fields are overridden by any field present in
    /// `fields` and the full merged record is sent to the provider.
    /// Validation failures return before any network call with no state
    /// change.
    pub async fn update(&self, key: &RecordKey, fields: ProposedFields) -> Result<Outcome, Error> {
        let guard = self.acquire(key).await;

        let existing = self
            .ctx
            .store
            .get(key)
            .await?
            .ok_or_else(|| Error::no_local_record(key.to_string()))?;

        if existing.state != SyncState::Synced {
            warn!(%key, state = ?existing.state, "refusing update of unsettled record");
            return Ok(Outcome::Conflicted);
        }

        let merged = existing.record.merged_with(&fields);
        if let Err(e) = validate::validate(&merged) {
            debug!(%key, error = %e, "update rejected by validation");
            return Ok(Outcome::ValidationFailed(e));
        }

        self.ctx
            .emit(EngineEvent::MutationStarted { key: key.clone() });

        let ctx = self.ctx.clone();
        let key = key.clone();
        let handle = tokio::spawn(async move {
            let _guard = guard;
            ctx.drive_update(key, existing, merged).await
        });

        handle
            .await
            .map_err(|e| Error::engine(format!("update task failed: {e}")))?
    }

    /// Delete the record at `key`.
    ///
    /// Deleting an identity that is absent locally, or that the provider
    /// reports absent, is idempotent success.
    pub async fn delete(&self, key: &RecordKey) -> Result<Outcome, Error> {
        let guard = self.acquire(key).await;

        let existing = match self.ctx.store.get(key).await? {
            Some(existing) => existing,
            None => {
                debug!(%key, "delete of locally absent record is a no-op");
                return Ok(Outcome::Success);
            }
        };

        if existing.state != SyncState::Synced {
            warn!(%key, state = ?existing.state, "refusing delete of unsettled record");
            return Ok(Outcome::Conflicted);
        }

        self.ctx
            .emit(EngineEvent::MutationStarted { key: key.clone() });

        let ctx = self.ctx.clone();
        let key = key.clone();
        let handle = tokio::spawn(async move {
            let _guard = guard;
            ctx.drive_delete(key, existing).await
        });

        handle
            .await
            .map_err(|e| Error::engine(format!("delete task failed: {e}")))?
    }

    /// Create a new record.
    ///
    /// Structurally identical to update, except nothing is written locally
    /// until the provider confirms the record exists.
    pub async fn create(&self, record: DnsRecord) -> Result<Outcome, Error> {
        if let Err(e) = validate::validate(&record) {
            debug!(key = %record.key(), error = %e, "create rejected by validation");
            return Ok(Outcome::ValidationFailed(e));
        }

        let key = record.key();
        let guard = self.acquire(&key).await;

        if self.ctx.store.get(&key).await?.is_some() {
            return Ok(Outcome::ProviderRejected(ProviderError::Rejected(
                "A DNS record with the same name and type already exists.".to_string(),
            )));
        }

        self.ctx
            .emit(EngineEvent::MutationStarted { key: key.clone() });

        let ctx = self.ctx.clone();
        let handle = tokio::spawn(async move {
            let _guard = guard;
            ctx.drive_create(key, record).await
        });

        handle
            .await
            .map_err(|e| Error::engine(format!("create task failed: {e}")))?
    }

    /// Resolve a record against authoritative provider state.
    ///
    /// This is the only path out of `Conflicted`: the provider's current
    /// record (or absence) overwrites the local entry wholesale.
    pub async fn reconcile(&self, key: &RecordKey) -> Result<Outcome, Error> {
        let guard = self.acquire(key).await;

        let ctx = self.ctx.clone();
        let key = key.clone();
        let handle = tokio::spawn(async move {
            let _guard = guard;
            ctx.drive_reconcile(key).await
        });

        handle
            .await
            .map_err(|e| Error::engine(format!("reconcile task failed: {e}")))?
    }

    /// Acquire the single-flight guard for an identity.
    ///
    /// Returns an owned guard so it can move into the detached task.
    async fn acquire(&self, key: &RecordKey) -> tokio::sync::OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().expect("lock map poisoned");
            Arc::clone(
                locks
                    .entry(key.clone())
                    .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
            )
        };
        lock.lock_owned().await
    }
}

impl EngineCtx {
    /// Drive a validated update to resolution
    async fn drive_update(
        self,
        key: RecordKey,
        existing: StoredRecord,
        merged: DnsRecord,
    ) -> Result<Outcome, Error> {
        // In-flight marker; the stored fields stay the confirmed ones
        self.store
            .put(&key, &existing.with_state(SyncState::PendingUpdate))
            .await?;

        let mut attempt = 0;
        loop {
            match self.provider.update_record(&key, &merged).await {
                Ok(Ack::Committed) => {
                    info!(%key, "update confirmed by provider");
                    self.store.put(&key, &StoredRecord::synced(merged)).await?;
                    self.emit(EngineEvent::UpdateApplied { key });
                    return Ok(Outcome::Success);
                }
                Ok(Ack::Queued) => {
                    warn!(%key, "provider queued the update; true state unknown");
                    return self.mark_conflicted(key, &existing).await;
                }
                Err(e) if e.is_retryable() && attempt < self.policy.max_retries => {
                    warn!(%key, attempt, error = %e, "update attempt failed, retrying");
                    tokio::time::sleep(self.policy.retry_delay(attempt)).await;
                    attempt += 1;
                }
                Err(e) if e.is_retryable() => {
                    warn!(%key, error = %e, "retry budget exhausted; true state unknown");
                    return self.mark_conflicted(key, &existing).await;
                }
                Err(e) => {
                    // Definite refusal: restore the untouched record and
                    // surface the provider's reason verbatim
                    self.store.put(&key, &existing).await?;
                    info!(%key, error = %e, "update refused by provider");
                    self.emit(EngineEvent::ProviderRefused {
                        key,
                        reason: e.to_string(),
                    });
                    return Ok(Outcome::ProviderRejected(e));
                }
            }
        }
    }

    /// Drive a delete to resolution
    async fn drive_delete(self, key: RecordKey, existing: StoredRecord) -> Result<Outcome, Error> {
        self.store
            .put(&key, &existing.with_state(SyncState::PendingDelete))
            .await?;

        let mut attempt = 0;
        loop {
            match self.provider.delete_record(&key).await {
                Ok(Ack::Committed) => {
                    info!(%key, "delete confirmed by provider");
                    self.store.delete(&key).await?;
                    self.emit(EngineEvent::RecordDeleted { key });
                    return Ok(Outcome::Success);
                }
                Ok(Ack::Queued) => {
                    warn!(%key, "provider queued the delete; true state unknown");
                    return self.mark_conflicted(key, &existing).await;
                }
                Err(ProviderError::NotFound(_)) => {
                    // Already gone at the provider: idempotent success
                    debug!(%key, "record already absent at provider");
                    self.store.delete(&key).await?;
                    self.emit(EngineEvent::RecordDeleted { key });
                    return Ok(Outcome::Success);
                }
                Err(e) if e.is_retryable() && attempt < self.policy.max_retries => {
                    warn!(%key, attempt, error = %e, "delete attempt failed, retrying");
                    tokio::time::sleep(self.policy.retry_delay(attempt)).await;
                    attempt += 1;
                }
                Err(e) if e.is_retryable() => {
                    // Deleting locally without provider confirmation would
                    // desynchronize state irrecoverably
                    warn!(%key, error = %e, "retry budget exhausted; true state unknown");
                    return self.mark_conflicted(key, &existing).await;
                }
                Err(e) => {
                    self.store.put(&key, &existing).await?;
                    info!(%key, error = %e, "delete refused by provider");
                    self.emit(EngineEvent::ProviderRefused {
                        key,
                        reason: e.to_string(),
                    });
                    return Ok(Outcome::ProviderRejected(e));
                }
            }
        }
    }

    /// Drive a create to resolution
    ///
    /// Nothing exists locally yet, so there is no pending marker to stamp;
    /// the store stays untouched until the provider responds.
    async fn drive_create(self, key: RecordKey, record: DnsRecord) -> Result<Outcome, Error> {
        let mut attempt = 0;
        loop {
            match self.provider.create_record(&record).await {
                Ok(Ack::Committed) => {
                    info!(%key, "create confirmed by provider");
                    self.store.put(&key, &StoredRecord::synced(record)).await?;
                    self.emit(EngineEvent::RecordCreated { key });
                    return Ok(Outcome::Success);
                }
                Ok(Ack::Queued) => {
                    warn!(%key, "provider queued the create; true state unknown");
                    let marker = StoredRecord::synced(record).with_state(SyncState::Conflicted);
                    self.store.put(&key, &marker).await?;
                    self.emit(EngineEvent::MarkedConflicted { key });
                    return Ok(Outcome::Conflicted);
                }
                Err(e) if e.is_retryable() && attempt < self.policy.max_retries => {
                    warn!(%key, attempt, error = %e, "create attempt failed, retrying");
                    tokio::time::sleep(self.policy.retry_delay(attempt)).await;
                    attempt += 1;
                }
                Err(e) if e.is_retryable() => {
                    warn!(%key, error = %e, "retry budget exhausted; true state unknown");
                    let marker = StoredRecord::synced(record).with_state(SyncState::Conflicted);
                    self.store.put(&key, &marker).await?;
                    self.emit(EngineEvent::MarkedConflicted { key });
                    return Ok(Outcome::Conflicted);
                }
                Err(e) => {
                    info!(%key, error = %e, "create refused by provider");
                    self.emit(EngineEvent::ProviderRefused {
                        key,
                        reason: e.to_string(),
                    });
                    return Ok(Outcome::ProviderRejected(e));
                }
            }
        }
    }

    /// Drive a reconciliation read to resolution
    async fn drive_reconcile(self, key: RecordKey) -> Result<Outcome, Error> {
        let mut attempt = 0;
        loop {
            match self.provider.fetch_record(&key).await {
                Ok(Some(record)) => {
                    info!(%key, "reconciled against provider record");
                    self.store.put(&key, &StoredRecord::synced(record)).await?;
                    self.emit(EngineEvent::Reconciled { key, present: true });
                    return Ok(Outcome::Success);
                }
                Ok(None) => {
                    info!(%key, "record absent at provider, removing locally");
                    self.store.delete(&key).await?;
                    self.emit(EngineEvent::Reconciled {
                        key,
                        present: false,
                    });
                    return Ok(Outcome::Success);
                }
                Err(e) if e.is_retryable() && attempt < self.policy.max_retries => {
                    warn!(%key, attempt, error = %e, "reconcile read failed, retrying");
                    tokio::time::sleep(self.policy.retry_delay(attempt)).await;
                    attempt += 1;
                }
                Err(e) => {
                    // Reads don't change anything; local state stands
                    warn!(%key, error = %e, "reconcile read failed");
                    return Ok(Outcome::ProviderRejected(e));
                }
            }
        }
    }

    /// Mark a record `Conflicted`, keeping its last confirmed fields
    async fn mark_conflicted(&self, key: RecordKey, existing: &StoredRecord) -> Result<Outcome, Error> {
        self.store
            .put(&key, &existing.with_state(SyncState::Conflicted))
            .await?;
        self.emit(EngineEvent::MarkedConflicted { key });
        Ok(Outcome::Conflicted)
    }

    /// Emit an engine event, dropping it if the channel is full
    fn emit(&self, event: EngineEvent) {
        if self.event_tx.try_send(event).is_err() {
            warn!("event channel full, dropping event");
        }
    }
}
