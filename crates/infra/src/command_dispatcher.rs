//! Command execution pipeline (application-level orchestration).
//!
//! ```text
//! Command
//!   ↓
//! 0. Take the stream lock (tenant + aggregate)
//!   ↓
//! 1. Load events from store (tenant-scoped)
//!   ↓
//! 2. Rehydrate aggregate, check the caller's expected version
//!   ↓
//! 3. Handle command (pure decision logic, produces events)
//!   ↓
//! 4. Persist events to store (append-only, optimistic concurrency check)
//!   ↓
//! 5. Publish events to bus (projections)
//! ```
//!
//! The lock is held from step 1 through step 4, so commands against one
//! product are applied one at a time and never observe each other half-done.
//! This module contains no IO itself; it composes infrastructure traits.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use atelier_core::{Aggregate, AggregateId, DomainError, ExpectedVersion, TenantId};
use atelier_events::{EventBus, EventEnvelope};
use atelier_sizing::SizingError;

use crate::event_store::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};
use crate::locks::{LockPoisoned, StreamLocks};

#[derive(Debug, Error)]
pub enum DispatchError {
    /// Optimistic concurrency failure (stale expected version or lost append race).
    #[error("concurrent modification: {0}")]
    Concurrency(String),
    /// Tenant isolation violation (cross-tenant or cross-aggregate stream mixing).
    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),
    /// Domain validation failure (deterministic).
    #[error("validation failed: {0}")]
    Validation(String),
    /// Domain invariant failure (deterministic).
    #[error("invariant violated: {0}")]
    InvariantViolation(String),
    /// Domain-level not found.
    #[error("not found")]
    NotFound,
    /// A sizing rule rejected the command.
    #[error(transparent)]
    Sizing(SizingError),
    /// Failed to deserialize historical event payloads into the aggregate event type.
    #[error("failed to deserialize stored event: {0}")]
    Deserialize(String),
    /// Persisting to the event store failed.
    #[error(transparent)]
    Store(EventStoreError),
    /// A stream lock was poisoned by a panicking writer.
    #[error(transparent)]
    Lock(#[from] LockPoisoned),
}

impl From<EventStoreError> for DispatchError {
    fn from(value: EventStoreError) -> Self {
        match &value {
            EventStoreError::Concurrency(msg) => DispatchError::Concurrency(msg.clone()),
            EventStoreError::TenantIsolation(msg) => DispatchError::TenantIsolation(msg.clone()),
            _ => DispatchError::Store(value),
        }
    }
}

impl From<DomainError> for DispatchError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => DispatchError::Validation(msg),
            DomainError::InvariantViolation(msg) => DispatchError::InvariantViolation(msg),
            DomainError::Conflict(msg) => DispatchError::Concurrency(msg),
            DomainError::NotFound => DispatchError::NotFound,
            DomainError::InvalidId(msg) => DispatchError::Validation(msg),
        }
    }
}

impl From<SizingError> for DispatchError {
    fn from(value: SizingError) -> Self {
        match value {
            SizingError::Domain(err) => err.into(),
            other => DispatchError::Sizing(other),
        }
    }
}

/// Outcome of a successful dispatch.
///
/// `aggregate` is the state after the new events were applied, so callers can
/// answer with the post-command view without another load. When the command
/// changed nothing, `committed` and `events` are empty.
pub struct Dispatched<A: Aggregate> {
    pub committed: Vec<StoredEvent>,
    pub events: Vec<A::Event>,
    pub aggregate: A,
}

impl<A: Aggregate> Dispatched<A> {
    pub fn version(&self) -> u64 {
        self.aggregate.version()
    }

    pub fn is_noop(&self) -> bool {
        self.committed.is_empty()
    }
}

/// Reusable command execution engine for event-sourced aggregates.
///
/// - Events are persisted before publication; a failed append publishes nothing.
/// - Publication is best effort. The store is the source of truth and
///   projections can be rebuilt from it, so a bus failure is logged, not returned.
/// - Commands on the same stream are serialized by [`StreamLocks`].
#[derive(Debug)]
pub struct CommandDispatcher<S, B> {
    store: S,
    bus: B,
    locks: StreamLocks,
}

impl<S, B> CommandDispatcher<S, B> {
    pub fn new(store: S, bus: B) -> Self {
        Self {
            store,
            bus,
            locks: StreamLocks::new(),
        }
    }
}

impl<S, B> CommandDispatcher<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Rehydrate an aggregate without changing it.
    ///
    /// Reads do not take the stream lock: a load sees a committed prefix of the
    /// stream, never a half-applied command.
    pub fn load<A>(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        make_aggregate: impl FnOnce(TenantId, AggregateId) -> A,
    ) -> Result<A, DispatchError>
    where
        A: Aggregate,
        A::Event: DeserializeOwned,
    {
        let history = self.store.load_stream(tenant_id, aggregate_id)?;
        validate_loaded_stream(tenant_id, aggregate_id, &history)?;

        let mut aggregate = make_aggregate(tenant_id, aggregate_id);
        apply_history::<A>(&mut aggregate, &history)?;
        Ok(aggregate)
    }

    /// Dispatch a command through the full event-sourcing pipeline.
    ///
    /// `expected` is the caller's view of the stream version. `Any` skips the
    /// check; `Exact(v)` fails with [`DispatchError::Concurrency`] unless the
    /// stream is at `v` when the lock is taken.
    pub fn dispatch<A>(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        expected: ExpectedVersion,
        command: A::Command,
        make_aggregate: impl FnOnce(TenantId, AggregateId) -> A,
    ) -> Result<Dispatched<A>, DispatchError>
    where
        A: Aggregate,
        A::Event: atelier_events::Event + Serialize + DeserializeOwned,
        DispatchError: From<A::Error>,
    {
        let aggregate_type = aggregate_type.into();
        self.locks.with_stream(tenant_id, aggregate_id, || {
            self.dispatch_locked(
                tenant_id,
                aggregate_id,
                aggregate_type,
                expected,
                command,
                make_aggregate,
            )
        })?
    }

    fn dispatch_locked<A>(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        aggregate_type: String,
        expected: ExpectedVersion,
        command: A::Command,
        make_aggregate: impl FnOnce(TenantId, AggregateId) -> A,
    ) -> Result<Dispatched<A>, DispatchError>
    where
        A: Aggregate,
        A::Event: atelier_events::Event + Serialize + DeserializeOwned,
        DispatchError: From<A::Error>,
    {
        // 1) Load history (tenant-scoped)
        let history = self.store.load_stream(tenant_id, aggregate_id)?;
        validate_loaded_stream(tenant_id, aggregate_id, &history)?;
        let current = stream_version(&history);

        // 2) Rehydrate aggregate
        let mut aggregate = make_aggregate(tenant_id, aggregate_id);
        apply_history::<A>(&mut aggregate, &history)?;
        expected.check(current)?;

        // 3) Decide events (no mutation)
        let decided = aggregate.handle(&command)?;
        if decided.is_empty() {
            debug!(%tenant_id, %aggregate_id, version = current, "command changed nothing");
            return Ok(Dispatched {
                committed: vec![],
                events: vec![],
                aggregate,
            });
        }

        // 4) Persist (append-only, optimistic)
        let uncommitted = decided
            .iter()
            .map(|ev| {
                UncommittedEvent::from_typed(
                    tenant_id,
                    aggregate_id,
                    aggregate_type.clone(),
                    Uuid::now_v7(),
                    ev,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        let committed = self.store.append(uncommitted, ExpectedVersion::Exact(current))?;
        for ev in &decided {
            aggregate.apply(ev);
        }

        // 5) Publish committed events (after append)
        for stored in &committed {
            if let Err(err) = self.bus.publish(stored.to_envelope()) {
                warn!(
                    %tenant_id,
                    %aggregate_id,
                    sequence_number = stored.sequence_number,
                    error = ?err,
                    "event committed but not published"
                );
            }
        }

        Ok(Dispatched {
            committed,
            events: decided,
            aggregate,
        })
    }
}

fn stream_version(stream: &[StoredEvent]) -> u64 {
    stream.last().map_or(0, StoredEvent::stream_version)
}

fn validate_loaded_stream(
    tenant_id: TenantId,
    aggregate_id: AggregateId,
    stream: &[StoredEvent],
) -> Result<(), DispatchError> {
    // Enforce tenant isolation even if a buggy backend returns cross-tenant data.
    let mut last = 0u64;
    for (idx, e) in stream.iter().enumerate() {
        if e.tenant_id != tenant_id {
            return Err(DispatchError::TenantIsolation(format!(
                "loaded stream contains wrong tenant_id at index {idx}"
            )));
        }
        if e.aggregate_id != aggregate_id {
            return Err(DispatchError::TenantIsolation(format!(
                "loaded stream contains wrong aggregate_id at index {idx}"
            )));
        }
        if e.sequence_number <= last {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(format!(
                "non-monotonic sequence_number in loaded stream (last={last}, found={})",
                e.sequence_number
            ))));
        }
        last = e.sequence_number;
    }
    Ok(())
}

fn apply_history<A>(aggregate: &mut A, history: &[StoredEvent]) -> Result<(), DispatchError>
where
    A: Aggregate,
    A::Event: DeserializeOwned,
{
    for stored in history {
        let ev: A::Event = stored.decode().map_err(|e| {
            DispatchError::Deserialize(format!(
                "{} #{}: {e}",
                stored.event_type, stored.sequence_number
            ))
        })?;
        aggregate.apply(&ev);
    }

    Ok(())
}
