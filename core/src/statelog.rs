//! The workflow state machine engine.
//!
//! RULES:
//!   - state_log is append-only; rows are never updated or deleted.
//!   - A row chains (prev_state_log_id) only within the same associated
//!     entity and the same flow. Different flows for one entity never
//!     chain to each other.
//!   - latest_state_log holds at most one pointer per (entity, flow);
//!     an ambiguous lookup is a hard error, never a guess.

use chrono::{DateTime, Utc};

use crate::error::{EtlError, EtlResult};
use crate::flows::{State, StateRegistry};
use crate::store::{EtlStore, StateLogInsert, StateLogRow};
use crate::types::{EntityId, StateLogId};
use crate::validation::Outcome;

// ── Associated entities ──────────────────────────────────────────────────────

/// The one entity a state log row belongs to. Exactly one foreign key is
/// set per row; the variant makes that a type-level guarantee.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssociatedEntity {
    Employee(EntityId),
    Claim(EntityId),
    Payment(EntityId),
    ReferenceFile(EntityId),
}

impl AssociatedEntity {
    pub fn kind(&self) -> AssociatedType {
        match self {
            Self::Employee(_) => AssociatedType::Employee,
            Self::Claim(_) => AssociatedType::Claim,
            Self::Payment(_) => AssociatedType::Payment,
            Self::ReferenceFile(_) => AssociatedType::ReferenceFile,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Employee(id)
            | Self::Claim(id)
            | Self::Payment(id)
            | Self::ReferenceFile(id) => id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssociatedType {
    Employee,
    Claim,
    Payment,
    ReferenceFile,
}

impl AssociatedType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Employee => "employee",
            Self::Claim => "claim",
            Self::Payment => "payment",
            Self::ReferenceFile => "reference_file",
        }
    }

    /// The foreign-key column this entity type occupies in state_log and
    /// latest_state_log.
    pub fn column(self) -> &'static str {
        match self {
            Self::Employee => "employee_id",
            Self::Claim => "claim_id",
            Self::Payment => "payment_id",
            Self::ReferenceFile => "reference_file_id",
        }
    }
}

/// Counted snapshot of one live state (operational dashboards).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateCount {
    pub state: State,
    pub count: i64,
}

// ── Engine ───────────────────────────────────────────────────────────────────

pub struct StateLogEngine<'a> {
    registry: &'a StateRegistry,
}

impl<'a> StateLogEngine<'a> {
    pub fn new(registry: &'a StateRegistry) -> Self {
        Self { registry }
    }

    /// Record a finished transition for an entity and move the (entity,
    /// flow) pointer. When the entity already has a lineage in the end
    /// state's flow, the new row chains to it and inherits its end state
    /// as start state; otherwise this row is a new lineage root.
    ///
    /// `start_time` backdates started_at for reference-file-driven
    /// transitions; both timestamps default to `now`.
    #[allow(clippy::too_many_arguments)]
    pub fn create_finished_state_log(
        &self,
        store: &EtlStore,
        entity: &AssociatedEntity,
        end_state: State,
        outcome: &Outcome,
        import_log_id: Option<i64>,
        now: DateTime<Utc>,
        start_time: Option<DateTime<Utc>>,
    ) -> EtlResult<StateLogId> {
        let kind = entity.kind();
        if entity.id().is_empty() {
            return Err(EtlError::MissingEntityId {
                entity: kind.as_str(),
                id_field: kind.column(),
            });
        }

        let flow = end_state.flow();
        let prev = self.latest_ref(store, kind, entity.id(), flow.id(), flow.description())?;

        let (start_state_id, prev_state_log_id) = match prev {
            Some(prev_id) => {
                let prev_row = store.get_state_log(prev_id)?.ok_or_else(|| {
                    EtlError::Other(anyhow::anyhow!(
                        "latest_state_log points at missing state_log {prev_id}"
                    ))
                })?;
                (Some(prev_row.end_state_id), Some(prev_id))
            }
            None => (None, None),
        };

        let mut insert = StateLogInsert {
            associated_type: kind.as_str().to_string(),
            employee_id: None,
            claim_id: None,
            payment_id: None,
            reference_file_id: None,
            start_state_id,
            end_state_id: end_state.id(),
            started_at: start_time.unwrap_or(now),
            ended_at: now,
            outcome: Some(serde_json::to_string(outcome)?),
            prev_state_log_id,
            import_log_id,
        };
        match entity {
            AssociatedEntity::Employee(id) => insert.employee_id = Some(id.clone()),
            AssociatedEntity::Claim(id) => insert.claim_id = Some(id.clone()),
            AssociatedEntity::Payment(id) => insert.payment_id = Some(id.clone()),
            AssociatedEntity::ReferenceFile(id) => insert.reference_file_id = Some(id.clone()),
        }

        let state_log_id = store.insert_state_log(&insert)?;
        store.upsert_latest_state_log(kind.column(), entity.id(), flow.id(), state_log_id)?;
        Ok(state_log_id)
    }

    /// Record a transition with no associated entity (e.g. "file was
    /// retrieved but produced no entities yet"). No latest_state_log
    /// pointer is written — every call is a disconnected lineage root
    /// unless the caller threads `prev_state_log_id` explicitly.
    #[allow(clippy::too_many_arguments)]
    pub fn create_state_log_without_associated_model(
        &self,
        store: &EtlStore,
        end_state: State,
        outcome: &Outcome,
        import_log_id: Option<i64>,
        now: DateTime<Utc>,
        start_time: Option<DateTime<Utc>>,
        prev_state_log_id: Option<StateLogId>,
    ) -> EtlResult<StateLogId> {
        let start_state_id = match prev_state_log_id {
            Some(prev_id) => store
                .get_state_log(prev_id)?
                .map(|row| row.end_state_id),
            None => None,
        };
        let insert = StateLogInsert {
            associated_type: "none".to_string(),
            employee_id: None,
            claim_id: None,
            payment_id: None,
            reference_file_id: None,
            start_state_id,
            end_state_id: end_state.id(),
            started_at: start_time.unwrap_or(now),
            ended_at: now,
            outcome: Some(serde_json::to_string(outcome)?),
            prev_state_log_id,
            import_log_id,
        };
        store.insert_state_log(&insert)
    }

    /// The entity's current state log, but only when its current end
    /// state equals the requested one. The pointer may reference a
    /// different end state if the entity has moved on — callers check,
    /// they never assume.
    pub fn get_latest_state_log_in_end_state(
        &self,
        store: &EtlStore,
        entity: &AssociatedEntity,
        end_state: State,
    ) -> EtlResult<Option<StateLogRow>> {
        let kind = entity.kind();
        let flow = end_state.flow();
        let Some(state_log_id) =
            self.latest_ref(store, kind, entity.id(), flow.id(), flow.description())?
        else {
            return Ok(None);
        };
        let row = store.get_state_log(state_log_id)?;
        Ok(row.filter(|r| r.end_state_id == end_state.id()))
    }

    /// All entities of a class whose CURRENT state is the target.
    pub fn get_all_latest_state_logs_in_end_state(
        &self,
        store: &EtlStore,
        entity_class: AssociatedType,
        end_state: State,
    ) -> EtlResult<Vec<StateLogRow>> {
        store.latest_state_logs_with_end_state(entity_class.column(), end_state.id())
    }

    /// Entities whose most recent contiguous run of same-start/end
    /// transitions in `end_state` began at least `days_stuck` days before
    /// `now`. The boundary is the first transition INTO the state (where
    /// start ≠ end); age is computed from that row, not the latest.
    pub fn get_state_logs_stuck_in_state(
        &self,
        store: &EtlStore,
        entity_class: AssociatedType,
        end_state: State,
        days_stuck: i64,
        now: DateTime<Utc>,
    ) -> EtlResult<Vec<StateLogRow>> {
        let latest = self.get_all_latest_state_logs_in_end_state(store, entity_class, end_state)?;
        let mut stuck = Vec::new();
        for log in latest {
            let boundary = self.run_boundary(store, log.clone(), end_state.id())?;
            if (now - boundary.ended_at).num_days() >= days_stuck {
                stuck.push(log);
            }
        }
        Ok(stuck)
    }

    /// Whether the entity's current flow lineage ever passed through the
    /// target end state, latest or not.
    pub fn has_been_in_end_state(
        &self,
        store: &EtlStore,
        entity: &AssociatedEntity,
        end_state: State,
    ) -> EtlResult<bool> {
        let kind = entity.kind();
        let flow = end_state.flow();
        let Some(state_log_id) =
            self.latest_ref(store, kind, entity.id(), flow.id(), flow.description())?
        else {
            return Ok(false);
        };

        let mut current = store.get_state_log(state_log_id)?;
        while let Some(row) = current {
            if row.end_state_id == end_state.id() {
                return Ok(true);
            }
            current = match row.prev_state_log_id {
                Some(prev_id) => store.get_state_log(prev_id)?,
                None => None,
            };
        }
        Ok(false)
    }

    /// Live distribution of current states across all tracked entities.
    pub fn get_state_counts(&self, store: &EtlStore) -> EtlResult<Vec<StateCount>> {
        let mut counts = Vec::new();
        for (end_state_id, count) in store.state_counts()? {
            let state = self
                .registry
                .state_for_id(end_state_id)
                .ok_or(EtlError::UnknownStateId(end_state_id))?;
            counts.push(StateCount { state, count });
        }
        Ok(counts)
    }

    // ── internals ──────────────────────────────────────────────

    /// Zero-or-one pointer for (entity, flow); more than one fails closed.
    fn latest_ref(
        &self,
        store: &EtlStore,
        kind: AssociatedType,
        entity_id: &str,
        flow_id: i64,
        flow_description: &str,
    ) -> EtlResult<Option<StateLogId>> {
        let refs = store.latest_state_log_refs(kind.column(), entity_id, flow_id)?;
        if refs.len() > 1 {
            return Err(EtlError::AmbiguousLatestState {
                entity_id: entity_id.to_string(),
                flow: flow_description.to_string(),
            });
        }
        Ok(refs.first().map(|(_, state_log_id)| *state_log_id))
    }

    /// Walk prev pointers back to the row that first entered the state.
    fn run_boundary(
        &self,
        store: &EtlStore,
        latest: StateLogRow,
        target_state_id: i64,
    ) -> EtlResult<StateLogRow> {
        let mut current = latest;
        loop {
            let same_start_and_end = current.start_state_id == Some(target_state_id)
                && current.end_state_id == target_state_id;
            if !same_start_and_end {
                return Ok(current);
            }
            match current.prev_state_log_id {
                Some(prev_id) => {
                    current = store.get_state_log(prev_id)?.ok_or_else(|| {
                        EtlError::Other(anyhow::anyhow!(
                            "state_log {prev_id} referenced by prev chain is missing"
                        ))
                    })?;
                }
                None => return Ok(current),
            }
        }
    }
}
