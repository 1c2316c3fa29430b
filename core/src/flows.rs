//! The state/flow registry.
//!
//! Every workflow state belongs to exactly one flow; state logs chain only
//! within a flow. The registry is built once at startup and passed by
//! reference into the state-log engine — there is no ambient global
//! lookup table.
//!
//! Ids are stable forever: states are added, never renumbered.

use std::collections::HashMap;

use anyhow::anyhow;

use crate::error::EtlResult;

// ── Flows ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flow {
    ClaimantExtract,
    Eft,
    Payment,
    ExtractIngest,
}

impl Flow {
    pub const ALL: &'static [Self] = &[
        Self::ClaimantExtract,
        Self::Eft,
        Self::Payment,
        Self::ExtractIngest,
    ];

    pub fn id(self) -> i64 {
        match self {
            Self::ClaimantExtract => 1,
            Self::Eft => 2,
            Self::Payment => 3,
            Self::ExtractIngest => 4,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::ClaimantExtract => "Claimant Extract",
            Self::Eft => "EFT",
            Self::Payment => "Payment",
            Self::ExtractIngest => "Extract Ingest",
        }
    }
}

// ── States ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    // Claimant extract flow
    ClaimantExtracted,
    ClaimantAddToErrorReport,
    ClaimantErrorReportSent,

    // EFT flow
    EftRequestReceived,
    EftPrenoteSent,
    EftApproved,
    EftRejected,
    EftAddToErrorReport,

    // Payment flow
    PaymentExtracted,
    ConfirmPayment,
    PaymentComplete,
    PaymentAddToErrorReport,

    // Extract ingest flow (reference files)
    ExtractReceived,
    ExtractProcessed,
    ExtractSkipped,
    ExtractErrored,
}

impl State {
    pub const ALL: &'static [Self] = &[
        Self::ClaimantExtracted,
        Self::ClaimantAddToErrorReport,
        Self::ClaimantErrorReportSent,
        Self::EftRequestReceived,
        Self::EftPrenoteSent,
        Self::EftApproved,
        Self::EftRejected,
        Self::EftAddToErrorReport,
        Self::PaymentExtracted,
        Self::ConfirmPayment,
        Self::PaymentComplete,
        Self::PaymentAddToErrorReport,
        Self::ExtractReceived,
        Self::ExtractProcessed,
        Self::ExtractSkipped,
        Self::ExtractErrored,
    ];

    pub fn id(self) -> i64 {
        match self {
            Self::ClaimantExtracted => 10,
            Self::ClaimantAddToErrorReport => 11,
            Self::ClaimantErrorReportSent => 12,
            Self::EftRequestReceived => 20,
            Self::EftPrenoteSent => 21,
            Self::EftApproved => 22,
            Self::EftRejected => 23,
            Self::EftAddToErrorReport => 24,
            Self::PaymentExtracted => 30,
            Self::ConfirmPayment => 31,
            Self::PaymentComplete => 32,
            Self::PaymentAddToErrorReport => 33,
            Self::ExtractReceived => 40,
            Self::ExtractProcessed => 41,
            Self::ExtractSkipped => 42,
            Self::ExtractErrored => 43,
        }
    }

    pub fn flow(self) -> Flow {
        match self {
            Self::ClaimantExtracted
            | Self::ClaimantAddToErrorReport
            | Self::ClaimantErrorReportSent => Flow::ClaimantExtract,
            Self::EftRequestReceived
            | Self::EftPrenoteSent
            | Self::EftApproved
            | Self::EftRejected
            | Self::EftAddToErrorReport => Flow::Eft,
            Self::PaymentExtracted
            | Self::ConfirmPayment
            | Self::PaymentComplete
            | Self::PaymentAddToErrorReport => Flow::Payment,
            Self::ExtractReceived
            | Self::ExtractProcessed
            | Self::ExtractSkipped
            | Self::ExtractErrored => Flow::ExtractIngest,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::ClaimantExtracted => "Claimant extracted from FINEOS",
            Self::ClaimantAddToErrorReport => "Add to claimant extract error report",
            Self::ClaimantErrorReportSent => "Claimant extract error report sent",
            Self::EftRequestReceived => "EFT request received",
            Self::EftPrenoteSent => "EFT prenote sent",
            Self::EftApproved => "EFT approved",
            Self::EftRejected => "EFT rejected",
            Self::EftAddToErrorReport => "Add to EFT error report",
            Self::PaymentExtracted => "Payment extracted from FINEOS",
            Self::ConfirmPayment => "Confirm payment",
            Self::PaymentComplete => "Payment complete",
            Self::PaymentAddToErrorReport => "Add to payment error report",
            Self::ExtractReceived => "Extract received",
            Self::ExtractProcessed => "Extract processed",
            Self::ExtractSkipped => "Extract skipped",
            Self::ExtractErrored => "Extract errored",
        }
    }
}

// ── Registry ─────────────────────────────────────────────────────────────────

/// Immutable id → state index, built once at process start.
/// Construction fails if two states ever share an id.
pub struct StateRegistry {
    by_id: HashMap<i64, State>,
}

impl StateRegistry {
    pub fn init() -> EtlResult<Self> {
        let mut by_id = HashMap::new();
        for state in State::ALL {
            if let Some(prev) = by_id.insert(state.id(), *state) {
                return Err(anyhow!(
                    "state id {} assigned to both {:?} and {:?}",
                    state.id(),
                    prev,
                    state
                )
                .into());
            }
        }
        Ok(Self { by_id })
    }

    pub fn state_for_id(&self, id: i64) -> Option<State> {
        self.by_id.get(&id).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_builds_and_resolves() {
        let registry = StateRegistry::init().unwrap();
        for state in State::ALL {
            assert_eq!(registry.state_for_id(state.id()), Some(*state));
        }
        assert_eq!(registry.state_for_id(9999), None);
    }

    #[test]
    fn every_state_has_exactly_one_flow() {
        // flow() is total by construction; check the partition is sane.
        for flow in Flow::ALL {
            let members = State::ALL.iter().filter(|s| s.flow() == *flow).count();
            assert!(members > 0, "flow {flow:?} has no states");
        }
    }
}
