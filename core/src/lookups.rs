//! Lookup domains with hand-written stable ids.
//!
//! Each domain is a plain enum carrying the numeric id persisted in the
//! database and the canonical description used by the upstream extracts.
//! Ids are stable forever — variants are added, never renumbered.

// ── Claim type ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimType {
    Family,
    Medical,
    Military,
}

impl ClaimType {
    pub const ALL: &'static [Self] = &[Self::Family, Self::Medical, Self::Military];

    pub fn id(self) -> i64 {
        match self {
            Self::Family => 1,
            Self::Medical => 2,
            Self::Military => 3,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Family => "Family",
            Self::Medical => "Employee",
            Self::Military => "Military",
        }
    }

    pub fn from_description(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|v| v.description() == s)
    }

    pub fn from_id(id: i64) -> Option<Self> {
        Self::ALL.iter().copied().find(|v| v.id() == id)
    }
}

// ── Absence status ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbsenceStatus {
    Adjudication,
    InReview,
    Approved,
    Declined,
    Closed,
    Completed,
    IntakeInProgress,
}

impl AbsenceStatus {
    pub const ALL: &'static [Self] = &[
        Self::Adjudication,
        Self::InReview,
        Self::Approved,
        Self::Declined,
        Self::Closed,
        Self::Completed,
        Self::IntakeInProgress,
    ];

    pub fn id(self) -> i64 {
        match self {
            Self::Adjudication => 1,
            Self::InReview => 2,
            Self::Approved => 3,
            Self::Declined => 4,
            Self::Closed => 5,
            Self::Completed => 6,
            Self::IntakeInProgress => 7,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Adjudication => "Adjudication",
            Self::InReview => "In Review",
            Self::Approved => "Approved",
            Self::Declined => "Declined",
            Self::Closed => "Closed",
            Self::Completed => "Completed",
            Self::IntakeInProgress => "Intake In Progress",
        }
    }

    pub fn from_description(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|v| v.description() == s)
    }

    pub fn from_id(id: i64) -> Option<Self> {
        Self::ALL.iter().copied().find(|v| v.id() == id)
    }
}

// ── Payment method ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentMethod {
    Check,
    Ach,
    Debit,
}

impl PaymentMethod {
    pub const ALL: &'static [Self] = &[Self::Check, Self::Ach, Self::Debit];

    pub fn id(self) -> i64 {
        match self {
            Self::Check => 1,
            Self::Ach => 2,
            Self::Debit => 3,
        }
    }

    /// The upstream extract's spelling, not ours.
    pub fn description(self) -> &'static str {
        match self {
            Self::Check => "Check",
            Self::Ach => "Elec Funds Transfer",
            Self::Debit => "Debit",
        }
    }

    pub fn from_description(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|v| v.description() == s)
    }

    pub fn from_id(id: i64) -> Option<Self> {
        Self::ALL.iter().copied().find(|v| v.id() == id)
    }
}

// ── Bank account type ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BankAccountType {
    Savings,
    Checking,
}

impl BankAccountType {
    pub const ALL: &'static [Self] = &[Self::Savings, Self::Checking];

    pub fn id(self) -> i64 {
        match self {
            Self::Savings => 1,
            Self::Checking => 2,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Savings => "Savings",
            Self::Checking => "Checking",
        }
    }

    pub fn from_description(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|v| v.description() == s)
    }

    pub fn from_id(id: i64) -> Option<Self> {
        Self::ALL.iter().copied().find(|v| v.id() == id)
    }
}

// ── Prenote state ────────────────────────────────────────────────────────────

/// Bank-account pre-verification lifecycle for EFT details.
/// New EFT info always enters at PendingPrePub.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrenoteState {
    PendingPrePub,
    PendingWithPub,
    Approved,
    Rejected,
}

impl PrenoteState {
    pub const ALL: &'static [Self] = &[
        Self::PendingPrePub,
        Self::PendingWithPub,
        Self::Approved,
        Self::Rejected,
    ];

    pub fn id(self) -> i64 {
        match self {
            Self::PendingPrePub => 1,
            Self::PendingWithPub => 2,
            Self::Approved => 3,
            Self::Rejected => 4,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::PendingPrePub => "Pending Pre Pub",
            Self::PendingWithPub => "Pending With Pub",
            Self::Approved => "Approved",
            Self::Rejected => "Rejected",
        }
    }

    pub fn from_description(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|v| v.description() == s)
    }

    pub fn from_id(id: i64) -> Option<Self> {
        Self::ALL.iter().copied().find(|v| v.id() == id)
    }
}

// ── Reference file type ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceFileType {
    FineosClaimantExtract,
    FineosPaymentExtract,
    ClaimantExtractErrorReport,
}

impl ReferenceFileType {
    pub const ALL: &'static [Self] = &[
        Self::FineosClaimantExtract,
        Self::FineosPaymentExtract,
        Self::ClaimantExtractErrorReport,
    ];

    pub fn id(self) -> i64 {
        match self {
            Self::FineosClaimantExtract => 1,
            Self::FineosPaymentExtract => 2,
            Self::ClaimantExtractErrorReport => 3,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::FineosClaimantExtract => "FINEOS Claimant Extract",
            Self::FineosPaymentExtract => "FINEOS Payment Extract",
            Self::ClaimantExtractErrorReport => "Claimant Extract Error Report",
        }
    }

    pub fn from_description(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|v| v.description() == s)
    }

    pub fn from_id(id: i64) -> Option<Self> {
        Self::ALL.iter().copied().find(|v| v.id() == id)
    }
}
