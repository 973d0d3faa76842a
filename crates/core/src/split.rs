use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use thiserror::Error;

use crate::item::{LineItem, Participant};
use crate::money::Money;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SplitError {
    #[error("At least one participant is required")]
    EmptyRoster,
    #[error("Participant names must not be blank")]
    BlankParticipant,
    #[error("Participant listed twice: {0}")]
    DuplicateParticipant(Participant),
    #[error("Item '{0}' must be shared by at least one participant")]
    EmptyAssignment(String),
    #[error("Item '{item}' is assigned to unknown participant '{participant}'")]
    UnknownParticipant { item: String, participant: Participant },
}

/// How shares are accumulated into a participant's total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitMode {
    /// Round each share, then re-round the running total after every addition.
    /// Residual cents can drift across many items; this is the reference
    /// behaviour and stays the default.
    #[default]
    Rerounded,
    /// Sum the unrounded shares and round once per participant.
    SumThenRound,
}

impl fmt::Display for SplitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SplitMode::Rerounded => write!(f, "rerounded"),
            SplitMode::SumThenRound => write!(f, "sum_then_round"),
        }
    }
}

impl std::str::FromStr for SplitMode {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "rerounded" => Ok(SplitMode::Rerounded),
            "sum_then_round" => Ok(SplitMode::SumThenRound),
            other => Err(format!("Unknown split mode: '{other}'")),
        }
    }
}

/// The participants of one splitting session.
#[derive(Debug, Clone)]
pub struct Roster {
    participants: Vec<Participant>,
}

impl Roster {
    pub fn new(participants: impl IntoIterator<Item = Participant>) -> Result<Self, SplitError> {
        let participants: Vec<Participant> = participants.into_iter().collect();
        if participants.is_empty() {
            return Err(SplitError::EmptyRoster);
        }
        let mut seen = BTreeSet::new();
        for p in &participants {
            if p.as_str().trim().is_empty() {
                return Err(SplitError::BlankParticipant);
            }
            if !seen.insert(p) {
                return Err(SplitError::DuplicateParticipant(p.clone()));
            }
        }
        Ok(Self { participants })
    }

    pub fn contains(&self, participant: &Participant) -> bool {
        self.participants.contains(participant)
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }
}

/// Owed amount per participant, in the target currency.
pub type BillResult = BTreeMap<Participant, Money>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShareLine {
    pub item: String,
    pub share: Money,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ParticipantBill {
    pub items: Vec<ShareLine>,
    pub total: Money,
}

/// Replaces the item's assignment. The caller is responsible for the subset
/// being non-empty and drawn from the session's participants.
pub fn assign(item: &mut LineItem, participants: impl IntoIterator<Item = Participant>) {
    item.shared_by = participants.into_iter().collect();
}

/// [`assign`] with the roster checks applied first.
pub fn assign_checked(
    item: &mut LineItem,
    participants: &[Participant],
    roster: &Roster,
) -> Result<(), SplitError> {
    if participants.is_empty() {
        return Err(SplitError::EmptyAssignment(item.name.clone()));
    }
    if let Some(unknown) = participants.iter().find(|p| !roster.contains(p)) {
        return Err(SplitError::UnknownParticipant {
            item: item.name.clone(),
            participant: unknown.clone(),
        });
    }
    assign(item, participants.iter().cloned());
    Ok(())
}

/// Checks assignments that arrived already attached to the items.
pub fn validate_assignments(items: &[LineItem], roster: &Roster) -> Result<(), SplitError> {
    for item in items {
        if let Some(unknown) = item.shared_by.iter().find(|p| !roster.contains(p)) {
            return Err(SplitError::UnknownParticipant {
                item: item.name.clone(),
                participant: unknown.clone(),
            });
        }
    }
    Ok(())
}

/// Shares every unassigned tax/tip/service/discount line across the roster.
/// Returns how many items were filled.
pub fn fill_shared_charges(items: &mut [LineItem], roster: &Roster) -> usize {
    let mut filled = 0;
    for item in items
        .iter_mut()
        .filter(|i| i.special.is_some() && i.shared_by.is_empty())
    {
        tracing::debug!(item = %item.name, "assigning shared charge to all participants");
        assign(item, roster.participants().iter().cloned());
        filled += 1;
    }
    filled
}

pub struct BillSplitter {
    mode: SplitMode,
}

impl BillSplitter {
    pub fn new(mode: SplitMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> SplitMode {
        self.mode
    }

    /// Owed totals for every participant with at least one non-zero share.
    pub fn split(&self, items: &[LineItem]) -> BillResult {
        self.breakdown(items)
            .into_iter()
            .map(|(p, bill)| (p, bill.total))
            .collect()
    }

    /// Per-participant share lines alongside the totals [`split`](Self::split) reports.
    pub fn breakdown(&self, items: &[LineItem]) -> BTreeMap<Participant, ParticipantBill> {
        let mut bills: BTreeMap<Participant, ParticipantBill> = BTreeMap::new();
        let mut contributed: BTreeSet<Participant> = BTreeSet::new();

        for item in items.iter().filter(|i| !i.shared_by.is_empty()) {
            let exact = item.split_base().divide(item.shared_by.len());
            let share = exact.round();
            let added = match self.mode {
                SplitMode::Rerounded => share,
                SplitMode::SumThenRound => exact,
            };

            for participant in &item.shared_by {
                let bill = bills.entry(participant.clone()).or_default();
                bill.items.push(ShareLine { item: item.name.clone(), share });
                bill.total = match self.mode {
                    SplitMode::Rerounded => (bill.total + added).round(),
                    SplitMode::SumThenRound => bill.total + added,
                };
                // Judged on what was accumulated: rounded shares in rerounded
                // mode, exact shares when rounding waits for the end.
                if !added.is_zero() {
                    contributed.insert(participant.clone());
                }
            }
        }

        bills.retain(|p, _| contributed.contains(p));
        if self.mode == SplitMode::SumThenRound {
            for bill in bills.values_mut() {
                bill.total = bill.total.round();
            }
        }
        bills
    }
}

impl Default for BillSplitter {
    fn default() -> Self {
        Self::new(SplitMode::default())
    }
}
