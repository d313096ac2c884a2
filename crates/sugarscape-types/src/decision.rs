//! Per-agent, per-tick decisions.
//!
//! A [`Decision`] carries one boolean flag per [`DecisionCategory`] plus the
//! payload each category uses when its flag is set. Rule-based sources hand
//! out [`Decision::affirmative`] (every flag set, no payload) and leave
//! target selection to the rule heuristics. An external oracle must supply a
//! payload for every flag it sets.

use serde::{Deserialize, Serialize};

use crate::ids::AgentId;
use crate::structs::Position;

/// The gated rule categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionCategory {
    /// Foraging movement.
    Move,
    /// Cross-tribe predation.
    Combat,
    /// Lending and borrowing.
    Credit,
    /// Partner pairing and childbirth.
    Reproduce,
}

impl DecisionCategory {
    /// All categories, in resolution order.
    pub const ALL: [Self; 4] = [Self::Combat, Self::Move, Self::Reproduce, Self::Credit];

    /// Wire name of the category's flag.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Move => "move",
            Self::Combat => "combat",
            Self::Credit => "credit",
            Self::Reproduce => "reproduce",
        }
    }

    /// Wire name of the category's payload field.
    pub const fn payload_field(self) -> &'static str {
        match self {
            Self::Move => "move_target_cell",
            Self::Combat => "combat_target_id",
            Self::Credit => "credit_partner_id",
            Self::Reproduce => "reproduce_with_id",
        }
    }
}

impl core::fmt::Display for DecisionCategory {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured decision for one agent for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct Decision {
    /// Whether to move this tick.
    #[serde(rename = "move")]
    pub relocate: bool,
    /// Whether to attack this tick.
    pub combat: bool,
    /// Whether to take part in credit this tick.
    pub credit: bool,
    /// Whether to seek a partner this tick.
    pub reproduce: bool,
    /// Destination cell, used when `relocate` is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub move_target_cell: Option<Position>,
    /// Victim, used when `combat` is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub combat_target_id: Option<AgentId>,
    /// Counterparty, used when `credit` is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credit_partner_id: Option<AgentId>,
    /// Partner, used when `reproduce` is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reproduce_with_id: Option<AgentId>,
}

impl Decision {
    /// Every flag set, no payloads: act on every category and let the rule
    /// heuristics pick targets.
    pub const fn affirmative() -> Self {
        Self {
            relocate: true,
            combat: true,
            credit: true,
            reproduce: true,
            move_target_cell: None,
            combat_target_id: None,
            credit_partner_id: None,
            reproduce_with_id: None,
        }
    }

    /// Every flag cleared.
    pub const fn abstain() -> Self {
        Self {
            relocate: false,
            combat: false,
            credit: false,
            reproduce: false,
            move_target_cell: None,
            combat_target_id: None,
            credit_partner_id: None,
            reproduce_with_id: None,
        }
    }

    /// The flag for `category`.
    pub const fn flag(&self, category: DecisionCategory) -> bool {
        match category {
            DecisionCategory::Move => self.relocate,
            DecisionCategory::Combat => self.combat,
            DecisionCategory::Credit => self.credit,
            DecisionCategory::Reproduce => self.reproduce,
        }
    }

    /// Whether the payload for `category` is present.
    pub const fn has_payload(&self, category: DecisionCategory) -> bool {
        match category {
            DecisionCategory::Move => self.move_target_cell.is_some(),
            DecisionCategory::Combat => self.combat_target_id.is_some(),
            DecisionCategory::Credit => self.credit_partner_id.is_some(),
            DecisionCategory::Reproduce => self.reproduce_with_id.is_some(),
        }
    }
}
