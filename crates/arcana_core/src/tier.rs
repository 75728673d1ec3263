//! crates/arcana_core/src/tier.rs
//!
//! The tier calculator: maps cumulative monthly spend to one of four ordered
//! reward tiers, and carries the per-tier benefit tables (daily reading
//! quota, monthly rollover bonus).

use serde::{Deserialize, Serialize};

use crate::domain::{Identity, UserProfile};

/// Monthly spend (in coins) required to reach each tier above the base.
pub const SILVER_THRESHOLD: u32 = 400;
pub const GOLD_THRESHOLD: u32 = 1_500;
pub const DIAMOND_THRESHOLD: u32 = 4_000;

/// Daily reading cap for the two lower tiers. The upper tiers are unlimited.
pub const LOWER_TIER_DAILY_QUOTA: u8 = 3;

/// The four ordered reward tiers.
///
/// Derives `Ord` so that guard checks can compare tiers directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Bronze,
    Silver,
    Gold,
    Diamond,
}

impl Tier {
    /// Maps cumulative monthly spend to a tier. Total and monotonic.
    pub fn for_monthly_spend(spend: u32) -> Tier {
        if spend >= DIAMOND_THRESHOLD {
            Tier::Diamond
        } else if spend >= GOLD_THRESHOLD {
            Tier::Gold
        } else if spend >= SILVER_THRESHOLD {
            Tier::Silver
        } else {
            Tier::Bronze
        }
    }

    /// Daily reading quota for this tier. `None` means unlimited.
    pub fn daily_quota(self) -> Option<u8> {
        match self {
            Tier::Bronze | Tier::Silver => Some(LOWER_TIER_DAILY_QUOTA),
            Tier::Gold | Tier::Diamond => None,
        }
    }

    /// Applies this tier's monthly rollover multiplier to a coin balance
    /// (x1.5 for Gold, x2.0 for Diamond, unchanged below).
    pub fn apply_monthly_bonus(self, coins: u32) -> u32 {
        match self {
            Tier::Gold => coins.saturating_add(coins / 2),
            Tier::Diamond => coins.saturating_mul(2),
            Tier::Bronze | Tier::Silver => coins,
        }
    }

    /// The tier one step below, clamped at the bottom.
    pub fn demoted(self) -> Tier {
        match self {
            Tier::Diamond => Tier::Gold,
            Tier::Gold => Tier::Silver,
            Tier::Silver | Tier::Bronze => Tier::Bronze,
        }
    }

    /// Demotes by `steps`, clamped at `Bronze`.
    pub fn demoted_by(self, steps: u32) -> Tier {
        let mut tier = self;
        for _ in 0..steps {
            if tier == Tier::Bronze {
                break;
            }
            tier = tier.demoted();
        }
        tier
    }
}

/// The tier a given actor is treated as.
///
/// Guests are pinned to the top tier regardless of their stored profile.
pub fn effective_tier(profile: &UserProfile, identity: &Identity) -> Tier {
    if identity.is_guest() {
        Tier::Diamond
    } else {
        profile.tier
    }
}
