//! crates/arcana_core/src/ledger.rs
//!
//! The coin ledger: spend/earn reducers over the user aggregate, and the
//! static coin pack table backing the purchase flows.

use crate::domain::{Identity, UserProfile};
use crate::tier::Tier;

/// The result of a spend attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpendOutcome {
    /// The balance was deducted and the spend counters advanced.
    Charged,
    /// Guests never pay; nothing was mutated.
    GuestExempt,
    /// Balance too low; nothing was mutated.
    InsufficientFunds,
}

impl SpendOutcome {
    pub fn succeeded(self) -> bool {
        !matches!(self, SpendOutcome::InsufficientFunds)
    }
}

/// Attempts to spend `amount` coins.
///
/// Guests are exempt from deduction: the spend "succeeds" without touching
/// the balance or the spend counters. For accounts, an insufficient balance
/// leaves the profile untouched; otherwise the balance is deducted, the
/// cumulative and monthly counters advance, and the stored tier is
/// recomputed from the monthly spend.
pub fn spend(profile: &mut UserProfile, identity: &Identity, amount: u32) -> SpendOutcome {
    if identity.is_guest() {
        return SpendOutcome::GuestExempt;
    }
    if profile.coins < amount {
        return SpendOutcome::InsufficientFunds;
    }
    profile.coins -= amount;
    profile.total_spent = profile.total_spent.saturating_add(amount);
    profile.monthly_spent = profile.monthly_spent.saturating_add(amount);
    profile.tier = Tier::for_monthly_spend(profile.monthly_spent);
    SpendOutcome::Charged
}

/// Credits `amount` coins unconditionally (attendance rewards, tier-up
/// bonuses, purchases).
pub fn earn(profile: &mut UserProfile, amount: u32) {
    profile.coins = profile.coins.saturating_add(amount);
}

/// A purchasable coin pack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoinPack {
    pub id: &'static str,
    pub coins: u32,
    /// Price in the smallest currency unit of the payment providers.
    pub price: u32,
}

pub const COIN_PACKS: [CoinPack; 4] = [
    CoinPack { id: "pouch", coins: 300, price: 3_000 },
    CoinPack { id: "satchel", coins: 800, price: 7_000 },
    CoinPack { id: "chest", coins: 2_000, price: 15_000 },
    CoinPack { id: "vault", coins: 5_000, price: 33_000 },
];

/// Looks up a coin pack by id.
pub fn coin_pack(id: &str) -> Option<&'static CoinPack> {
    COIN_PACKS.iter().find(|pack| pack.id == id)
}
