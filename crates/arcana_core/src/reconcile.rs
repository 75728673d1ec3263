//! crates/arcana_core/src/reconcile.rs
//!
//! Local/remote reconciliation for session start, plus the sanitizing
//! deserialization both storage paths go through. The stores are loosely
//! typed (opaque JSON blobs), so every numeric field is coerced into range
//! and every missing collection defaults to empty before use.

use chrono::NaiveDate;
use serde::Deserialize;

use crate::domain::{ReadingResult, UserProfile};
use crate::rollover::STREAK_LENGTH;
use crate::tier::Tier;

/// Where the reconciled profile came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileSource {
    Remote,
    Local,
    Fresh,
}

/// The result of reconciling the two snapshots.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciled {
    pub profile: UserProfile,
    pub source: ProfileSource,
}

impl Reconciled {
    /// True when the remote store has no row yet and the chosen profile
    /// should be promoted (written) there.
    pub fn needs_remote_seed(&self) -> bool {
        !matches!(self.source, ProfileSource::Remote)
    }
}

/// Merges the local snapshot with the remotely fetched one.
///
/// Remote wins whenever it exists; otherwise the local snapshot (or a
/// freshly initialized profile) is promoted.
pub fn reconcile(local: Option<UserProfile>, remote: Option<UserProfile>) -> Reconciled {
    if let Some(profile) = remote {
        return Reconciled {
            profile,
            source: ProfileSource::Remote,
        };
    }
    match local {
        Some(profile) => Reconciled {
            profile,
            source: ProfileSource::Local,
        },
        None => Reconciled {
            profile: UserProfile::default(),
            source: ProfileSource::Fresh,
        },
    }
}

/// The loosely-typed shape a stored profile blob is read back through.
/// Every field is optional and numerics are accepted as floats so that a
/// blob written by an older or sloppier writer still loads.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawProfile {
    coins: f64,
    total_spent: f64,
    monthly_spent: f64,
    tier: Option<Tier>,
    streak_day: f64,
    last_login: Option<NaiveDate>,
    daily_readings: f64,
    last_reading: Option<NaiveDate>,
    customizations: Vec<String>,
    history: Vec<ReadingResult>,
}

impl RawProfile {
    /// Coerces the loose record into the typed aggregate. Non-finite and
    /// negative numerics become zero; counters are clamped into range.
    pub fn sanitized(self) -> UserProfile {
        UserProfile {
            coins: sanitize_count(self.coins),
            total_spent: sanitize_count(self.total_spent),
            monthly_spent: sanitize_count(self.monthly_spent),
            tier: self.tier.unwrap_or(Tier::Bronze),
            streak_day: sanitize_count(self.streak_day).min(STREAK_LENGTH as u32) as u8,
            last_login: self.last_login,
            daily_readings: sanitize_count(self.daily_readings).min(u8::MAX as u32) as u8,
            last_reading: self.last_reading,
            customizations: self.customizations,
            history: self.history,
        }
    }
}

fn sanitize_count(value: f64) -> u32 {
    if value.is_finite() && value > 0.0 {
        value.min(u32::MAX as f64) as u32
    } else {
        0
    }
}

/// Parses a stored blob into the typed aggregate. An unreadable blob
/// degrades to a fresh default rather than failing the session.
pub fn profile_from_blob(blob: serde_json::Value) -> UserProfile {
    match serde_json::from_value::<RawProfile>(blob) {
        Ok(raw) => raw.sanitized(),
        Err(_) => UserProfile::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn remote_wins_when_present() {
        let local = UserProfile {
            tier: Tier::Silver,
            ..UserProfile::default()
        };
        let remote = UserProfile {
            tier: Tier::Gold,
            coins: 777,
            ..UserProfile::default()
        };

        let merged = reconcile(Some(local), Some(remote.clone()));

        assert_eq!(merged.source, ProfileSource::Remote);
        assert_eq!(merged.profile, remote);
        assert!(!merged.needs_remote_seed());
    }

    #[test]
    fn local_is_promoted_when_remote_is_absent() {
        let local = UserProfile {
            coins: 42,
            ..UserProfile::default()
        };
        let merged = reconcile(Some(local.clone()), None);

        assert_eq!(merged.source, ProfileSource::Local);
        assert_eq!(merged.profile, local);
        assert!(merged.needs_remote_seed());
    }

    #[test]
    fn a_fresh_profile_is_created_when_both_are_absent() {
        let merged = reconcile(None, None);
        assert_eq!(merged.source, ProfileSource::Fresh);
        assert_eq!(merged.profile, UserProfile::default());
        assert!(merged.needs_remote_seed());
    }

    #[test]
    fn missing_collections_default_to_empty() {
        let profile = profile_from_blob(json!({ "coins": 50 }));
        assert_eq!(profile.coins, 50);
        assert!(profile.history.is_empty());
        assert!(profile.customizations.is_empty());
        assert_eq!(profile.tier, Tier::Bronze);
    }

    #[test]
    fn negative_and_oversized_numerics_are_sanitized() {
        let profile = profile_from_blob(json!({
            "coins": -12.0,
            "total_spent": 1e12,
            "monthly_spent": 250,
            "streak_day": 99,
            "daily_readings": -1,
        }));
        assert_eq!(profile.coins, 0);
        assert_eq!(profile.total_spent, u32::MAX);
        assert_eq!(profile.monthly_spent, 250);
        assert_eq!(profile.streak_day, STREAK_LENGTH);
        assert_eq!(profile.daily_readings, 0);
    }

    #[test]
    fn garbage_blobs_degrade_to_a_fresh_profile() {
        let profile = profile_from_blob(json!("not an object"));
        assert_eq!(profile, UserProfile::default());
    }

    #[test]
    fn typed_roundtrip_survives_the_raw_path() {
        let mut original = UserProfile::default();
        original.coins = 321;
        original.tier = Tier::Gold;
        original.monthly_spent = 1_600;
        original.streak_day = 4;

        let blob = serde_json::to_value(&original).unwrap();
        assert_eq!(profile_from_blob(blob), original);
    }
}
