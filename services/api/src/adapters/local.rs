//! services/api/src/adapters/local.rs
//!
//! The local snapshot store: one JSON file per owner under the configured
//! data directory, implementing the `LocalStore` port. The device record
//! lives in its own file, outside the main blob, so resetting a profile
//! does not also reset the guest trial counter.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use arcana_core::domain::DeviceRecord;
use arcana_core::flow::ReadingSession;
use arcana_core::ports::{LocalSnapshot, LocalStore, PortError, PortResult};
use arcana_core::reconcile;
use serde::Deserialize;
use tracing::warn;

/// A filesystem adapter that implements the `LocalStore` port.
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Creates the store, ensuring the data directory exists.
    pub fn new(dir: PathBuf) -> std::io::Result<Self> {
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn snapshot_path(&self, owner: &str) -> PathBuf {
        self.dir.join(format!("profile-{}.json", sanitize_key(owner)))
    }

    fn device_path(&self, device_id: &str) -> PathBuf {
        self.dir.join(format!("device-{}.json", sanitize_key(device_id)))
    }
}

/// Keeps owner keys filesystem-safe.
fn sanitize_key(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// The loose on-disk shape of a snapshot; the profile half goes through the
/// same sanitizing path as the remote blob.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawSnapshot {
    profile: serde_json::Value,
    session: Option<ReadingSession>,
}

impl LocalStore for JsonFileStore {
    fn load_snapshot(&self, owner: &str) -> PortResult<Option<LocalSnapshot>> {
        let path = self.snapshot_path(owner);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(PortError::Unexpected(e.to_string())),
        };
        match serde_json::from_slice::<RawSnapshot>(&bytes) {
            Ok(raw) => Ok(Some(LocalSnapshot {
                profile: reconcile::profile_from_blob(raw.profile),
                session: raw.session.unwrap_or_default(),
            })),
            Err(e) => {
                // A corrupt snapshot degrades to a fresh start.
                warn!("Discarding unreadable local snapshot {}: {}", path.display(), e);
                Ok(None)
            }
        }
    }

    fn save_snapshot(&self, owner: &str, snapshot: &LocalSnapshot) -> PortResult<()> {
        let bytes = serde_json::to_vec_pretty(snapshot)
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        fs::write(self.snapshot_path(owner), bytes)
            .map_err(|e| PortError::Unexpected(e.to_string()))
    }

    fn load_device(&self, device_id: &str) -> PortResult<Option<DeviceRecord>> {
        let path = self.device_path(device_id);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(PortError::Unexpected(e.to_string())),
        };
        match serde_json::from_slice::<DeviceRecord>(&bytes) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                warn!("Discarding unreadable device record {}: {}", path.display(), e);
                Ok(None)
            }
        }
    }

    fn save_device(&self, record: &DeviceRecord) -> PortResult<()> {
        let bytes = serde_json::to_vec_pretty(record)
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        fs::write(self.device_path(&record.device_id), bytes)
            .map_err(|e| PortError::Unexpected(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arcana_core::domain::UserProfile;

    fn store() -> (tempfile::TempDir, JsonFileStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().to_path_buf()).unwrap();
        (dir, store)
    }

    #[test]
    fn snapshot_roundtrip() {
        let (_dir, store) = store();
        let mut snapshot = LocalSnapshot {
            profile: UserProfile::default(),
            session: ReadingSession::default(),
        };
        snapshot.profile.coins = 512;

        store.save_snapshot("owner-1", &snapshot).unwrap();
        let loaded = store.load_snapshot("owner-1").unwrap().unwrap();
        assert_eq!(loaded, snapshot);
    }

    #[test]
    fn missing_snapshot_is_none() {
        let (_dir, store) = store();
        assert!(store.load_snapshot("nobody").unwrap().is_none());
    }

    #[test]
    fn corrupt_snapshot_degrades_to_none() {
        let (_dir, store) = store();
        fs::write(store.snapshot_path("owner-1"), b"{ not json").unwrap();
        assert!(store.load_snapshot("owner-1").unwrap().is_none());
    }

    #[test]
    fn device_record_lives_outside_the_snapshot() {
        let (_dir, store) = store();
        let mut record = DeviceRecord::new("device-9");
        record.trial_used = true;
        store.save_device(&record).unwrap();

        // Overwriting the profile snapshot must not touch the trial flag.
        let snapshot = LocalSnapshot {
            profile: UserProfile::default(),
            session: ReadingSession::default(),
        };
        store.save_snapshot("guest-device-9", &snapshot).unwrap();

        assert_eq!(store.load_device("device-9").unwrap().unwrap(), record);
    }

    #[test]
    fn owner_keys_are_sanitized() {
        let (_dir, store) = store();
        let snapshot = LocalSnapshot {
            profile: UserProfile::default(),
            session: ReadingSession::default(),
        };
        store.save_snapshot("../sneaky/owner", &snapshot).unwrap();
        assert!(store.load_snapshot("../sneaky/owner").unwrap().is_some());
    }
}
