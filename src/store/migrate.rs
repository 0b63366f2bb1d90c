use crate::store::operations::events::StudyEvent;
use crate::store::{keys, Store, StoreError};

pub(crate) const VERSION_KEY: &str = "_meta:version";

type MigrationFn = fn(&Store) -> Result<(), StoreError>;

fn migrations() -> Vec<(&'static str, MigrationFn)> {
    vec![
        ("001_initial", m001_initial),
        ("002_rekey_study_events", m002_rekey_study_events),
    ]
}

/// 执行所有未应用的数据库迁移。
///
/// - **幂等性要求**：迁移可能在 func() 成功但 set_version() 之前中断，
///   重启后会重新执行，因此每个迁移必须可重复执行。
/// - **进度检查点**：版本号在每个迁移成功后立即持久化。
/// - **仅向前**：set_version 拒绝降级。
pub fn run(store: &Store) -> Result<(), StoreError> {
    let current = get_current_version(store)?;
    let all = migrations();

    for (index, (name, func)) in all.iter().enumerate() {
        let version = (index + 1) as u32;
        if version > current {
            tracing::info!(version, name, "Running migration");
            func(store)?;
            set_version(store, version)?;
            tracing::info!(version, name, "Migration complete");
        } else {
            tracing::debug!(version, name, "Migration already applied, skipping");
        }
    }

    Ok(())
}

pub fn get_current_version(store: &Store) -> Result<u32, StoreError> {
    match store.config_versions.get(VERSION_KEY.as_bytes())? {
        Some(raw) => {
            let bytes: [u8; 4] = raw.as_ref().try_into().map_err(|_| StoreError::Migration {
                version: 0,
                message: format!("corrupt version marker ({} bytes)", raw.len()),
            })?;
            Ok(u32::from_be_bytes(bytes))
        }
        None => Ok(0),
    }
}

pub fn set_version(store: &Store, version: u32) -> Result<(), StoreError> {
    let current = get_current_version(store)?;
    if version < current {
        return Err(StoreError::Migration {
            version,
            message: format!("Refuse to downgrade from {} to {}", current, version),
        });
    }

    store
        .config_versions
        .insert(VERSION_KEY.as_bytes(), &version.to_be_bytes())?;
    Ok(())
}

fn m001_initial(_store: &Store) -> Result<(), StoreError> {
    Ok(())
}

/// Rewrites every event under the key derived from its own payload, so a
/// change to the key encoding never strands events outside range scans.
/// Re-running is a no-op once every key already matches.
fn m002_rekey_study_events(store: &Store) -> Result<(), StoreError> {
    let mut rekeyed = 0usize;
    for item in store.study_events.iter() {
        let (key, value) = item?;
        let event: StudyEvent = Store::deserialize(&value)?;
        let expected = keys::event_key(&event.user_id, event.timestamp_utc.timestamp_micros())?;
        if key.as_ref() != expected.as_bytes() {
            store.study_events.insert(expected.as_bytes(), value)?;
            store.study_events.remove(key)?;
            rekeyed += 1;
        }
    }
    tracing::info!(rekeyed, "Study event keys verified");
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn migration_is_idempotent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db");
        let store = Store::open(path.to_str().unwrap()).unwrap();

        run(&store).unwrap();
        let first = get_current_version(&store).unwrap();
        run(&store).unwrap();
        let second = get_current_version(&store).unwrap();

        assert_eq!(first, 2);
        assert_eq!(second, 2);
    }

    #[test]
    fn downgrade_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db2");
        let store = Store::open(path.to_str().unwrap()).unwrap();

        set_version(&store, 3).unwrap();
        let err = set_version(&store, 2).unwrap_err();
        assert!(matches!(err, StoreError::Migration { .. }));
    }

    #[test]
    fn stray_event_key_is_rewritten() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path().join("db3").to_str().unwrap()).unwrap();

        let ts = Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap();
        let event = StudyEvent::new("u1", 10, 5, ts, None, "UTC", ts);
        store
            .study_events
            .insert(b"legacy-key", Store::serialize(&event).unwrap())
            .unwrap();

        run(&store).unwrap();

        assert!(store.study_events.get(b"legacy-key").unwrap().is_none());
        let found = store
            .get_user_events_in_range("u1", ts, ts)
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].word_count, 10);
    }
}
