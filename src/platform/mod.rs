//! Platform adapter (C1): everything that talks to the NAS management stack.
//!
//! The management API is reached by shelling out to `midclt call <method>
//! [json-args]` and parsing its stdout as JSON — there is no HTTP surface.
//! `spawn()` is the shared subprocess primitive used by the workload driver
//! and both telemetry collectors to launch `dd`, `zpool iostat`, and
//! `arcstat`.

use crate::error::{PlatformError, Result};
use crate::models::{DiskInfo, PoolInfo, SystemInfo, VdevInfo};
use serde_json::Value;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};

/// Invoke `midclt call <method> [json_args]` and parse the JSON result.
pub async fn midclt_call(method: &str, json_args: Option<&Value>) -> Result<Value> {
    let mut cmd = Command::new("midclt");
    cmd.arg("call").arg(method);
    if let Some(args) = json_args {
        cmd.arg(args.to_string());
    }

    let output = cmd.output().await.map_err(|e| PlatformError::Transport {
        cmd: format!("midclt call {method}"),
        reason: e.to_string(),
    })?;

    if !output.status.success() {
        return Err(PlatformError::Transport {
            cmd: format!("midclt call {method}"),
            reason: format!(
                "exit status {:?}: {}",
                output.status.code(),
                String::from_utf8_lossy(&output.stderr)
            ),
        }
        .into());
    }

    serde_json::from_slice(&output.stdout).map_err(|e| {
        PlatformError::Parse {
            cmd: format!("midclt call {method}"),
            reason: e.to_string(),
        }
        .into()
    })
}

/// `midclt call system.info`.
pub async fn query_system_info() -> Result<SystemInfo> {
    let value = midclt_call("system.info", None).await?;
    let cpu_model = value
        .get("model")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string();
    let logical_cores = value.get("cores").and_then(Value::as_u64).unwrap_or(1) as u32;
    let physical_cores = value
        .get("physical_cores")
        .and_then(Value::as_u64)
        .unwrap_or(logical_cores as u64) as u32;
    let memory_bytes = value.get("physmem").and_then(Value::as_u64).unwrap_or(0);
    let version = value
        .get("version")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string();
    let system_product = value
        .get("system_product")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string();
    let loadavg = value
        .get("loadavg")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let load_at = |i: usize| loadavg.get(i).and_then(Value::as_f64).unwrap_or(0.0);

    Ok(SystemInfo {
        version,
        cpu_model,
        logical_cores,
        physical_cores,
        memory_bytes,
        load_average_1m: load_at(0),
        load_average_5m: load_at(1),
        load_average_15m: load_at(2),
        system_product,
    })
}

/// `midclt call pool.query`.
pub async fn query_pools() -> Result<Vec<PoolInfo>> {
    let value = midclt_call("pool.query", None).await?;
    let entries = value.as_array().cloned().unwrap_or_default();

    let mut pools = Vec::with_capacity(entries.len());
    for entry in entries {
        let name = entry
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let path = entry
            .get("path")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let status = entry
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or("UNKNOWN")
            .to_string();
        let capacity_bytes = entry.get("size").and_then(Value::as_u64).unwrap_or(0);

        let topology = entry
            .get("topology")
            .and_then(|t| t.as_object())
            .map(|topo| {
                topo.iter()
                    .filter_map(|(vdev_type, vdevs)| {
                        let vdevs = vdevs.as_array()?;
                        if vdevs.is_empty() {
                            return None;
                        }
                        let disk_count = vdevs
                            .iter()
                            .map(|v| {
                                v.get("children")
                                    .and_then(Value::as_array)
                                    .map(|c| c.len())
                                    .unwrap_or(1)
                            })
                            .sum::<usize>() as u32;
                        Some(VdevInfo {
                            name: vdev_type.clone(),
                            vdev_type: vdev_type.clone(),
                            disk_count,
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        pools.push(PoolInfo {
            name,
            path,
            status,
            capacity_bytes,
            topology,
        });
    }
    Ok(pools)
}

/// `midclt call disk.query`, with pool membership resolved via a GUID map
/// built from `zpool status` (unresolved disks default to `"none"`).
pub async fn query_disks(guid_to_pool: &std::collections::HashMap<String, String>) -> Result<Vec<DiskInfo>> {
    let value = midclt_call("disk.query", None).await?;
    let entries = value.as_array().cloned().unwrap_or_default();

    let mut disks = Vec::with_capacity(entries.len());
    for entry in entries {
        let name = entry
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let model = entry
            .get("model")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        let serial = entry
            .get("serial")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        let size_bytes = entry.get("size").and_then(Value::as_u64).unwrap_or(0);
        let zfs_guid = entry
            .get("zfs_guid")
            .and_then(Value::as_str)
            .map(|s| s.to_string());
        let pool = zfs_guid
            .as_ref()
            .and_then(|g| guid_to_pool.get(g))
            .cloned()
            .unwrap_or_else(|| "none".to_string());

        disks.push(DiskInfo {
            name,
            model,
            serial,
            size_bytes,
            zfs_guid,
            pool,
        });
    }
    Ok(disks)
}

/// `midclt call pool.dataset.query` with no filter, returning just the
/// dataset names. Used to confirm a deletion actually took effect, since
/// `pool.dataset.delete` can report success while the dataset is still
/// visible.
pub async fn list_datasets() -> Result<Vec<String>> {
    let value = midclt_call("pool.dataset.query", None).await?;
    Ok(value
        .as_array()
        .cloned()
        .unwrap_or_default()
        .into_iter()
        .filter_map(|entry| entry.get("name").and_then(Value::as_str).map(str::to_string))
        .collect())
}

/// Parse `zpool status <pool>` for a `cache` vdev group, confirming an
/// L2ARC device is attached.
pub async fn detect_l2arc(pool: &str) -> Result<bool> {
    let output = Command::new("zpool")
        .arg("status")
        .arg(pool)
        .output()
        .await
        .map_err(|e| PlatformError::Transport {
            cmd: format!("zpool status {pool}"),
            reason: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(PlatformError::Transport {
            cmd: format!("zpool status {pool}"),
            reason: String::from_utf8_lossy(&output.stderr).to_string(),
        }
        .into());
    }

    let text = String::from_utf8_lossy(&output.stdout);
    Ok(text.lines().any(|line| line.trim_start().starts_with("cache")))
}

/// Spawn a subprocess with piped stdout, returning the child for line-by-line
/// consumption. Used by the workload driver and both telemetry collectors.
pub fn spawn(program: &str, args: &[&str]) -> Result<Child> {
    Command::new(program)
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| {
            PlatformError::Transport {
                cmd: format!("{program} {}", args.join(" ")),
                reason: e.to_string(),
            }
            .into()
        })
}

/// Wrap a child's stdout in a line reader, for the telemetry ingest loops.
pub fn stdout_lines(child: &mut Child) -> Result<tokio::io::Lines<BufReader<tokio::process::ChildStdout>>> {
    let stdout = child.stdout.take().ok_or_else(|| PlatformError::Transport {
        cmd: "<subprocess>".to_string(),
        reason: "stdout was not piped".to_string(),
    })?;
    Ok(BufReader::new(stdout).lines())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn guid_lookup_defaults_to_none() {
        let map: HashMap<String, String> = HashMap::new();
        assert_eq!(map.get("missing"), None);
    }
}
