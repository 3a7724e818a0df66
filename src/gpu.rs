//! Accelerator inventory reported by the system GPU tool
//!
//! This is diagnostics only: the engine picks its own device. A machine
//! without `nvidia-smi` simply reports an empty inventory.

use std::process::Command;

use tracing::debug;

const QUERY_ARGS: [&str; 2] = [
    "--query-gpu=index,name,memory.total,memory.used",
    "--format=csv,noheader,nounits",
];

/// One accelerator as reported by `nvidia-smi`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceReport {
    /// Device ordinal.
    pub index: usize,
    /// Product name.
    pub name: String,
    /// Total memory in MiB.
    pub memory_total_mib: u64,
    /// Memory in use in MiB.
    pub memory_used_mib: u64,
}

impl DeviceReport {
    /// Free memory in MiB.
    pub fn memory_free_mib(&self) -> u64 {
        self.memory_total_mib.saturating_sub(self.memory_used_mib)
    }
}

/// Query the accelerator inventory.
///
/// Any failure to run or parse the tool degrades to an empty list; callers
/// treat that as "no accelerator visible".
pub fn query_devices() -> Vec<DeviceReport> {
    let output = match Command::new("nvidia-smi").args(QUERY_ARGS).output() {
        Ok(output) => output,
        Err(e) => {
            debug!(error = %e, "nvidia-smi not available");
            return Vec::new();
        }
    };
    if !output.status.success() {
        debug!(status = %output.status, "nvidia-smi query failed");
        return Vec::new();
    }
    parse_query_output(&String::from_utf8_lossy(&output.stdout))
}

fn parse_query_output(raw: &str) -> Vec<DeviceReport> {
    raw.lines().filter_map(parse_line).collect()
}

fn parse_line(line: &str) -> Option<DeviceReport> {
    let mut fields = line.split(',').map(str::trim);
    let index = fields.next()?.parse().ok()?;
    let name = fields.next()?.to_string();
    let memory_total_mib = fields.next()?.parse().ok()?;
    let memory_used_mib = fields.next()?.parse().ok()?;
    if name.is_empty() {
        return None;
    }
    Some(DeviceReport {
        index,
        name,
        memory_total_mib,
        memory_used_mib,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_query_output() {
        let raw = "0, NVIDIA A100-SXM4-80GB, 81920, 1536\n\
                   1, NVIDIA A100-SXM4-80GB, 81920, 0\n";
        let devices = parse_query_output(raw);
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].index, 0);
        assert_eq!(devices[0].name, "NVIDIA A100-SXM4-80GB");
        assert_eq!(devices[0].memory_total_mib, 81920);
        assert_eq!(devices[0].memory_free_mib(), 80384);
        assert_eq!(devices[1].memory_used_mib, 0);
    }

    #[test]
    fn test_parse_skips_malformed_lines() {
        let raw = "0, NVIDIA T4, 15360, 100\n\
                   not a csv line\n\
                   oops, , 1, 2\n";
        let devices = parse_query_output(raw);
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].name, "NVIDIA T4");
    }

    #[test]
    fn test_parse_empty_output() {
        assert!(parse_query_output("").is_empty());
    }
}
