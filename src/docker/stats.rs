//! Resource statistics derived from daemon stats samples.

use bollard::models::ContainerStatsResponse;

/// One resource usage snapshot of a running container.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DockerStats {
    /// CPU usage in percent, scaled by the number of online CPUs
    pub cpu_percent: f64,
    /// Memory usage in bytes
    pub memory_usage: u64,
    /// Memory limit in bytes
    pub memory_limit: u64,
    /// Memory usage as a share of the limit, in percent
    pub memory_percent: f64,
    /// Bytes received over all networks
    pub network_rx: u64,
    /// Bytes transmitted over all networks
    pub network_tx: u64,
    /// Bytes read from block devices
    pub blk_read: u64,
    /// Bytes written to block devices
    pub blk_write: u64,
}

impl DockerStats {
    /// Derive usage numbers from one daemon stats sample.
    ///
    /// CPU percent needs the sample's precpu snapshot; when the daemon omits
    /// it (first sample after start) the percentage is zero.
    pub fn from_sample(sample: &ContainerStatsResponse) -> Self {
        let cpu_total = sample
            .cpu_stats
            .as_ref()
            .and_then(|cpu| cpu.cpu_usage.as_ref())
            .and_then(|usage| usage.total_usage)
            .unwrap_or(0);
        let precpu_total = sample
            .precpu_stats
            .as_ref()
            .and_then(|cpu| cpu.cpu_usage.as_ref())
            .and_then(|usage| usage.total_usage)
            .unwrap_or(0);
        let system = sample
            .cpu_stats
            .as_ref()
            .and_then(|cpu| cpu.system_cpu_usage)
            .unwrap_or(0);
        let presystem = sample
            .precpu_stats
            .as_ref()
            .and_then(|cpu| cpu.system_cpu_usage)
            .unwrap_or(0);
        let online_cpus = sample
            .cpu_stats
            .as_ref()
            .and_then(|cpu| cpu.online_cpus)
            .unwrap_or(1)
            .max(1);

        let cpu_delta = cpu_total.saturating_sub(precpu_total);
        let system_delta = system.saturating_sub(presystem);
        let cpu_percent = if system_delta > 0 && cpu_delta > 0 {
            (cpu_delta as f64 / system_delta as f64) * online_cpus as f64 * 100.0
        } else {
            0.0
        };

        let memory_usage = sample
            .memory_stats
            .as_ref()
            .and_then(|memory| memory.usage)
            .unwrap_or(0);
        let memory_limit = sample
            .memory_stats
            .as_ref()
            .and_then(|memory| memory.limit)
            .unwrap_or(0);
        let memory_percent = if memory_limit > 0 {
            memory_usage as f64 / memory_limit as f64 * 100.0
        } else {
            0.0
        };

        let (network_rx, network_tx) = sample
            .networks
            .as_ref()
            .map(|networks| {
                networks.values().fold((0u64, 0u64), |(rx, tx), interface| {
                    (
                        rx + interface.rx_bytes.unwrap_or(0),
                        tx + interface.tx_bytes.unwrap_or(0),
                    )
                })
            })
            .unwrap_or((0, 0));

        let (blk_read, blk_write) = sample
            .blkio_stats
            .as_ref()
            .and_then(|blkio| blkio.io_service_bytes_recursive.as_ref())
            .map(|entries| {
                entries.iter().fold((0u64, 0u64), |(read, write), entry| {
                    let value = entry.value.unwrap_or(0);
                    match entry.op.as_deref() {
                        Some("read") | Some("Read") => (read + value, write),
                        Some("write") | Some("Write") => (read, write + value),
                        _ => (read, write),
                    }
                })
            })
            .unwrap_or((0, 0));

        Self {
            cpu_percent,
            memory_usage,
            memory_limit,
            memory_percent,
            network_rx,
            network_tx,
            blk_read,
            blk_write,
        }
    }
}
