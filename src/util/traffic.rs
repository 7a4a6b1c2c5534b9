use std::time::Duration;

/// Bytes per megabyte as throughput reports count them.
pub const MEGABYTE: f64 = 1_048_576.0;

/// Running packet/byte counters for one transfer.
#[derive(Debug, Default, Clone, Copy)]
pub struct Traffic {
    packets: u64,
    bytes: u64,
}

impl Traffic {
    pub fn new(packets: u64, bytes: u64) -> Self {
        Self { packets, bytes }
    }

    pub fn inc_traffic(&mut self, bytes: u64) {
        self.packets += 1;
        self.bytes += bytes;
    }

    pub fn packets(&self) -> u64 {
        self.packets
    }

    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    /// Whole-run rate over `elapsed`.
    pub fn rate(&self, elapsed: Duration) -> TrafficRate {
        let secs = elapsed.as_secs_f64();
        if secs == 0.0 {
            return TrafficRate::default();
        }
        TrafficRate {
            pps: self.packets as f64 / secs,
            mbps: self.bytes as f64 / MEGABYTE / secs,
        }
    }
}

/// Packets and megabytes per second over the same elapsed time.
#[derive(Debug, Default, Clone, Copy)]
pub struct TrafficRate {
    pub pps: f64,
    pub mbps: f64,
}
