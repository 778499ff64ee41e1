//! Realtime engine tuning knobs.

use serde::{Deserialize, Serialize};

/// Performance and backpressure settings for the realtime engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerfConfig {
    /// Maximum number of fields accepted in one inbound frame.
    #[serde(default = "default_msg_args_cap")]
    pub msg_args_cap: usize,
    /// Maximum inbound frame size in bytes.
    #[serde(default = "default_msg_bytes_cap")]
    pub msg_bytes_cap: usize,
    /// Right-shift applied to the global subscription count to derive the
    /// per-forwarder pacing delay in milliseconds.
    #[serde(default = "default_usem_delay_shift_bits")]
    pub usem_delay_shift_bits: u32,
    /// Send the fresh seat count directly to the chooser on a successful
    /// hold, without routing through the coalescing signal.
    #[serde(default = "default_true")]
    pub propagate_immediate: bool,
    /// Capacity of each session's outbound and update queues.
    #[serde(default = "default_senq")]
    pub senq: usize,
    /// How long a new session waits for a preempted session of the same
    /// user to finish tearing down, in milliseconds.
    #[serde(default = "default_preempt_grace_ms")]
    pub preempt_grace_ms: u64,
}

impl Default for PerfConfig {
    fn default() -> Self {
        Self {
            msg_args_cap: default_msg_args_cap(),
            msg_bytes_cap: default_msg_bytes_cap(),
            usem_delay_shift_bits: default_usem_delay_shift_bits(),
            propagate_immediate: true,
            senq: default_senq(),
            preempt_grace_ms: default_preempt_grace_ms(),
        }
    }
}

fn default_msg_args_cap() -> usize {
    4
}

fn default_msg_bytes_cap() -> usize {
    1024
}

fn default_usem_delay_shift_bits() -> u32 {
    6
}

fn default_true() -> bool {
    true
}

fn default_senq() -> usize {
    64
}

fn default_preempt_grace_ms() -> u64 {
    3000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let perf = PerfConfig::default();
        assert_eq!(perf.msg_args_cap, 4);
        assert_eq!(perf.msg_bytes_cap, 1024);
        assert_eq!(perf.usem_delay_shift_bits, 6);
        assert!(perf.propagate_immediate);
        assert_eq!(perf.senq, 64);
    }
}
