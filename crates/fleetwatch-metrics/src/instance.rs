//! Mapping of vLLM instance metrics onto `InstanceRecord` fields.

use fleetwatch_state::InstanceRecord;

use crate::exposition::Sample;

pub const GPU_MEMORY_USED_BYTES: &str = "vllm:gpu_memory_usage_bytes";
pub const GPU_MEMORY_TOTAL_BYTES: &str = "vllm:gpu_memory_total_bytes";
pub const REQUESTS_RUNNING: &str = "vllm:num_requests_running";
pub const QUEUE_LENGTH: &str = "vllm:queue_length";
pub const CACHE_HIT_RATE: &str = "vllm:cache_hit_rate";
pub const AVG_TOKENS_PER_SEC: &str = "vllm:avg_tokens_per_sec";

/// Label carrying the served model on vLLM samples.
pub const MODEL_LABEL: &str = "model_name";

const BYTES_PER_GB: f64 = (1u64 << 30) as f64;

/// Fields recovered from one instance's `/metrics` body.
///
/// `None` means the metric was absent (or unusable) and the record's
/// previous value must be kept.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstanceMetrics {
    pub gpu_memory_used_gb: Option<f64>,
    pub gpu_memory_total_gb: Option<f64>,
    pub active_requests: Option<u64>,
    pub queue_length: Option<u64>,
    pub cache_hit_rate: Option<f64>,
    pub tokens_per_second: Option<f64>,
}

impl InstanceMetrics {
    /// Extract recognised metrics, keeping the last matching sample of each.
    ///
    /// When `model` is set, samples that carry a `model_name` label for a
    /// different model are ignored. Unlabelled samples always apply.
    pub fn from_samples<I>(samples: I, model: Option<&str>) -> Self
    where
        I: IntoIterator<Item = Sample>,
    {
        let mut out = Self::default();
        for sample in samples {
            if let (Some(want), Some(have)) = (model, sample.label(MODEL_LABEL)) {
                if want != have {
                    continue;
                }
            }

            let value = sample.value;
            match sample.name.as_str() {
                GPU_MEMORY_USED_BYTES => {
                    out.gpu_memory_used_gb = gauge(value).map(|v| v / BYTES_PER_GB);
                }
                GPU_MEMORY_TOTAL_BYTES => {
                    out.gpu_memory_total_gb = gauge(value).map(|v| v / BYTES_PER_GB);
                }
                REQUESTS_RUNNING => out.active_requests = count(value),
                QUEUE_LENGTH => out.queue_length = count(value),
                CACHE_HIT_RATE => out.cache_hit_rate = gauge(value),
                AVG_TOKENS_PER_SEC => out.tokens_per_second = gauge(value),
                _ => {}
            }
        }
        out
    }

    /// Overwrite the fields that were present; leave the rest untouched.
    pub fn apply(&self, record: &mut InstanceRecord) {
        if let Some(v) = self.gpu_memory_used_gb {
            record.gpu_memory_used_gb = v;
        }
        if let Some(v) = self.gpu_memory_total_gb {
            record.gpu_memory_total_gb = v;
        }
        if let Some(v) = self.active_requests {
            record.active_requests = v;
        }
        if let Some(v) = self.queue_length {
            record.queue_length = v;
        }
        if let Some(v) = self.cache_hit_rate {
            record.cache_hit_rate = v;
        }
        if let Some(v) = self.tokens_per_second {
            record.tokens_per_second = v;
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// A finite gauge value.
pub(crate) fn gauge(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

/// A finite, non-negative value truncated to an integer count.
pub(crate) fn count(value: f64) -> Option<u64> {
    (value.is_finite() && value >= 0.0).then(|| value as u64)
}
