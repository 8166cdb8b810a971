//! Execution configuration.
//!
//! Defaults match the thresholds the kernels were tuned with; every field can
//! be overridden from the environment through [`ExecConfig::from_env`].

use std::str::FromStr;

use ndexec_traits::DataType;

/// Minimum number of elements before element loops fan out to rayon.
pub const DEFAULT_ELEMENTWISE_THRESHOLD: usize = 1 << 15;

/// Minimum number of tads before per-tad loops fan out to rayon.
pub const DEFAULT_TAD_THRESHOLD: usize = 32;

/// Default number of tad packs kept by the cache.
pub const DEFAULT_TAD_CACHE_CAPACITY: usize = 1024;

pub const ENV_ELEMENTWISE_THRESHOLD: &str = "NDEXEC_ELEMENTWISE_THRESHOLD";
pub const ENV_TAD_THRESHOLD: &str = "NDEXEC_TAD_THRESHOLD";
pub const ENV_TAD_CACHE_CAPACITY: &str = "NDEXEC_TAD_CACHE_CAPACITY";
pub const ENV_TRIPLE_DISPATCH: &str = "NDEXEC_TRIPLE_DISPATCH";
pub const ENV_DEFAULT_FLOAT: &str = "NDEXEC_DEFAULT_FLOAT";

/// Tunables consulted by the executor.
#[derive(Clone, Debug, PartialEq)]
pub struct ExecConfig {
    /// Element count above which element loops run in parallel.
    pub elementwise_threshold: usize,
    /// Tad count above which per-tad loops run in parallel.
    pub tad_threshold: usize,
    /// Capacity of the tad cache owned by a [`crate::LaunchContext`].
    pub tad_cache_capacity: usize,
    /// Allow independent X/Y/Z types for pairwise, broadcast and scalar
    /// operations. Only honored when built with the `experimental` feature.
    pub triple_dispatch: bool,
    /// Output type of float-valued operations on non-float inputs.
    pub default_float: DataType,
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            elementwise_threshold: DEFAULT_ELEMENTWISE_THRESHOLD,
            tad_threshold: DEFAULT_TAD_THRESHOLD,
            tad_cache_capacity: DEFAULT_TAD_CACHE_CAPACITY,
            triple_dispatch: false,
            default_float: DataType::Float,
        }
    }
}

impl ExecConfig {
    /// Defaults overridden by the `NDEXEC_*` environment variables.
    ///
    /// Unparsable values are ignored with a warning.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by `lookup(key)` for each `NDEXEC_*` key.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(v) = parse_var(&lookup, ENV_ELEMENTWISE_THRESHOLD) {
            config.elementwise_threshold = v;
        }
        if let Some(v) = parse_var(&lookup, ENV_TAD_THRESHOLD) {
            config.tad_threshold = v;
        }
        if let Some(v) = parse_var::<usize>(&lookup, ENV_TAD_CACHE_CAPACITY) {
            config.tad_cache_capacity = v.max(1);
        }
        if let Some(raw) = lookup(ENV_TRIPLE_DISPATCH) {
            config.triple_dispatch = matches!(raw.trim(), "1" | "true" | "on" | "yes");
        }
        if let Some(dtype) = parse_var::<DataType>(&lookup, ENV_DEFAULT_FLOAT) {
            if dtype.is_float() {
                config.default_float = dtype;
            } else {
                tracing::warn!(%dtype, "{ENV_DEFAULT_FLOAT} must name a float type; ignored");
            }
        }
        config
    }

    pub fn with_elementwise_threshold(mut self, threshold: usize) -> Self {
        self.elementwise_threshold = threshold;
        self
    }

    pub fn with_tad_threshold(mut self, threshold: usize) -> Self {
        self.tad_threshold = threshold;
        self
    }

    pub fn with_tad_cache_capacity(mut self, capacity: usize) -> Self {
        self.tad_cache_capacity = capacity.max(1);
        self
    }

    pub fn with_triple_dispatch(mut self, enabled: bool) -> Self {
        self.triple_dispatch = enabled;
        self
    }

    pub fn with_default_float(mut self, dtype: DataType) -> Self {
        if dtype.is_float() {
            self.default_float = dtype;
        }
        self
    }

    /// Whether independent X/Y/Z dispatch is active for this build.
    pub fn triple_dispatch_active(&self) -> bool {
        cfg!(feature = "experimental") && self.triple_dispatch
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = %raw, "unparsable configuration value ignored");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let c = ExecConfig::default();
        assert_eq!(c.elementwise_threshold, 1 << 15);
        assert_eq!(c.default_float, DataType::Float);
        assert!(!c.triple_dispatch_active());
    }

    #[test]
    fn test_overrides() {
        let c = ExecConfig::from_lookup(lookup(&[
            (ENV_ELEMENTWISE_THRESHOLD, "64"),
            (ENV_TAD_THRESHOLD, " 4 "),
            (ENV_TAD_CACHE_CAPACITY, "0"),
            (ENV_DEFAULT_FLOAT, "double"),
        ]));
        assert_eq!(c.elementwise_threshold, 64);
        assert_eq!(c.tad_threshold, 4);
        assert_eq!(c.tad_cache_capacity, 1);
        assert_eq!(c.default_float, DataType::Double);
    }

    #[test]
    fn test_bad_values_are_ignored() {
        let c = ExecConfig::from_lookup(lookup(&[
            (ENV_ELEMENTWISE_THRESHOLD, "lots"),
            (ENV_DEFAULT_FLOAT, "int32"),
        ]));
        assert_eq!(c, ExecConfig::default());
    }

    #[test]
    fn test_triple_dispatch_needs_feature() {
        let c = ExecConfig::default().with_triple_dispatch(true);
        assert_eq!(c.triple_dispatch_active(), cfg!(feature = "experimental"));
    }
}
