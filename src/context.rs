//! Execution-context handle threaded through every executor call.

use std::sync::{Arc, OnceLock};

use ndexec_shape::{Result, ShapeInfo, TadCache, TadPack};

use crate::config::ExecConfig;

/// Configuration plus the tad cache shared by the calls that use it.
///
/// Kernels are stateless; the context only supplies thresholds and memoized
/// tad tables. Arrays hold an `Arc<LaunchContext>` and pass it to the
/// executor.
#[derive(Debug)]
pub struct LaunchContext {
    config: ExecConfig,
    tads: TadCache,
}

static DEFAULT_CONTEXT: OnceLock<Arc<LaunchContext>> = OnceLock::new();

impl LaunchContext {
    pub fn new(config: ExecConfig) -> Self {
        let tads = TadCache::new(config.tad_cache_capacity);
        Self { config, tads }
    }

    /// Process-wide context configured from the environment on first use.
    pub fn default_context() -> Arc<LaunchContext> {
        Arc::clone(DEFAULT_CONTEXT.get_or_init(|| {
            let config = ExecConfig::from_env();
            tracing::debug!(?config, "initializing default launch context");
            Arc::new(LaunchContext::new(config))
        }))
    }

    #[inline]
    pub fn config(&self) -> &ExecConfig {
        &self.config
    }

    #[inline]
    pub fn tad_cache(&self) -> &TadCache {
        &self.tads
    }

    /// Tad pack of `shape` along `axes`, served from the cache.
    pub fn tad_pack(&self, shape: &ShapeInfo, axes: &[isize]) -> Result<Arc<TadPack>> {
        self.tads.get(shape, axes)
    }

    /// Whether an element loop of `len` iterations should fan out.
    #[inline]
    pub(crate) fn parallel_elements(&self, len: usize) -> bool {
        cfg!(feature = "parallel") && len > self.config.elementwise_threshold
    }

    /// Whether a loop over `num_tads` tads should fan out.
    #[inline]
    pub(crate) fn parallel_tads(&self, num_tads: usize) -> bool {
        cfg!(feature = "parallel") && num_tads > self.config.tad_threshold
    }
}

impl Default for LaunchContext {
    fn default() -> Self {
        Self::new(ExecConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndexec_shape::{DataType, Order};

    #[test]
    fn test_default_context_is_shared() {
        let a = LaunchContext::default_context();
        let b = LaunchContext::default_context();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_tad_pack_is_memoized() {
        let ctx = LaunchContext::new(ExecConfig::default().with_tad_cache_capacity(2));
        let s = ShapeInfo::new(&[3, 4], Order::C, DataType::Double).unwrap();
        let a = ctx.tad_pack(&s, &[1]).unwrap();
        let b = ctx.tad_pack(&s, &[1]).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(ctx.tad_cache().capacity(), 2);
    }

    #[test]
    fn test_thresholds() {
        let ctx = LaunchContext::new(ExecConfig::default().with_elementwise_threshold(10));
        assert!(!ctx.parallel_elements(10));
        assert_eq!(ctx.parallel_elements(11), cfg!(feature = "parallel"));
    }
}
