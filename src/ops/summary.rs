//! Variance and standard deviation.

opcodes! {
    pub enum SummaryStatsOp ("summary_stats") {
        Variance = 0,
        StandardDeviation = 1,
    }
}

/// Running count, mean and sum of squared deviations (Welford).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Moments {
    pub n: u64,
    pub mean: f64,
    pub m2: f64,
}

impl Moments {
    #[inline]
    pub fn push(mut self, x: f64) -> Self {
        self.n += 1;
        let delta = x - self.mean;
        self.mean += delta / self.n as f64;
        self.m2 += delta * (x - self.mean);
        self
    }

    /// Combine two partial states (Chan et al.).
    #[inline]
    pub fn merge(self, other: Self) -> Self {
        if self.n == 0 {
            return other;
        }
        if other.n == 0 {
            return self;
        }
        let n = self.n + other.n;
        let delta = other.mean - self.mean;
        let mean = self.mean + delta * other.n as f64 / n as f64;
        let m2 = self.m2 + other.m2 + delta * delta * (self.n as f64 * other.n as f64) / n as f64;
        Self { n, mean, m2 }
    }

    /// Variance; `bias_corrected` divides by `n - 1` and yields 0 for
    /// fewer than two samples.
    pub fn variance(&self, bias_corrected: bool) -> f64 {
        if bias_corrected {
            if self.n <= 1 {
                return 0.0;
            }
            self.m2 / (self.n - 1) as f64
        } else {
            self.m2 / self.n as f64
        }
    }
}

impl SummaryStatsOp {
    pub fn finish(self, moments: &Moments, bias_corrected: bool) -> f64 {
        let var = moments.variance(bias_corrected);
        match self {
            SummaryStatsOp::Variance => var,
            SummaryStatsOp::StandardDeviation => var.sqrt(),
        }
    }
}
