//! Adaptive batch sizing
//!
//! Batch sizes are seeded from the magnitude of the dataset, cut under
//! memory pressure, and nudged by recent batch durations. Memory is estimated
//! from the number of records processed; there is no direct introspection.

use crate::config::BatchingConfig;
use std::collections::VecDeque;
use std::time::Duration;

/// Approximate memory use of the running pipeline
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MemoryEstimate {
    /// Estimated bytes held
    pub estimated_bytes: u64,
    /// Budget the estimate is measured against
    pub budget_bytes: u64,
}

impl MemoryEstimate {
    /// Estimates memory as `records_processed * avg_bytes_per_record`
    pub fn from_records(records_processed: usize, avg_bytes_per_record: u64, budget_bytes: u64) -> Self {
        Self {
            estimated_bytes: (records_processed as u64).saturating_mul(avg_bytes_per_record),
            budget_bytes,
        }
    }

    /// Estimated utilization; values above 1.0 mean the budget is exceeded
    pub fn utilization(&self) -> f64 {
        if self.budget_bytes == 0 {
            return 0.0;
        }
        self.estimated_bytes as f64 / self.budget_bytes as f64
    }
}

/// Size bounds and thresholds used by [`plan_batch_size`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlannerLimits {
    pub min_batch_size: usize,
    pub max_batch_size: usize,
    pub memory_threshold: f64,
}

impl From<&BatchingConfig> for PlannerLimits {
    fn from(config: &BatchingConfig) -> Self {
        Self {
            min_batch_size: config.min_batch_size,
            max_batch_size: config.max_batch_size,
            memory_threshold: config.memory_threshold,
        }
    }
}

impl Default for PlannerLimits {
    fn default() -> Self {
        Self::from(&BatchingConfig::default())
    }
}

impl PlannerLimits {
    fn clamp(&self, size: usize) -> usize {
        size.clamp(self.min_batch_size, self.max_batch_size.max(self.min_batch_size))
    }
}

/// Seed size from dataset magnitude, clamped to the limits
pub fn seed_batch_size(total_records: usize, limits: &PlannerLimits) -> usize {
    let seed = match total_records {
        0..=99 => 10,
        100..=999 => 25,
        1_000..=9_999 => 50,
        _ => limits.max_batch_size,
    };
    limits.clamp(seed.min(limits.max_batch_size))
}

/// Computes the next batch size
///
/// * `previous` - size chosen for the previous batch, if any
/// * `recent_durations` - batch durations, oldest first
///
/// Under memory pressure the result is at most half of the smaller of the
/// seed and the previous batch, and duration-based growth is suppressed.
pub fn plan_batch_size(
    total_records: usize,
    recent_durations: &[Duration],
    memory: MemoryEstimate,
    previous: Option<usize>,
    limits: &PlannerLimits,
) -> usize {
    let seed = seed_batch_size(total_records, limits);
    if total_records == 0 {
        return seed;
    }

    let under_pressure = memory.utilization() > limits.memory_threshold;
    let mut size = seed;
    if under_pressure {
        let base = previous.map_or(seed, |prev| prev.min(seed));
        size = limits.clamp(base / 2);
    }

    if recent_durations.len() >= 3 {
        let all_time = average(recent_durations);
        if all_time > 0.0 {
            let recent = average(&recent_durations[recent_durations.len() - 3..]);
            if recent > all_time * 1.5 {
                size = limits.clamp(size * 4 / 5);
            } else if recent < all_time * 0.7 && !under_pressure {
                size = limits.clamp(size * 6 / 5);
            }
        }
    }

    size
}

fn average(durations: &[Duration]) -> f64 {
    if durations.is_empty() {
        return 0.0;
    }
    durations.iter().map(Duration::as_secs_f64).sum::<f64>() / durations.len() as f64
}

/// Stateful planner that remembers recent batch durations
#[derive(Debug, Clone)]
pub struct BatchPlanner {
    limits: PlannerLimits,
    avg_bytes_per_record: u64,
    memory_budget_bytes: u64,
    history_size: usize,
    durations: VecDeque<Duration>,
    last_size: Option<usize>,
    records_processed: usize,
    halve_next: bool,
}

impl BatchPlanner {
    /// Creates a planner from the batching configuration
    pub fn new(config: &BatchingConfig) -> Self {
        Self {
            limits: PlannerLimits::from(config),
            avg_bytes_per_record: config.avg_bytes_per_record,
            memory_budget_bytes: config.memory_budget_bytes,
            history_size: config.history_size.max(3),
            durations: VecDeque::with_capacity(config.history_size),
            last_size: None,
            records_processed: 0,
            halve_next: false,
        }
    }

    /// Current memory estimate
    pub fn memory_estimate(&self) -> MemoryEstimate {
        MemoryEstimate::from_records(
            self.records_processed,
            self.avg_bytes_per_record,
            self.memory_budget_bytes,
        )
    }

    /// Plans the next batch using the planner's own history and estimate
    pub fn next_batch_size(&mut self, total_records: usize) -> usize {
        self.next_batch_size_with(total_records, self.memory_estimate())
    }

    /// Plans the next batch against an explicit memory estimate
    pub fn next_batch_size_with(&mut self, total_records: usize, memory: MemoryEstimate) -> usize {
        let durations: Vec<Duration> = self.durations.iter().copied().collect();
        let mut size = plan_batch_size(
            total_records,
            &durations,
            memory,
            self.last_size,
            &self.limits,
        );

        if self.halve_next && total_records > 0 {
            self.halve_next = false;
            let base = self.last_size.map_or(size, |prev| prev.min(size));
            size = self.limits.clamp(base / 2);
            tracing::debug!(batch_size = size, "Applied one-shot batch reduction");
        }

        tracing::debug!(
            total_records,
            batch_size = size,
            memory_utilization = memory.utilization(),
            "Planned batch size"
        );
        self.last_size = Some(size);
        size
    }

    /// Records a finished batch
    pub fn record_batch(&mut self, records: usize, elapsed: Duration) {
        self.records_processed += records;
        if self.durations.len() == self.history_size {
            self.durations.pop_front();
        }
        self.durations.push_back(elapsed);
    }

    /// Halves the next planned batch once; used as a memory mitigation
    pub fn request_reduction(&mut self) {
        self.halve_next = true;
    }

    /// Recorded durations, oldest first
    pub fn durations(&self) -> impl Iterator<Item = &Duration> {
        self.durations.iter()
    }

    /// Size chosen by the last call to [`Self::next_batch_size`]
    pub fn last_size(&self) -> Option<usize> {
        self.last_size
    }

    /// Records processed so far
    pub fn records_processed(&self) -> usize {
        self.records_processed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn calm() -> MemoryEstimate {
        MemoryEstimate::from_records(0, 2048, 1024 * 1024)
    }

    fn ms(values: &[u64]) -> Vec<Duration> {
        values.iter().map(|v| Duration::from_millis(*v)).collect()
    }

    #[test_case(0, 10)]
    #[test_case(50, 10)]
    #[test_case(500, 25)]
    #[test_case(5_000, 50)]
    #[test_case(50_000, 100)]
    fn test_seed_table(total: usize, expected: usize) {
        assert_eq!(seed_batch_size(total, &PlannerLimits::default()), expected);
    }

    #[test]
    fn test_seed_respects_min_and_max() {
        let limits = PlannerLimits {
            min_batch_size: 20,
            max_batch_size: 40,
            memory_threshold: 0.8,
        };
        assert_eq!(seed_batch_size(10, &limits), 20);
        assert_eq!(seed_batch_size(5_000, &limits), 40);
        assert_eq!(seed_batch_size(500_000, &limits), 40);
    }

    #[test]
    fn test_zero_records_returns_seed() {
        let hot = MemoryEstimate {
            estimated_bytes: 10,
            budget_bytes: 1,
        };
        assert_eq!(
            plan_batch_size(0, &ms(&[1, 1, 100]), hot, Some(40), &PlannerLimits::default()),
            10
        );
    }

    #[test]
    fn test_zero_durations_return_seed() {
        let size = plan_batch_size(500, &ms(&[0, 0, 0, 0]), calm(), None, &PlannerLimits::default());
        assert_eq!(size, 25);
    }

    #[test]
    fn test_memory_pressure_halves() {
        let hot = MemoryEstimate {
            estimated_bytes: 90,
            budget_bytes: 100,
        };
        let size = plan_batch_size(5_000, &[], hot, None, &PlannerLimits::default());
        assert_eq!(size, 25);
    }

    #[test]
    fn test_memory_pressure_never_below_min() {
        let hot = MemoryEstimate {
            estimated_bytes: 95,
            budget_bytes: 100,
        };
        let size = plan_batch_size(50, &[], hot, Some(6), &PlannerLimits::default());
        assert_eq!(size, 5);
    }

    #[test]
    fn test_slow_recent_batches_shrink() {
        let durations = ms(&[100, 100, 100, 100, 100, 400, 400, 400]);
        let size = plan_batch_size(5_000, &durations, calm(), None, &PlannerLimits::default());
        assert_eq!(size, 40);
    }

    #[test]
    fn test_fast_recent_batches_grow() {
        let durations = ms(&[400, 400, 400, 400, 400, 100, 100, 100]);
        let size = plan_batch_size(5_000, &durations, calm(), None, &PlannerLimits::default());
        assert_eq!(size, 60);
    }

    #[test]
    fn test_growth_is_bounded_by_max() {
        let durations = ms(&[400, 400, 400, 400, 100, 100, 100]);
        let size = plan_batch_size(50_000, &durations, calm(), None, &PlannerLimits::default());
        assert_eq!(size, 100);
    }

    #[test]
    fn test_memory_breach_mid_run_cuts_at_least_half() {
        let config = BatchingConfig {
            memory_budget_bytes: 4_000 * 2048,
            ..BatchingConfig::default()
        };
        let mut planner = BatchPlanner::new(&config);

        let mut previous = 0;
        while planner.memory_estimate().utilization() <= config.memory_threshold {
            previous = planner.next_batch_size(5_000);
            planner.record_batch(previous, Duration::from_millis(10));
        }

        let next = planner.next_batch_size(5_000);
        assert!(next * 2 <= previous, "{next} is not at most half of {previous}");
    }

    #[test]
    fn test_requested_reduction_is_one_shot() {
        let mut planner = BatchPlanner::new(&BatchingConfig::default());
        let first = planner.next_batch_size(5_000);
        assert_eq!(first, 50);
        planner.request_reduction();
        assert_eq!(planner.next_batch_size(5_000), 25);
        assert_eq!(planner.next_batch_size(5_000), 50);
    }

    #[test]
    fn test_history_is_bounded() {
        let config = BatchingConfig::default();
        let mut planner = BatchPlanner::new(&config);
        for i in 0..30 {
            planner.record_batch(1, Duration::from_millis(i));
        }
        assert_eq!(planner.durations().count(), config.history_size);
        assert_eq!(planner.durations().next(), Some(&Duration::from_millis(10)));
        assert_eq!(planner.records_processed(), 30);
    }
}
