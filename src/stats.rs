//! Latency summary over the per-round timing lines.

use crate::round::RoundReport;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatencySummary {
    pub rounds: usize,
    pub mean_ms: f64,
    /// Population standard deviation.
    pub std_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
}

impl LatencySummary {
    /// Summarize a run, or `None` if it executed no rounds.
    pub fn from_reports(reports: &[RoundReport]) -> Option<Self> {
        let mut acc = LatencyAccumulator::default();
        reports.iter().for_each(|r| acc.record(r));
        acc.finish()
    }

    /// Summarize captured stdout. Lines that are not timing lines are skipped.
    pub fn from_lines<'a, I>(lines: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut acc = LatencyAccumulator::default();
        lines
            .into_iter()
            .filter_map(RoundReport::parse_line)
            .for_each(|r| acc.record(&r));
        acc.finish()
    }
}

/// Running latency statistics in constant space.
///
/// Uses Welford's update so long runs do not lose precision to a large
/// sum of squares.
#[derive(Debug, Clone, Copy)]
pub struct LatencyAccumulator {
    rounds: usize,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl Default for LatencyAccumulator {
    fn default() -> Self {
        Self {
            rounds: 0,
            mean: 0.0,
            m2: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }
}

impl LatencyAccumulator {
    pub fn record(&mut self, report: &RoundReport) {
        self.push(report.elapsed_ms());
    }

    pub fn push(&mut self, sample_ms: f64) {
        self.rounds += 1;
        let delta = sample_ms - self.mean;
        self.mean += delta / self.rounds as f64;
        self.m2 += delta * (sample_ms - self.mean);
        self.min = self.min.min(sample_ms);
        self.max = self.max.max(sample_ms);
    }

    pub fn rounds(&self) -> usize {
        self.rounds
    }

    /// `None` until at least one sample was pushed.
    pub fn finish(&self) -> Option<LatencySummary> {
        if self.rounds == 0 {
            return None;
        }
        Some(LatencySummary {
            rounds: self.rounds,
            mean_ms: self.mean,
            std_ms: (self.m2 / self.rounds as f64).sqrt(),
            min_ms: self.min,
            max_ms: self.max,
        })
    }
}

impl std::fmt::Display for LatencySummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} rounds: mean {:.6} ms, std {:.6} ms, min {:.6} ms, max {:.6} ms",
            self.rounds, self.mean_ms, self.std_ms, self.min_ms, self.max_ms
        )
    }
}
