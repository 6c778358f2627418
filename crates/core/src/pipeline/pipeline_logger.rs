use std::collections::BTreeMap;
use std::time::Instant;

/// Observer for stage timings, metrics and progress of a swap session.
///
/// Keeps the scheduler free of any particular reporting mechanism; the
/// CLI logs through the `log` facade while tests discard everything.
pub trait PipelineLogger: Send {
    /// Report emitted frames. `total` is `None` for live sources.
    fn progress(&mut self, current: usize, total: Option<usize>);

    /// Record how long a named stage took for one frame.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// Record a sampled value (faces per frame, queue depth).
    fn metric(&mut self, name: &str, value: f64);

    /// Add to a session-wide counter (dropped frames, skipped faces).
    fn count(&mut self, name: &str, delta: u64);

    fn info(&mut self, message: &str);

    /// Emit an end-of-session summary. Default: no-op.
    fn summary(&self) {}
}

/// Discards all events.
pub struct NullPipelineLogger;

impl PipelineLogger for NullPipelineLogger {
    fn progress(&mut self, _current: usize, _total: Option<usize>) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
    fn count(&mut self, _name: &str, _delta: u64) {}
    fn info(&mut self, _message: &str) {}
}

/// Logs progress through `log::info!` every `throttle_frames` frames and
/// aggregates timings, samples and counters into a summary.
pub struct StdoutPipelineLogger {
    throttle_frames: usize,
    timings: BTreeMap<String, Vec<f64>>,
    metrics: BTreeMap<String, Vec<f64>>,
    counters: BTreeMap<String, u64>,
    start_time: Instant,
    frames: usize,
    messages: Vec<String>,
}

impl StdoutPipelineLogger {
    pub fn new(throttle_frames: usize) -> Self {
        Self {
            throttle_frames: throttle_frames.max(1),
            timings: BTreeMap::new(),
            metrics: BTreeMap::new(),
            counters: BTreeMap::new(),
            start_time: Instant::now(),
            frames: 0,
            messages: Vec::new(),
        }
    }

    /// Returns the formatted summary, or `None` if nothing was recorded.
    pub fn summary_string(&self) -> Option<String> {
        if self.timings.is_empty() && self.metrics.is_empty() && self.counters.is_empty() {
            return None;
        }

        let elapsed_ms = self.start_time.elapsed().as_secs_f64() * 1000.0;
        let mut lines = vec![format!(
            "Session summary ({} frames, {:.1}s total):",
            self.frames,
            elapsed_ms / 1000.0
        )];

        for (stage, durations) in &self.timings {
            let total_ms: f64 = durations.iter().sum();
            let avg_ms = mean(durations);
            let pct = if elapsed_ms > 0.0 {
                total_ms / elapsed_ms * 100.0
            } else {
                0.0
            };
            lines.push(format!(
                "  {stage:12}: avg {avg_ms:6.1}ms  total {total_ms:7.0}ms  ({pct:4.1}%)"
            ));
        }

        for (name, values) in &self.metrics {
            lines.push(format!("  {name}: avg {:.1}", mean(values)));
        }

        for (name, value) in &self.counters {
            lines.push(format!("  {name}: {value}"));
        }

        if self.frames > 0 && elapsed_ms > 0.0 {
            let fps = self.frames as f64 / (elapsed_ms / 1000.0);
            lines.push(format!("  Throughput: {fps:.1} fps"));
        }

        Some(lines.join("\n"))
    }

    pub fn timings_for(&self, stage: &str) -> Option<&[f64]> {
        self.timings.get(stage).map(|v| v.as_slice())
    }

    pub fn metrics_for(&self, name: &str) -> Option<&[f64]> {
        self.metrics.get(name).map(|v| v.as_slice())
    }

    pub fn counter(&self, name: &str) -> u64 {
        self.counters.get(name).copied().unwrap_or(0)
    }
}

impl Default for StdoutPipelineLogger {
    fn default() -> Self {
        Self::new(30)
    }
}

impl PipelineLogger for StdoutPipelineLogger {
    fn progress(&mut self, current: usize, total: Option<usize>) {
        self.frames = current;
        match total {
            Some(total) if total > 0 => {
                if current % self.throttle_frames == 0 || current == total {
                    let pct = current as f64 / total as f64 * 100.0;
                    log::info!("Processing: {current}/{total} frames ({pct:.1}%)");
                }
            }
            _ => {
                if current % self.throttle_frames == 0 {
                    log::info!("Processing: {current} frames");
                }
            }
        }
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        self.timings
            .entry(stage.to_string())
            .or_default()
            .push(duration_ms);
    }

    fn metric(&mut self, name: &str, value: f64) {
        self.metrics.entry(name.to_string()).or_default().push(value);
    }

    fn count(&mut self, name: &str, delta: u64) {
        *self.counters.entry(name.to_string()).or_default() += delta;
    }

    fn info(&mut self, message: &str) {
        self.messages.push(message.to_string());
        log::info!("{message}");
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n\n{text}");
        }
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_null_logger_accepts_everything() {
        let mut logger = NullPipelineLogger;
        logger.progress(1, Some(10));
        logger.progress(1, None);
        logger.timing("detect", 5.0);
        logger.metric("faces", 3.0);
        logger.count("frames_dropped", 2);
        logger.info("hello");
        logger.summary();
    }

    #[test]
    fn test_timing_records_values() {
        let mut logger = StdoutPipelineLogger::new(10);
        logger.timing("analyse", 20.0);
        logger.timing("analyse", 30.0);
        logger.timing("composite", 5.0);

        assert_eq!(logger.timings_for("analyse").unwrap(), &[20.0, 30.0]);
        assert_eq!(logger.timings_for("composite").unwrap(), &[5.0]);
        assert!(logger.timings_for("swap").is_none());
    }

    #[test]
    fn test_metric_average_in_summary() {
        let mut logger = StdoutPipelineLogger::new(10);
        logger.metric("faces_per_frame", 3.0);
        logger.metric("faces_per_frame", 4.0);

        assert_relative_eq!(mean(logger.metrics_for("faces_per_frame").unwrap()), 3.5);
        let summary = logger.summary_string().unwrap();
        assert!(summary.contains("faces_per_frame: avg 3.5"));
    }

    #[test]
    fn test_counters_accumulate() {
        let mut logger = StdoutPipelineLogger::new(10);
        logger.count("frames_dropped", 2);
        logger.count("frames_dropped", 5);

        assert_eq!(logger.counter("frames_dropped"), 7);
        assert_eq!(logger.counter("faces_skipped"), 0);
        assert!(logger.summary_string().unwrap().contains("frames_dropped: 7"));
    }

    #[test]
    fn test_summary_includes_throughput() {
        let mut logger = StdoutPipelineLogger::new(10);
        logger.progress(100, Some(100));
        logger.timing("swap", 10.0);
        std::thread::sleep(std::time::Duration::from_millis(2));

        let summary = logger.summary_string().unwrap();
        assert!(summary.contains("Session summary (100 frames"));
        assert!(summary.contains("fps"));
    }

    #[test]
    fn test_empty_summary_returns_none() {
        assert!(StdoutPipelineLogger::new(10).summary_string().is_none());
    }

    #[test]
    fn test_progress_without_total_tracks_frames() {
        let mut logger = StdoutPipelineLogger::new(10);
        for i in 1..=25 {
            logger.progress(i, None);
        }
        assert_eq!(logger.frames, 25);
    }

    #[test]
    fn test_info_stores_messages() {
        let mut logger = StdoutPipelineLogger::default();
        logger.info("session started");
        assert_eq!(logger.messages, vec!["session started".to_string()]);
        assert_eq!(logger.throttle_frames, 30);
    }
}
