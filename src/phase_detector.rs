//! Phase detector (C5): classifies a streaming total-IOPS series into
//! IDLE/WARMUP/STEADY_STATE/COOLDOWN/TRANSITION spans with hysteresis.
//!
//! Lives entirely on the iostat collector's ingest thread (§5: "phase-detector
//! state: owned exclusively by the ingest thread"). The same algorithm also
//! runs post-hoc over an already-captured sample sequence for re-analysis
//! with alternate thresholds (§4.5).

use crate::models::{Phase, PhaseSpan};
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy)]
pub struct PhaseDetectorParams {
    pub idle_threshold: f64,
    pub active_threshold: f64,
    pub steady_cv_max: f64,
    pub window_size: usize,
    pub min_hold_samples: u32,
}

impl Default for PhaseDetectorParams {
    fn default() -> Self {
        PhaseDetectorParams {
            idle_threshold: 500.0,
            active_threshold: 5000.0,
            steady_cv_max: 50.0,
            window_size: 3,
            min_hold_samples: 2,
        }
    }
}

pub struct PhaseDetector {
    params: PhaseDetectorParams,
    iops_history: VecDeque<f64>,
    current_phase: Phase,
    candidate_phase: Option<Phase>,
    candidate_count: u32,
    prev_window_mean: f64,
    spans: Vec<PhaseSpan>,
    current_span: Option<PhaseSpan>,
    sample_index: usize,
    segment_label: String,
}

impl Default for PhaseDetector {
    fn default() -> Self {
        Self::new(PhaseDetectorParams::default())
    }
}

impl PhaseDetector {
    pub fn new(params: PhaseDetectorParams) -> Self {
        PhaseDetector {
            params,
            iops_history: VecDeque::with_capacity(params.window_size),
            current_phase: Phase::Idle,
            candidate_phase: None,
            candidate_count: 0,
            prev_window_mean: 0.0,
            spans: Vec::new(),
            current_span: None,
            sample_index: 0,
            segment_label: String::new(),
        }
    }

    pub fn set_segment_label(&mut self, label: String) {
        self.segment_label = label;
    }

    pub fn current_phase(&self) -> Phase {
        self.current_phase
    }

    /// Feed one `(total_iops, timestamp)` sample; returns the (possibly just
    /// updated) committed phase.
    pub fn push(&mut self, total_iops: f64, timestamp: f64) -> Phase {
        if self.iops_history.len() == self.params.window_size {
            self.iops_history.pop_front();
        }
        self.iops_history.push_back(total_iops);

        let raw = self.classify_window();

        if Some(raw) != self.candidate_phase {
            self.candidate_phase = Some(raw);
            self.candidate_count = 1;
        } else {
            self.candidate_count += 1;
        }

        if self.candidate_count >= self.params.min_hold_samples && raw != self.current_phase {
            self.commit_phase(raw, timestamp);
        }

        match &mut self.current_span {
            Some(span) => {
                span.end_time = timestamp;
                span.end_index = self.sample_index;
                span.sample_count += 1;
            }
            None => self.start_span(self.current_phase, timestamp),
        }

        self.sample_index += 1;
        self.current_phase
    }

    /// Close the open span and return every span observed so far.
    pub fn finalize(&mut self) -> Vec<PhaseSpan> {
        if let Some(span) = self.current_span.take() {
            self.spans.push(span);
        }
        std::mem::take(&mut self.spans)
    }

    fn classify_window(&mut self) -> Phase {
        if self.iops_history.is_empty() {
            return Phase::Idle;
        }

        let window_len = self.iops_history.len();
        let mean = self.iops_history.iter().sum::<f64>() / window_len as f64;

        if mean < self.params.idle_threshold {
            self.prev_window_mean = mean;
            return Phase::Idle;
        }

        if mean >= self.params.active_threshold && window_len >= self.params.window_size {
            let variance = self
                .iops_history
                .iter()
                .map(|x| (x - mean).powi(2))
                .sum::<f64>()
                / window_len as f64;
            let std_dev = variance.sqrt();
            let cv = if mean > 0.0 { std_dev / mean * 100.0 } else { 0.0 };

            if cv < self.params.steady_cv_max {
                self.prev_window_mean = mean;
                return Phase::SteadyState;
            }
        }

        if matches!(self.current_phase, Phase::Idle | Phase::Transition)
            && mean > self.prev_window_mean * 1.5
            && mean >= self.params.idle_threshold
        {
            self.prev_window_mean = mean;
            return Phase::Warmup;
        }

        if self.current_phase == Phase::SteadyState && mean < self.prev_window_mean * 0.5 {
            self.prev_window_mean = mean;
            return Phase::Cooldown;
        }

        self.prev_window_mean = mean;
        Phase::Transition
    }

    fn commit_phase(&mut self, new_phase: Phase, timestamp: f64) {
        if let Some(span) = self.current_span.take() {
            self.spans.push(span);
        }
        self.current_phase = new_phase;
        self.start_span(new_phase, timestamp);
    }

    fn start_span(&mut self, phase: Phase, timestamp: f64) {
        self.current_span = Some(PhaseSpan {
            phase,
            start_time: timestamp,
            end_time: timestamp,
            start_index: self.sample_index,
            end_index: self.sample_index,
            sample_count: 1,
            segment_label: self.segment_label.clone(),
        });
    }
}

/// Run phase detection over an already-captured series (§4.5 post-hoc variant).
/// Deterministic: calling this twice on the same input yields identical spans
/// (testable property 6).
pub fn run_posthoc(series: &[(f64, f64)], params: PhaseDetectorParams) -> Vec<PhaseSpan> {
    let mut detector = PhaseDetector::new(params);
    for &(total_iops, timestamp) in series {
        detector.push(total_iops, timestamp);
    }
    detector.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_at_start_and_end_with_steady_middle() {
        let iops = [
            0.0, 10.0, 5.0, 2000.0, 5000.0, 8000.0, 10000.0, 10500.0, 9800.0, 10200.0, 10100.0,
            9900.0, 10300.0, 10000.0, 5000.0, 2000.0, 500.0, 10.0, 0.0, 0.0,
        ];
        let series: Vec<(f64, f64)> = iops
            .iter()
            .enumerate()
            .map(|(i, v)| (*v, i as f64))
            .collect();
        let spans = run_posthoc(&series, PhaseDetectorParams::default());

        assert_eq!(spans.first().unwrap().phase, Phase::Idle);
        assert_eq!(spans.last().unwrap().phase, Phase::Idle);
        assert!(spans.iter().any(|s| s.phase == Phase::SteadyState));
    }

    #[test]
    fn spans_partition_sample_range_with_no_gaps() {
        let iops = [0.0, 6000.0, 6000.0, 6000.0, 6000.0, 0.0];
        let series: Vec<(f64, f64)> = iops
            .iter()
            .enumerate()
            .map(|(i, v)| (*v, i as f64))
            .collect();
        let spans = run_posthoc(&series, PhaseDetectorParams::default());

        assert_eq!(spans[0].start_index, 0);
        assert_eq!(spans.last().unwrap().end_index, iops.len() - 1);
        for pair in spans.windows(2) {
            assert_eq!(pair[0].end_index + 1, pair[1].start_index);
        }
    }

    #[test]
    fn posthoc_is_deterministic() {
        let iops = [0.0, 6000.0, 6200.0, 5900.0, 0.0, 0.0];
        let series: Vec<(f64, f64)> = iops
            .iter()
            .enumerate()
            .map(|(i, v)| (*v, i as f64))
            .collect();
        let first = run_posthoc(&series, PhaseDetectorParams::default());
        let second = run_posthoc(&series, PhaseDetectorParams::default());
        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.phase, b.phase);
            assert_eq!(a.start_index, b.start_index);
            assert_eq!(a.end_index, b.end_index);
        }
    }
}
