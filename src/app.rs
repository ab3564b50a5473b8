//! Application state and logic for the TUI dashboard.

use std::{
    collections::{HashMap, VecDeque},
    time::{Duration, Instant},
};

use hedged_fanout::{Candidate, CandidateStatsSnapshot, Coordinator};

use crate::sim::{Profile, SimBackend};

/// How a dashboard call is coordinated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Query every active candidate at once.
    Fanout,
    /// Query active candidates one by one, hedging after the grace period.
    Failover,
    /// Query only the selected candidate.
    SingleCandidate,
}

/// Events emitted by background calls.
#[derive(Debug)]
pub enum AppEvent {
    /// A coordinated call completed.
    CallFinished {
        candidate: Option<Candidate>,
        latency_ms: f64,
        ok: bool,
        message: String,
    },
}

/// Main application state for the TUI.
pub struct App {
    pub coordinator: Coordinator<SimBackend>,
    pub candidates: Vec<(Candidate, Profile)>,
    pub selected_idx: usize,
    pub mode: Mode,
    pub last_message: String,
    pub last_candidate: Option<Candidate>,
    pub last_latency_ms: Option<f64>,
    pub stats_snapshot: HashMap<Candidate, CandidateStatsSnapshot>,
    pub batch_mode: bool,
    pub batch_count: usize,
    pub batch_current: usize,
    pub candidate_count: usize,
    pub session_start: Instant,
    pub total_calls: u64,
    pub total_successes: u64,
    pub total_errors: u64,
    pub latency_history: HashMap<Candidate, VecDeque<u64>>,
    pub call_timestamps: VecDeque<Instant>,
    query_seq: u64,
}

impl App {
    pub fn new(coordinator: Coordinator<SimBackend>, candidates: Vec<(Candidate, Profile)>) -> Self {
        let candidate_count = candidates.len();

        let latency_history = candidates
            .iter()
            .map(|(c, _)| (c.clone(), VecDeque::with_capacity(100)))
            .collect();

        Self {
            coordinator,
            candidates,
            selected_idx: 0,
            mode: Mode::Failover,
            last_message: String::from("Ready. Press 'r' to run a call or 'b' for batch mode"),
            last_candidate: None,
            last_latency_ms: None,
            stats_snapshot: HashMap::new(),
            batch_mode: false,
            batch_count: 10,
            batch_current: 0,
            candidate_count,
            session_start: Instant::now(),
            total_calls: 0,
            total_successes: 0,
            total_errors: 0,
            latency_history,
            call_timestamps: VecDeque::with_capacity(1000),
            query_seq: 0,
        }
    }

    pub fn next_candidate(&mut self) {
        if !self.candidates.is_empty() {
            self.selected_idx = (self.selected_idx + 1) % self.candidates.len();
        }
    }

    pub fn prev_candidate(&mut self) {
        if !self.candidates.is_empty() {
            if self.selected_idx == 0 {
                self.selected_idx = self.candidates.len() - 1;
            } else {
                self.selected_idx -= 1;
            }
        }
    }

    pub fn increase_candidate_count(&mut self) {
        if self.candidate_count < self.candidates.len() {
            self.candidate_count += 1;
        }
    }

    pub fn decrease_candidate_count(&mut self) {
        if self.candidate_count > 1 {
            self.candidate_count -= 1;
        }
    }

    pub fn toggle_mode(&mut self) {
        self.mode = match self.mode {
            Mode::Failover => Mode::Fanout,
            Mode::Fanout => Mode::SingleCandidate,
            Mode::SingleCandidate => Mode::Failover,
        };
    }

    pub fn toggle_batch_mode(&mut self) {
        self.batch_mode = !self.batch_mode;
        if self.batch_mode {
            self.batch_current = 0;
            self.last_message = format!("Batch mode ON: {} calls queued", self.batch_count);
        } else {
            self.last_message = "Batch mode OFF".to_string();
        }
    }

    pub fn increase_batch_count(&mut self) {
        self.batch_count = (self.batch_count + 10).min(1000);
    }

    pub fn decrease_batch_count(&mut self) {
        self.batch_count = (self.batch_count.saturating_sub(10)).max(10);
    }

    pub fn refresh_stats(&mut self) {
        self.stats_snapshot = self.coordinator.candidate_stats();
    }

    pub fn reset_stats(&mut self) {
        self.coordinator.reset_stats();
        self.stats_snapshot.clear();
        for history in self.latency_history.values_mut() {
            history.clear();
        }
        self.last_message = "Stats reset".to_string();
    }

    /// Candidates a call in the current mode consults, in escalation order.
    pub fn call_candidates(&self) -> Vec<Candidate> {
        match self.mode {
            Mode::SingleCandidate => self.selected_candidate().into_iter().collect(),
            Mode::Fanout | Mode::Failover => self
                .candidates
                .iter()
                .take(self.candidate_count)
                .map(|(c, _)| c.clone())
                .collect(),
        }
    }

    pub fn next_query(&mut self) -> String {
        self.query_seq += 1;
        format!("key-{}", self.query_seq)
    }

    pub fn set_last_result(
        &mut self,
        candidate: Option<Candidate>,
        latency_ms: f64,
        ok: bool,
        message: String,
    ) {
        self.last_latency_ms = Some(latency_ms);
        self.refresh_stats();

        self.total_calls += 1;
        if ok {
            self.total_successes += 1;
        } else {
            self.total_errors += 1;
        }

        if let Some(winner) = &candidate {
            let history = self
                .latency_history
                .entry(winner.clone())
                .or_insert_with(|| VecDeque::with_capacity(100));
            history.push_back(latency_ms as u64);
            if history.len() > 100 {
                history.pop_front();
            }
        }
        self.last_candidate = candidate;

        self.call_timestamps.push_back(Instant::now());
        if self.call_timestamps.len() > 1000 {
            self.call_timestamps.pop_front();
        }

        let status = if ok { "✓" } else { "✗" };
        self.last_message = format!("{} {} ({:.0} ms)", status, message, latency_ms);

        if self.batch_mode {
            self.batch_current += 1;
            if self.batch_current >= self.batch_count {
                self.batch_mode = false;
                self.last_message = format!("Batch complete! {} calls finished", self.batch_count);
            }
        }
    }

    pub fn selected_candidate(&self) -> Option<Candidate> {
        self.candidates.get(self.selected_idx).map(|(c, _)| c.clone())
    }

    pub fn mode_string(&self) -> String {
        match self.mode {
            Mode::Fanout => format!("Fan-out ({} candidates)", self.candidate_count),
            Mode::Failover => format!("Failover ({} candidates)", self.candidate_count),
            Mode::SingleCandidate => "Single Candidate".to_string(),
        }
    }

    pub fn should_run_call(&self) -> bool {
        self.batch_mode && self.batch_current < self.batch_count
    }

    pub fn session_uptime(&self) -> Duration {
        self.session_start.elapsed()
    }

    pub fn success_rate(&self) -> f64 {
        if self.total_calls > 0 {
            (self.total_successes as f64 / self.total_calls as f64) * 100.0
        } else {
            0.0
        }
    }

    pub fn calls_per_second(&self) -> f64 {
        let one_sec_ago = Instant::now() - Duration::from_secs(1);

        self.call_timestamps
            .iter()
            .filter(|&&ts| ts > one_sec_ago)
            .count() as f64
    }

    pub fn average_latency(&self) -> f64 {
        let (total, count) = self
            .latency_history
            .values()
            .flatten()
            .fold((0u64, 0usize), |(total, count), &ms| (total + ms, count + 1));

        if count > 0 {
            total as f64 / count as f64
        } else {
            0.0
        }
    }
}
