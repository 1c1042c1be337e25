// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Outcome collection for load simulations against the upload endpoint.

use axum::http::StatusCode;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Possible outcomes for an upload request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Accepted,
    Banned,
    Blocklisted,
    DailyQuota,
    Cooldown,
    BadRequest,
    Internal,
}

impl Outcome {
    /// Classify a response by status and error code.
    pub fn classify(status: StatusCode, code: Option<&str>) -> Self {
        match (status, code) {
            (StatusCode::OK, _) => Self::Accepted,
            (StatusCode::FORBIDDEN, Some("BLOCKLISTED")) => Self::Blocklisted,
            (StatusCode::FORBIDDEN, _) => Self::Banned,
            (StatusCode::TOO_MANY_REQUESTS, Some("DAILY_QUOTA")) => Self::DailyQuota,
            (StatusCode::TOO_MANY_REQUESTS, _) => Self::Cooldown,
            (StatusCode::BAD_REQUEST, _) => Self::BadRequest,
            _ => Self::Internal,
        }
    }
}

/// Collects outcomes during a simulation.
#[derive(Debug, Default)]
pub struct LoadMetrics {
    start_time: Option<Instant>,
    end_time: Option<Instant>,
    outcomes: HashMap<Outcome, usize>,
    requests_per_ip: HashMap<String, usize>,
    accepted_per_ip: HashMap<String, usize>,
}

impl LoadMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self) {
        self.start_time = Some(Instant::now());
    }

    pub fn finish(&mut self) {
        self.end_time = Some(Instant::now());
    }

    pub fn record(&mut self, outcome: Outcome, ip: &str) {
        *self.outcomes.entry(outcome).or_insert(0) += 1;
        *self.requests_per_ip.entry(ip.to_string()).or_insert(0) += 1;
        if outcome == Outcome::Accepted {
            *self.accepted_per_ip.entry(ip.to_string()).or_insert(0) += 1;
        }
    }

    pub fn total_requests(&self) -> usize {
        self.outcomes.values().sum()
    }

    pub fn count(&self, outcome: Outcome) -> usize {
        self.outcomes.get(&outcome).copied().unwrap_or(0)
    }

    pub fn unique_ips(&self) -> usize {
        self.requests_per_ip.len()
    }

    /// Highest number of accepted uploads any single IP achieved.
    pub fn max_accepted_per_ip(&self) -> usize {
        self.accepted_per_ip.values().copied().max().unwrap_or(0)
    }

    pub fn duration(&self) -> Duration {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => end.duration_since(start),
            (Some(start), None) => start.elapsed(),
            _ => Duration::ZERO,
        }
    }
}

impl std::fmt::Display for LoadMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Upload Load Report ===")?;
        writeln!(f, "Duration:          {} ms", self.duration().as_millis())?;
        writeln!(f, "Total Requests:    {}", self.total_requests())?;
        writeln!(f, "Unique IPs:        {}", self.unique_ips())?;
        writeln!(f, "Accepted:          {}", self.count(Outcome::Accepted))?;
        writeln!(f, "Banned:            {}", self.count(Outcome::Banned))?;
        writeln!(f, "Blocklisted:       {}", self.count(Outcome::Blocklisted))?;
        writeln!(f, "Daily Quota:       {}", self.count(Outcome::DailyQuota))?;
        writeln!(f, "Cooldown:          {}", self.count(Outcome::Cooldown))?;
        writeln!(f, "Bad Request:       {}", self.count(Outcome::BadRequest))?;
        writeln!(f, "Internal:          {}", self.count(Outcome::Internal))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(Outcome::classify(StatusCode::OK, None), Outcome::Accepted);
        assert_eq!(
            Outcome::classify(StatusCode::TOO_MANY_REQUESTS, Some("COOLDOWN")),
            Outcome::Cooldown
        );
        assert_eq!(
            Outcome::classify(StatusCode::FORBIDDEN, Some("BLOCKLISTED")),
            Outcome::Blocklisted
        );
    }

    #[test]
    fn test_per_ip_accounting() {
        let mut metrics = LoadMetrics::new();
        metrics.record(Outcome::Accepted, "10.0.0.1");
        metrics.record(Outcome::Cooldown, "10.0.0.1");
        metrics.record(Outcome::Accepted, "10.0.0.2");

        assert_eq!(metrics.total_requests(), 3);
        assert_eq!(metrics.unique_ips(), 2);
        assert_eq!(metrics.max_accepted_per_ip(), 1);
    }
}
