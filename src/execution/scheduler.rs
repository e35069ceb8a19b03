//! Step scheduler
//!
//! A flat bag of [`StepExecution`] scanned linearly on every operation. A
//! procedure has tens of steps at most.

use std::time::Duration;

use tokio::time::Instant;

use super::step::StepExecution;

#[derive(Debug, Clone, Default)]
pub struct StepScheduler {
    items: Vec<StepExecution>,
}

impl StepScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StepExecution> {
        self.items.iter()
    }

    /// None when empty, zero when something is ready now, otherwise the wait
    /// until the earliest `not_before`.
    pub fn time_until_next(&self, now: Instant) -> Option<Duration> {
        let mut earliest: Option<Instant> = None;
        for se in &self.items {
            match se.not_before {
                None => return Some(Duration::ZERO),
                Some(nb) if earliest.map_or(true, |e| nb < e) => earliest = Some(nb),
                Some(_) => {}
            }
        }
        earliest.map(|nb| nb.saturating_duration_since(now))
    }

    fn next_index(&self, now: Instant) -> Option<usize> {
        let mut lowest: Option<(usize, u32)> = None;
        for (i, se) in self.items.iter().enumerate() {
            if !se.is_ready(now) {
                continue;
            }
            // Strict comparison keeps the earliest added on primacy ties
            if lowest.map_or(true, |(_, primacy)| se.primacy < primacy) {
                lowest = Some((i, se.primacy));
            }
        }
        lowest.map(|(i, _)| i)
    }

    /// The ready execution with the lowest primacy
    pub fn peek(&self, now: Instant) -> Option<&StepExecution> {
        self.next_index(now).map(|i| &self.items[i])
    }

    /// Remove and return the ready execution with the lowest primacy
    pub fn pop(&mut self, now: Instant) -> Option<StepExecution> {
        self.next_index(now).map(|i| self.items.remove(i))
    }

    pub fn add(&mut self, step: StepExecution) {
        self.items.push(step);
    }
}
