use std::thread;
use std::time::Duration;

use jagacheck_core::lookup::{Query, RetryBudget};
use jagacheck_core::record::{format_result, BatchSummary, ResultRecord};

use crate::gate::GatedLookup;

#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub records: Vec<ResultRecord>,
    pub summary: BatchSummary,
}

/// Walks queries in order, one orchestrator run each, pausing between them.
pub struct BatchDriver {
    lookup: GatedLookup,
    budget: RetryBudget,
    query_delay: Duration,
    sleeper: Box<dyn Fn(Duration)>,
}

impl BatchDriver {
    pub fn new(lookup: GatedLookup, budget: RetryBudget, query_delay: Duration) -> Self {
        Self {
            lookup,
            budget,
            query_delay,
            sleeper: Box::new(thread::sleep),
        }
    }

    pub fn with_sleeper(mut self, sleeper: impl Fn(Duration) + 'static) -> Self {
        self.sleeper = Box::new(sleeper);
        self
    }

    pub fn check(&mut self, query: &Query) -> ResultRecord {
        let outcome = self.lookup.run(query, self.budget);
        let record = format_result(query, &outcome);
        if let Some(failure) = outcome.failure() {
            log::warn!("query finished FAILED: {failure}");
        } else {
            log::info!("query finished SUCCESS");
        }
        record
    }

    pub fn run(&mut self, queries: &[Query]) -> BatchReport {
        self.run_with(queries, |_, _| {})
    }

    /// Like [`run`](Self::run), reporting each record as soon as it exists.
    pub fn run_with<F>(&mut self, queries: &[Query], mut on_record: F) -> BatchReport
    where
        F: FnMut(usize, &ResultRecord),
    {
        let mut records = Vec::with_capacity(queries.len());
        for (index, query) in queries.iter().enumerate() {
            log::info!("processing query {}/{}", index + 1, queries.len());
            let record = self.check(query);
            on_record(index, &record);
            records.push(record);
            if index + 1 < queries.len() && !self.query_delay.is_zero() {
                (self.sleeper)(self.query_delay);
            }
        }
        let summary = BatchSummary::from_records(&records);
        log::info!(
            "batch complete: total={} succeeded={} failed={}",
            summary.total,
            summary.succeeded,
            summary.failed
        );
        BatchReport { records, summary }
    }
}
