use std::thread;
use std::time::Duration;

use jagacheck_core::lookup::{
    Challenge, GatedOutcome, LookupFailure, LookupOutcome, Query, RetryBudget,
};

use crate::resolver::{AnswerResolver, Resolution};
use crate::trace_log::{next_trace_id, TraceLog};

/// Source of fresh challenges. One call, one network round trip.
pub trait CaptchaProvider {
    fn generate(&self) -> Result<Challenge, LookupFailure>;
}

/// Sends one gated request for `query` with a solved challenge.
pub trait LookupSubmitter {
    fn submit(&self, query: &Query, challenge_id: &str, answer: &str) -> LookupOutcome;
}

enum AttemptEnd {
    Done(GatedOutcome),
    Retry(LookupFailure),
}

/// Drives generate → resolve → submit for one query until it succeeds, hits a
/// terminal failure, or spends its budget.
pub struct GatedLookup {
    provider: Box<dyn CaptchaProvider>,
    resolver: Box<dyn AnswerResolver>,
    submitter: Box<dyn LookupSubmitter>,
    backoff: Duration,
    sleeper: Box<dyn Fn(Duration)>,
    trace: TraceLog,
}

impl GatedLookup {
    pub fn new(
        provider: Box<dyn CaptchaProvider>,
        resolver: Box<dyn AnswerResolver>,
        submitter: Box<dyn LookupSubmitter>,
    ) -> Self {
        Self {
            provider,
            resolver,
            submitter,
            backoff: Duration::ZERO,
            sleeper: Box::new(thread::sleep),
            trace: TraceLog::disabled(),
        }
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Replaces `thread::sleep` for the pause between attempts.
    pub fn with_sleeper(mut self, sleeper: impl Fn(Duration) + 'static) -> Self {
        self.sleeper = Box::new(sleeper);
        self
    }

    pub fn with_trace(mut self, trace: TraceLog) -> Self {
        self.trace = trace;
        self
    }

    pub fn run(&mut self, query: &Query, budget: RetryBudget) -> GatedOutcome {
        let trace_id = next_trace_id();
        self.trace
            .query_start(&trace_id, &query.subject_id, budget.max_attempts);
        let mut submissions = 0u32;
        let mut last_failure = None;

        for attempt in 1..=budget.max_attempts {
            match self.attempt(query, budget, attempt, &trace_id, &mut submissions) {
                AttemptEnd::Done(outcome) => {
                    let status = if outcome.is_success() { "SUCCESS" } else { "FAILED" };
                    self.trace.query_final(&trace_id, status, submissions);
                    return outcome;
                }
                AttemptEnd::Retry(failure) => {
                    log::warn!(
                        "attempt {attempt}/{} failed: {failure}",
                        budget.max_attempts
                    );
                    last_failure = Some(failure);
                }
            }
            if attempt < budget.max_attempts && !self.backoff.is_zero() {
                (self.sleeper)(self.backoff);
            }
        }

        self.trace.query_final(&trace_id, "FAILED", submissions);
        let failure = LookupFailure::Exhausted {
            attempts: budget.max_attempts,
            last: last_failure.map(Box::new),
        };
        log::warn!("lookup failed: {failure}");
        GatedOutcome::Failure(failure)
    }

    fn attempt(
        &mut self,
        query: &Query,
        budget: RetryBudget,
        attempt: u32,
        trace_id: &str,
        submissions: &mut u32,
    ) -> AttemptEnd {
        let mut regenerations = 0u32;
        loop {
            let challenge = match self.provider.generate() {
                Ok(challenge) => challenge,
                Err(failure) => {
                    self.trace.attempt_result(
                        trace_id,
                        attempt,
                        *submissions,
                        "provider_failure",
                        Some(failure.to_string().as_str()),
                    );
                    return AttemptEnd::Retry(failure);
                }
            };

            let answer = match self.resolver.resolve(&challenge.image) {
                Resolution::Answer(answer) => answer,
                Resolution::NoAnswer(reason) => {
                    self.trace.attempt_result(
                        trace_id,
                        attempt,
                        *submissions,
                        "no_answer",
                        Some(reason.as_str()),
                    );
                    return AttemptEnd::Retry(LookupFailure::Resolver(reason));
                }
                Resolution::Cancelled => {
                    log::info!("operator cancelled query");
                    self.trace
                        .attempt_result(trace_id, attempt, *submissions, "cancelled", None);
                    return AttemptEnd::Done(GatedOutcome::Failure(
                        LookupFailure::OperatorCancelled,
                    ));
                }
            };

            *submissions += 1;
            match self.submitter.submit(query, &challenge.id, &answer) {
                LookupOutcome::Success(record) => {
                    log::info!("lookup succeeded on attempt {attempt}");
                    self.trace
                        .attempt_result(trace_id, attempt, *submissions, "success", None);
                    return AttemptEnd::Done(GatedOutcome::Success {
                        record,
                        challenge_id: challenge.id,
                        answer,
                    });
                }
                LookupOutcome::CaptchaRejected(message) => {
                    self.trace.attempt_result(
                        trace_id,
                        attempt,
                        *submissions,
                        "captcha_rejected",
                        Some(message.as_str()),
                    );
                    if regenerations < budget.captcha_regenerations {
                        regenerations += 1;
                        log::info!(
                            "captcha rejected, regenerating ({regenerations}/{})",
                            budget.captcha_regenerations
                        );
                        continue;
                    }
                    return AttemptEnd::Retry(LookupFailure::CaptchaRejected(message));
                }
                LookupOutcome::OtherFailure(message) => {
                    self.trace.attempt_result(
                        trace_id,
                        attempt,
                        *submissions,
                        "api_failure",
                        Some(message.as_str()),
                    );
                    log::warn!("lookup rejected by api: {message}");
                    return AttemptEnd::Done(GatedOutcome::Failure(LookupFailure::OtherApi(
                        message,
                    )));
                }
                LookupOutcome::TransportFailure(message) => {
                    self.trace.attempt_result(
                        trace_id,
                        attempt,
                        *submissions,
                        "transport_failure",
                        Some(message.as_str()),
                    );
                    log::warn!("lookup request failed: {message}");
                    return AttemptEnd::Done(GatedOutcome::Failure(LookupFailure::Transport(
                        message,
                    )));
                }
            }
        }
    }
}
