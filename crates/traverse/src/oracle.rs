//! Deciding whether a presentation has ended.

use crate::capture::fingerprint;
use crate::navigator::{Step, StepOutcome};
use crate::page::Page;
use crate::session::{PresentationSession, StopReason};
use std::time::Duration;

/// What to do after a step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    Continue,
    Stop(StopReason),
}

/// Judges each [`Step`] and records it on the session.
#[derive(Clone, Copy, Debug)]
pub struct Oracle {
    step_ceiling: u64,
    fingerprint_timeout: Duration,
}
impl Oracle {
    pub fn new(step_ceiling: u64, fingerprint_timeout: Duration) -> Self {
        Self { step_ceiling, fingerprint_timeout }
    }

    /// Evaluate `step`, record it on `session`, and terminate the session if
    /// the verdict is to stop.
    ///
    /// The absolute step ceiling applies regardless of any other signal.
    /// Recoverable failures while judging are appended to the step's notes.
    pub async fn evaluate(&self, page: &dyn Page, step: &mut Step, session: &mut PresentationSession) -> Verdict {
        let verdict = self.judge(page, step, session).await;
        session.record_step(step.position);
        session.record_hashes(step.hash_before.as_deref(), step.hash_after.as_deref());
        let verdict = match verdict {
            Verdict::Continue if session.steps_taken() >= self.step_ceiling => Verdict::Stop(StopReason::StepCeiling),
            verdict => verdict,
        };
        if let Verdict::Stop(reason) = verdict {
            session.terminate(reason);
            tracing::debug!(%reason, steps = session.steps_taken(), "Presentation ended");
        }
        verdict
    }

    async fn judge(&self, page: &dyn Page, step: &mut Step, session: &PresentationSession) -> Verdict {
        match step.outcome {
            StepOutcome::FinishedByApi if step.looped => return Verdict::Stop(StopReason::Loop),
            StepOutcome::FinishedByApi => return Verdict::Stop(StopReason::Api),
            StepOutcome::FinishedByButtonState => return Verdict::Stop(StopReason::ButtonState),
            StepOutcome::Advanced | StepOutcome::NoSignal => {},
        }

        if let Some(position) = step.position {
            if session.has_visited(&position) {
                return Verdict::Stop(StopReason::Loop);
            }
            let wrapped = match (session.cursor(), session.origin()) {
                (Some(previous), Some(origin)) => position.wrapped(&previous, &origin),
                _ => false,
            };
            if wrapped {
                return Verdict::Stop(StopReason::Loop);
            }
        }

        if let Some(hash) = step.hash_after.as_deref().filter(|_| step.hash_changed()) {
            if session.has_seen_hash(hash) {
                return Verdict::Stop(StopReason::Loop);
            }
        }

        let hash_held = step.hash_after.is_some() && !step.hash_changed();
        if step.outcome == StepOutcome::NoSignal && hash_held && session.is_hash_routed() {
            return Verdict::Stop(StopReason::HashStall);
        }

        if let Some(before) = step.fingerprint_before.filter(|_| !step.hash_changed()) {
            match fingerprint(page, self.fingerprint_timeout).await {
                Ok(after) if after == before => return Verdict::Stop(StopReason::VisualStall),
                Ok(_) => {},
                Err(e) => step.notes.push(format!("fingerprint after navigating failed: {e}")),
            }
        }

        Verdict::Continue
    }
}
