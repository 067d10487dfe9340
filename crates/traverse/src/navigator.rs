//! Advancing a presentation by one logical step.
//!
//! Methods are tried from most to least reliable, and the first one that
//! applies decides the step:
//!
//! 1. native "next" guarded by the framework's end predicate,
//! 2. native "next" verified by a change of reported position,
//! 3. a visible "next" affordance in the document,
//! 4. a simulated `Space` key press, then `ArrowRight` if `Space` changed
//!    nothing. A change of `location.hash` confirms either key.
//!
//! A method that fails is noted and the next one is tried. Nothing here ever
//! aborts a traversal.

use crate::capture::{Fingerprint, fingerprint};
use crate::page::error::Result;
use crate::page::{Key, Page, Script};
use crate::position::Position;
use crate::session::PresentationSession;
use crate::strategy::Strategy;
use crate::wait::{settle, wait_until};
use derive_more::Display;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::instrument;

/// How a navigation attempt turned out.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
pub enum StepOutcome {
    /// The view moved to a new step.
    #[display("advanced")]
    Advanced,
    /// The framework reported there is nothing after the current step.
    #[display("finished (api)")]
    FinishedByApi,
    /// The "next" control is present but disabled.
    #[display("finished (button state)")]
    FinishedByButtonState,
    /// A key press was sent but nothing confirmed whether it had an effect.
    #[display("no signal")]
    NoSignal,
}

/// Result of one [`advance`] call.
#[derive(Clone, Debug)]
pub struct Step {
    pub outcome: StepOutcome,
    /// Position reported after navigating, if the framework reports one.
    pub position: Option<Position>,
    /// Fingerprint of the view before navigating, taken whenever the outcome
    /// cannot be confirmed any other way.
    pub fingerprint_before: Option<Fingerprint>,
    /// `location.hash` before and after a key press, when the page has one.
    pub hash_before: Option<String>,
    pub hash_after: Option<String>,
    /// The position wrapped back to the start of the deck.
    pub looped: bool,
    /// Recoverable failures encountered on the way.
    pub notes: Vec<String>,
}
impl Step {
    fn new(outcome: StepOutcome) -> Self {
        Self {
            outcome,
            position: None,
            fingerprint_before: None,
            hash_before: None,
            hash_after: None,
            looped: false,
            notes: Vec::new(),
        }
    }

    /// A key press moved the address to a different fragment.
    pub fn hash_changed(&self) -> bool {
        self.hash_after.is_some() && self.hash_after != self.hash_before
    }

    fn at(mut self, position: Option<Position>) -> Self {
        self.position = position;
        self
    }
}

/// Delays used while navigating.
#[derive(Clone, Copy, Debug)]
pub struct Pacing {
    /// Time given to transitions and animations after each navigation.
    pub settle: Duration,
    /// Interval between position polls.
    pub poll: Duration,
    /// Upper bound on a fingerprint capture.
    pub fingerprint_timeout: Duration,
}

#[derive(Debug, Default, Deserialize)]
struct Affordance {
    #[serde(default)]
    found: bool,
    #[serde(default)]
    disabled: bool,
}

/// Move `page` forward by exactly one logical step.
#[instrument(skip_all, fields(framework = %strategy.framework(), step = session.steps_taken()))]
pub async fn advance(page: &dyn Page, strategy: &dyn Strategy, session: &PresentationSession, pacing: &Pacing) -> Step {
    let mut notes = Vec::new();
    let capabilities = strategy.capabilities();

    if capabilities.next && capabilities.is_last {
        match guarded_next(page, strategy, pacing, &mut notes).await {
            Ok(Some(step)) => return with_notes(step, notes),
            Ok(None) => notes.push(format!("{} did not report whether this is the last step", strategy.framework())),
            Err(e) => notes.push(format!("{} end predicate failed: {e}", strategy.framework())),
        }
    }

    if capabilities.next && capabilities.position {
        match verified_next(page, strategy, session, pacing, &mut notes).await {
            Ok(Some(step)) => return with_notes(step, notes),
            Ok(None) => notes.push(format!("{} did not report a position", strategy.framework())),
            Err(e) => notes.push(format!("{} navigation failed: {e}", strategy.framework())),
        }
    }

    let before = match fingerprint(page, pacing.fingerprint_timeout).await {
        Ok(fingerprint) => Some(fingerprint),
        Err(e) => {
            notes.push(format!("fingerprint before navigating failed: {e}"));
            None
        },
    };

    match click_next(page, strategy, pacing, before, &mut notes).await {
        Ok(Some(step)) => return with_notes(step, notes),
        Ok(None) => {},
        Err(e) => notes.push(format!("next control lookup failed: {e}")),
    }

    with_notes(press_next(page, pacing, before, &mut notes).await, notes)
}

fn with_notes(mut step: Step, notes: Vec<String>) -> Step {
    for note in &notes {
        tracing::debug!(note, "Navigation fell through");
    }
    step.notes = notes;
    step
}

/// Position after a navigation that already happened. A failure here must not
/// fall through, or the deck would be advanced twice.
async fn position_after(page: &dyn Page, strategy: &dyn Strategy, notes: &mut Vec<String>) -> Option<Position> {
    if !strategy.capabilities().position {
        return None;
    }
    strategy.position(page).await.unwrap_or_else(|e| {
        notes.push(format!("{} position query failed: {e}", strategy.framework()));
        None
    })
}

async fn guarded_next(
    page: &dyn Page,
    strategy: &dyn Strategy,
    pacing: &Pacing,
    notes: &mut Vec<String>,
) -> Result<Option<Step>> {
    let Some(last) = strategy.is_last(page).await? else {
        return Ok(None);
    };
    if last {
        return Ok(Some(Step::new(StepOutcome::FinishedByApi)));
    }
    strategy.next(page).await?;
    settle(pacing.settle).await;
    let position = position_after(page, strategy, notes).await;
    Ok(Some(Step::new(StepOutcome::Advanced).at(position)))
}

async fn verified_next(
    page: &dyn Page,
    strategy: &dyn Strategy,
    session: &PresentationSession,
    pacing: &Pacing,
    notes: &mut Vec<String>,
) -> Result<Option<Step>> {
    let Some(before) = strategy.position(page).await? else {
        return Ok(None);
    };
    strategy.next(page).await?;

    let changed = wait_until(pacing.settle, pacing.poll, move || async move {
        matches!(strategy.position(page).await, Ok(Some(now)) if now != before)
    })
    .await;
    let Some(after) = position_after(page, strategy, notes).await else {
        return Ok(Some(Step::new(StepOutcome::Advanced)));
    };

    if !changed && after == before {
        return Ok(Some(Step::new(StepOutcome::FinishedByApi).at(Some(after))));
    }
    if session.origin().is_some_and(|origin| after.wrapped(&before, &origin)) {
        let mut step = Step::new(StepOutcome::FinishedByApi).at(Some(after));
        step.looped = true;
        return Ok(Some(step));
    }
    settle(pacing.settle).await;
    Ok(Some(Step::new(StepOutcome::Advanced).at(Some(after))))
}

async fn click_next(
    page: &dyn Page,
    strategy: &dyn Strategy,
    pacing: &Pacing,
    before: Option<Fingerprint>,
    notes: &mut Vec<String>,
) -> Result<Option<Step>> {
    let affordance: Affordance = serde_json::from_value(page.evaluate(&Script::ClickNext).await?).unwrap_or_default();
    match affordance {
        Affordance { found: false, .. } => Ok(None),
        Affordance { disabled: true, .. } => Ok(Some(Step::new(StepOutcome::FinishedByButtonState))),
        Affordance { .. } => {
            settle(pacing.settle).await;
            let position = position_after(page, strategy, notes).await;
            let mut step = Step::new(StepOutcome::Advanced).at(position);
            if position.is_none() {
                step.fingerprint_before = before;
            }
            Ok(Some(step))
        },
    }
}

/// Current fragment, `None` if the page has none or cannot say.
async fn location_hash(page: &dyn Page, notes: &mut Vec<String>) -> Option<String> {
    match page.evaluate(&Script::Hash).await {
        Ok(Value::String(hash)) if !hash.is_empty() => Some(hash),
        Ok(_) => None,
        Err(e) => {
            notes.push(format!("hash query failed: {e}"));
            None
        },
    }
}

/// Whether the view differs from `before`. Unknown counts as changed, so a
/// second key is never sent on a guess.
async fn view_changed(page: &dyn Page, before: Option<Fingerprint>, pacing: &Pacing, notes: &mut Vec<String>) -> bool {
    let Some(before) = before else {
        return true;
    };
    match fingerprint(page, pacing.fingerprint_timeout).await {
        Ok(now) => now != before,
        Err(e) => {
            notes.push(format!("fingerprint after Space failed: {e}"));
            true
        },
    }
}

async fn press_next(page: &dyn Page, pacing: &Pacing, before: Option<Fingerprint>, notes: &mut Vec<String>) -> Step {
    let hash_before = location_hash(page, notes).await;
    let mut step = Step::new(StepOutcome::NoSignal);
    step.fingerprint_before = before;
    for key in [Key::Space, Key::ArrowRight] {
        if let Err(e) = page.press_key(key).await {
            notes.push(format!("{key} key press failed: {e}"));
            continue;
        }
        settle(pacing.settle).await;
        step.hash_after = location_hash(page, notes).await;
        step.hash_before = hash_before.clone();
        if step.hash_changed() {
            step.outcome = StepOutcome::Advanced;
            step.fingerprint_before = None;
            return step;
        }
        if key == Key::Space && view_changed(page, before, pacing, notes).await {
            return step;
        }
    }
    step
}
