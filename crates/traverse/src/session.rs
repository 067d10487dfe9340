//! Traversal session state.

use crate::framework::Framework;
use crate::position::Position;
use derive_more::Display;
use std::collections::HashSet;
use url::Url;

/// Why a traversal stopped.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash)]
pub enum StopReason {
    /// The framework reported the last step (or refused to move).
    #[display("framework reported the end")]
    Api,
    /// The "next" control is disabled.
    #[display("next control disabled")]
    ButtonState,
    /// The position wrapped around or revisited an earlier position.
    #[display("position loop detected")]
    Loop,
    /// Navigation produced no visible change.
    #[display("view stopped changing")]
    VisualStall,
    /// A hash-routed deck kept its address fragment after a key press.
    #[display("address stopped changing")]
    HashStall,
    /// The requested start step is beyond the framework's known step count.
    #[display("start beyond known step count")]
    KnownCount,
    /// The absolute step ceiling was reached.
    #[display("step ceiling reached")]
    StepCeiling,
    /// The batch-local step budget was used up.
    #[display("batch limit reached")]
    BatchLimit,
}
impl StopReason {
    /// `true` if the presentation is known to have ended, rather than the
    /// traversal having been cut short.
    pub fn is_finished(&self) -> bool {
        !matches!(self, Self::StepCeiling | Self::BatchLimit)
    }

    /// `true` if no further batch could make progress.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::BatchLimit)
    }
}

/// One in-progress traversal of one presentation.
#[derive(Debug)]
pub struct PresentationSession {
    target: Url,
    framework: Framework,
    origin: Option<Position>,
    cursor: Option<Position>,
    visited: HashSet<Position>,
    hashes: HashSet<String>,
    hash_routed: bool,
    steps_taken: u64,
    captures: u64,
    terminated: Option<StopReason>,
}

impl PresentationSession {
    pub fn new(target: Url, framework: Framework, origin: Option<Position>) -> Self {
        Self {
            target,
            framework,
            origin,
            cursor: origin,
            visited: origin.into_iter().collect(),
            hashes: HashSet::new(),
            hash_routed: false,
            steps_taken: 0,
            captures: 0,
            terminated: None,
        }
    }

    pub fn target(&self) -> &Url {
        &self.target
    }

    pub fn framework(&self) -> Framework {
        self.framework
    }

    pub fn origin(&self) -> Option<Position> {
        self.origin
    }

    /// Last known position. For decks without a position API this is a
    /// [`Position::Counter`] of steps taken.
    pub fn cursor(&self) -> Option<Position> {
        self.cursor
    }

    /// Absolute number of navigation attempts issued, replayed steps included.
    pub fn steps_taken(&self) -> u64 {
        self.steps_taken
    }

    pub fn captures(&self) -> u64 {
        self.captures
    }

    pub fn terminated(&self) -> Option<StopReason> {
        self.terminated
    }

    pub fn has_visited(&self, position: &Position) -> bool {
        self.visited.contains(position)
    }

    /// Whether `hash` was the address fragment at any earlier step.
    pub fn has_seen_hash(&self, hash: &str) -> bool {
        self.hashes.contains(hash)
    }

    /// A key press has changed the address fragment at least once.
    pub fn is_hash_routed(&self) -> bool {
        self.hash_routed
    }

    /// Record the fragments seen around a key press.
    pub(crate) fn record_hashes(&mut self, before: Option<&str>, after: Option<&str>) {
        if after.is_some() && after != before {
            self.hash_routed = true;
        }
        self.hashes.extend(before.into_iter().chain(after).map(str::to_string));
    }

    pub(crate) fn record_capture(&mut self) {
        self.captures += 1;
    }

    /// Record a navigation attempt and the position it led to, if known.
    pub(crate) fn record_step(&mut self, position: Option<Position>) {
        self.steps_taken += 1;
        match position {
            Some(position) => {
                self.visited.insert(position);
                self.cursor = Some(position);
            },
            None if self.origin.is_none() => self.cursor = Some(Position::Counter(self.steps_taken)),
            None => {},
        }
    }

    /// Mark the session terminated. Only the first reason sticks.
    pub(crate) fn terminate(&mut self, reason: StopReason) -> StopReason {
        *self.terminated.get_or_insert(reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn session(origin: Option<Position>) -> PresentationSession {
        PresentationSession::new(Url::parse("https://example.com/deck/").unwrap(), Framework::Generic, origin)
    }

    #[test]
    fn termination_is_set_once() {
        let mut session = session(None);
        assert_eq!(session.terminate(StopReason::VisualStall), StopReason::VisualStall);
        assert_eq!(session.terminate(StopReason::StepCeiling), StopReason::VisualStall);
        assert_eq!(session.terminated(), Some(StopReason::VisualStall));
    }

    #[test]
    fn counter_cursor_without_positions() {
        let mut session = session(None);
        session.record_step(None);
        session.record_step(None);
        assert_eq!(session.steps_taken(), 2);
        assert_eq!(session.cursor(), Some(Position::Counter(2)));
    }

    #[test]
    fn visited_positions_are_tracked() {
        let origin = Position::Indexed { h: 0, v: 0, f: 0 };
        let next = Position::Indexed { h: 1, v: 0, f: 0 };
        let mut session = session(Some(origin));
        assert!(session.has_visited(&origin));
        assert!(!session.has_visited(&next));
        session.record_step(Some(next));
        assert!(session.has_visited(&next));
        assert_eq!(session.cursor(), Some(next));
    }

    #[test]
    fn seen_hashes_are_tracked() {
        let mut session = session(None);
        session.record_hashes(Some("#/0"), Some("#/0"));
        assert!(session.has_seen_hash("#/0"));
        assert!(!session.is_hash_routed());
        session.record_hashes(Some("#/0"), Some("#/1"));
        assert!(session.has_seen_hash("#/1"));
        assert!(session.is_hash_routed());
    }

    #[test]
    fn identifies_its_presentation() {
        let session = session(None);
        assert_eq!(session.target().as_str(), "https://example.com/deck/");
        assert_eq!(session.framework(), Framework::Generic);
    }

    #[rstest]
    #[case(StopReason::Api, true, true)]
    #[case(StopReason::Loop, true, true)]
    #[case(StopReason::HashStall, true, true)]
    #[case(StopReason::KnownCount, true, true)]
    #[case(StopReason::StepCeiling, false, true)]
    #[case(StopReason::BatchLimit, false, false)]
    fn stop_reason_classes(#[case] reason: StopReason, #[case] finished: bool, #[case] terminal: bool) {
        assert_eq!(reason.is_finished(), finished);
        assert_eq!(reason.is_terminal(), terminal);
    }
}
