use crate::capture::{Artifact, CaptureMode, StyleConfig, capture};
use crate::error::{ErrorKind, Result};
use crate::framework::{Detection, Framework, detect};
use crate::navigator::{Pacing, StepOutcome, advance};
use crate::oracle::{Oracle, Verdict};
use crate::page::error::ErrorKind as PageErrorKind;
use crate::page::{Launcher, Page, PageHandle, Script};
use crate::session::{PresentationSession, StopReason};
use crate::strategy::{Strategy, select};
use crate::wait::{wait_until, wait_until_stable};
use async_stream::stream;
use exn::ResultExt;
use futures::{Stream, StreamExt};
use serde_json::Value;
use std::pin::pin;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{instrument, warn};
use url::Url;

/// One traversal run (a whole deck, or one batch of it).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TraversalRequest {
    /// Address of the presentation. Any fragment is discarded before loading.
    pub target: String,
    /// Number of navigation steps to replay before the first capture.
    pub start_step: u64,
    /// Maximum number of steps (capture, then navigate) in this run.
    pub max_steps: u64,
    pub mode: CaptureMode,
}
impl TraversalRequest {
    /// A complete traversal, from the first step to the step ceiling.
    pub fn whole(target: impl Into<String>, mode: CaptureMode) -> Self {
        Self { target: target.into(), start_step: 0, max_steps: u64::MAX, mode }
    }

    /// One batch of a resumable traversal.
    pub fn batch(target: impl Into<String>, start_step: u64, max_steps: u64, mode: CaptureMode) -> Self {
        Self { target: target.into(), start_step, max_steps, mode }
    }
}

/// Timing and behaviour knobs shared by every run.
#[derive(Clone, Debug)]
pub struct TraversalOptions {
    /// Absolute bound on navigation attempts, replayed steps included.
    pub step_ceiling: u64,
    /// Delay after each navigation for transitions to finish.
    pub settle: Duration,
    /// Shorter delay used while replaying to a resume point.
    pub replay_settle: Duration,
    pub load_timeout: Duration,
    /// Upper bound on each readiness wait (document, network, then framework).
    pub ready_timeout: Duration,
    /// How long no new resource fetch may start before the network counts as
    /// idle.
    pub network_quiet: Duration,
    /// Upper bound on each capture, fingerprints included.
    pub capture_timeout: Duration,
    pub poll_interval: Duration,
    pub styles: StyleConfig,
}
impl Default for TraversalOptions {
    fn default() -> Self {
        Self {
            step_ceiling: 200,
            settle: Duration::from_millis(1000),
            replay_settle: Duration::from_millis(150),
            load_timeout: Duration::from_secs(120),
            ready_timeout: Duration::from_secs(10),
            network_quiet: Duration::from_millis(500),
            capture_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_millis(100),
            styles: StyleConfig::suppressing_chrome(),
        }
    }
}
impl TraversalOptions {
    fn pacing(&self, settle: Duration) -> Pacing {
        Pacing { settle, poll: self.poll_interval, fingerprint_timeout: self.capture_timeout }
    }
}

/// How a run ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Summary {
    pub stop: StopReason,
    /// Absolute step index the next batch should start from.
    pub ended_at: u64,
    pub captures: u64,
}

/// Progress events emitted by [`traverse`].
///
/// Events follow a strict ordering:
/// 1. [`Started`](Self::Started) exactly once, after load and detection.
/// 2. [`Replayed`](Self::Replayed) at most once, if the resume point was
///    reached without the deck ending.
/// 3. [`Captured`](Self::Captured) or [`CaptureSkipped`](Self::CaptureSkipped),
///    then [`Stepped`](Self::Stepped), once per step.
/// 4. [`Complete`](Self::Complete) exactly once.
///
/// [`Note`](Self::Note)s may appear anywhere after `Started`. A fatal error
/// (bad address, launch or load failure) is yielded instead of `Started` and
/// ends the stream.
#[derive(Debug)]
pub enum TraversalEvent {
    Started { target: Url, detection: Detection },
    /// The resume point was reached after this many replayed steps.
    Replayed(u64),
    Captured(Artifact),
    CaptureSkipped { step: u64, reason: String },
    Stepped { step: u64, outcome: StepOutcome },
    /// A recoverable problem worth surfacing.
    Note(String),
    Complete(Summary),
}

/// Folded result of a run.
#[derive(Clone, Debug, Default)]
pub struct Traversal {
    /// Captured steps, in order.
    pub artifacts: Vec<Artifact>,
    /// Absolute step index to resume from.
    pub ended_at: u64,
    /// The deck is known to have no further steps.
    pub finished: bool,
    pub stop: Option<StopReason>,
    pub framework: Framework,
    pub diagnostics: Vec<String>,
}
impl Traversal {
    pub fn absorb(&mut self, event: TraversalEvent) {
        match event {
            TraversalEvent::Started { detection, .. } => self.framework = detection.framework,
            TraversalEvent::Captured(artifact) => self.artifacts.push(artifact),
            TraversalEvent::CaptureSkipped { step, reason } => {
                self.diagnostics.push(format!("step {step} not captured: {reason}"));
            },
            TraversalEvent::Note(note) => self.diagnostics.push(note),
            TraversalEvent::Complete(summary) => {
                self.ended_at = summary.ended_at;
                self.finished = summary.stop.is_finished();
                self.stop = Some(summary.stop);
            },
            TraversalEvent::Replayed(_) | TraversalEvent::Stepped { .. } => {},
        }
    }

    /// `true` if another batch could not capture anything new.
    pub fn is_terminal(&self) -> bool {
        self.stop.is_some_and(|stop| stop.is_terminal())
    }
}

/// Run a traversal to completion and collect its artifacts.
#[instrument(skip_all, fields(target = %request.target, start = request.start_step, mode = %request.mode))]
pub async fn run_traversal(
    launcher: &dyn Launcher,
    request: &TraversalRequest,
    options: &TraversalOptions,
) -> Result<Traversal> {
    let mut traversal = Traversal::default();
    let mut events = pin!(traverse(launcher, request, options));
    while let Some(event) = events.next().await {
        traversal.absorb(event?);
    }
    tracing::info!(
        captures = traversal.artifacts.len(),
        ended_at = traversal.ended_at,
        finished = traversal.finished,
        "Traversal complete"
    );
    Ok(traversal)
}

/// Load a presentation and report which framework drives it.
#[instrument(skip(launcher, options))]
pub async fn detect_framework(launcher: &dyn Launcher, target: &str, options: &TraversalOptions) -> Result<Detection> {
    let target = normalize(target)?;
    let page = open(launcher, &target, options).await?;
    if !document_ready(&*page, options).await {
        warn!("Document not ready before detection");
    }
    if !network_idle(&*page, options).await {
        warn!("Network not idle before detection");
    }
    let (detection, note) = detect(&*page).await;
    if let Some(note) = note {
        warn!(note, "Detection degraded");
    }
    close(&*page).await;
    Ok(detection)
}

/// Stream a traversal of one presentation.
///
/// A fresh engine is launched for every call and closed before the stream
/// ends. Only failures to reach the presentation are fatal; everything after
/// that degrades into [`Note`](TraversalEvent::Note)s.
pub fn traverse<'a>(
    launcher: &'a dyn Launcher,
    request: &'a TraversalRequest,
    options: &'a TraversalOptions,
) -> impl Stream<Item = Result<TraversalEvent>> + Send + 'a {
    // `rustfmt` does not format macros that use braces. Wrap in parentheses!
    stream!({
        let target = match normalize(&request.target) {
            Ok(target) => target,
            Err(e) => {
                yield Err(e);
                return;
            },
        };
        let handle = match open(launcher, &target, options).await {
            Ok(handle) => handle,
            Err(e) => {
                yield Err(e);
                return;
            },
        };
        let page: &dyn Page = &*handle;

        let mut notes = Vec::new();
        if !document_ready(page, options).await {
            notes.push(format!("document not ready after {:?}", options.ready_timeout));
        }
        if !network_idle(page, options).await {
            notes.push(format!("network not idle after {:?}", options.ready_timeout));
        }
        let (detection, note) = detect(page).await;
        notes.extend(note);
        let strategy = select(detection);
        let strategy: &dyn Strategy = &*strategy;
        if !framework_ready(page, strategy, options).await {
            notes.push(format!("{} not ready after {:?}", detection.framework, options.ready_timeout));
        }
        if let Err(e) = options.styles.apply(page).await {
            notes.push(format!("style injection failed: {e}"));
        }
        let origin = strategy.position(page).await.ok().flatten();
        let total = strategy.total_steps(page).await.ok().flatten();

        tracing::info!(%detection, ?origin, ?total, "Presentation loaded");
        yield Ok(TraversalEvent::Started { target: target.clone(), detection });
        for note in notes.drain(..) {
            yield Ok(TraversalEvent::Note(note));
        }

        let mut session = PresentationSession::new(target, detection.framework, origin);
        let oracle = Oracle::new(options.step_ceiling, options.capture_timeout);
        let mut stop = None;

        if let Some(total) = total.filter(|total| request.start_step >= *total) {
            tracing::debug!(total, start = request.start_step, "Resume point beyond the last step");
            stop = Some(StopReason::KnownCount);
        }

        let replay = options.pacing(options.replay_settle);
        while stop.is_none() && session.steps_taken() < request.start_step {
            let mut step = advance(page, strategy, &session, &replay).await;
            let verdict = oracle.evaluate(page, &mut step, &mut session).await;
            for note in step.notes.drain(..) {
                yield Ok(TraversalEvent::Note(note));
            }
            if let Verdict::Stop(reason) = verdict {
                stop = Some(reason);
            }
        }
        if stop.is_none() && request.start_step > 0 {
            yield Ok(TraversalEvent::Replayed(session.steps_taken()));
        }

        let pacing = options.pacing(options.settle);
        let mut taken = 0;
        while stop.is_none() {
            if taken >= request.max_steps {
                stop = Some(StopReason::BatchLimit);
                break;
            }
            if session.steps_taken() >= options.step_ceiling {
                stop = Some(StopReason::StepCeiling);
                break;
            }

            let index = session.steps_taken();
            match capture(page, request.mode, index, options.capture_timeout).await {
                Ok(artifact) => {
                    session.record_capture();
                    yield Ok(TraversalEvent::Captured(artifact));
                },
                Err(e) => {
                    warn!(step = index, error = %e, "Capture failed, skipping step");
                    yield Ok(TraversalEvent::CaptureSkipped { step: index, reason: e.to_string() });
                },
            }

            let mut step = advance(page, strategy, &session, &pacing).await;
            let verdict = oracle.evaluate(page, &mut step, &mut session).await;
            for note in step.notes.drain(..) {
                yield Ok(TraversalEvent::Note(note));
            }
            yield Ok(TraversalEvent::Stepped { step: index, outcome: step.outcome });
            taken += 1;
            if let Verdict::Stop(reason) = verdict {
                stop = Some(reason);
            }
        }

        let stop = session.terminate(stop.unwrap_or(StopReason::BatchLimit));
        tracing::info!(
            url = %session.target(),
            framework = %session.framework(),
            %stop,
            steps = session.steps_taken(),
            captures = session.captures(),
            "Traversal ended"
        );
        close(page).await;
        // Nothing was replayed past a known end; resume where asked.
        let ended_at = match stop {
            StopReason::KnownCount => request.start_step,
            _ => session.steps_taken(),
        };
        yield Ok(TraversalEvent::Complete(Summary { stop, ended_at, captures: session.captures() }));
    })
}

/// Parse `target` and drop its fragment. Presentation frameworks encode their
/// position in the fragment; loading with one would start mid-deck.
fn normalize(target: &str) -> Result<Url> {
    let mut url = Url::parse(target.trim()).or_raise(|| ErrorKind::InvalidTarget(target.to_string()))?;
    if !matches!(url.scheme(), "http" | "https" | "file") {
        exn::bail!(ErrorKind::InvalidTarget(target.to_string()));
    }
    url.set_fragment(None);
    Ok(url)
}

async fn open(launcher: &dyn Launcher, target: &Url, options: &TraversalOptions) -> Result<PageHandle> {
    let page = launcher.launch().await.or_raise(|| ErrorKind::Launch)?;
    let loaded = match timeout(options.load_timeout, page.load(target.as_str(), options.load_timeout)).await {
        Ok(loaded) => loaded,
        Err(elapsed) => Err(elapsed).or_raise(|| PageErrorKind::Timeout),
    };
    if let Err(e) = loaded {
        let timed_out = matches!(&*e, PageErrorKind::Timeout);
        close(&*page).await;
        return Err(e).or_raise(|| if timed_out { ErrorKind::LoadTimeout } else { ErrorKind::Load });
    }
    Ok(page)
}

async fn close(page: &dyn Page) {
    if let Err(e) = page.close().await {
        warn!(error = %e, "Failed to close rendering engine");
    }
}

async fn document_ready(page: &dyn Page, options: &TraversalOptions) -> bool {
    wait_until(options.ready_timeout, options.poll_interval, move || async move {
        matches!(page.evaluate(&Script::DocumentReady).await, Ok(Value::Bool(true)))
    })
    .await
}

/// Wait until no new resource fetch has started for
/// [`network_quiet`](TraversalOptions::network_quiet).
async fn network_idle(page: &dyn Page, options: &TraversalOptions) -> bool {
    wait_until_stable(options.ready_timeout, options.poll_interval, options.network_quiet, move || async move {
        page.evaluate(&Script::ResourceCount).await.ok().and_then(|count| count.as_u64())
    })
    .await
}

async fn framework_ready(page: &dyn Page, strategy: &dyn Strategy, options: &TraversalOptions) -> bool {
    wait_until(options.ready_timeout, options.poll_interval, move || async move {
        strategy.ready(page).await.unwrap_or(false)
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockDeck, MockLauncher};
    use futures::TryStreamExt;
    use rstest::rstest;

    fn options() -> TraversalOptions {
        TraversalOptions {
            settle: Duration::ZERO,
            replay_settle: Duration::ZERO,
            ready_timeout: Duration::ZERO,
            network_quiet: Duration::ZERO,
            poll_interval: Duration::from_millis(1),
            ..TraversalOptions::default()
        }
    }

    async fn run(launcher: &MockLauncher, request: TraversalRequest) -> Traversal {
        run_traversal(launcher, &request, &options()).await.unwrap()
    }

    fn steps(traversal: &Traversal) -> Vec<u64> {
        traversal.artifacts.iter().map(|a| a.step).collect()
    }

    #[tokio::test]
    async fn unchanged_position_ends_the_deck() {
        let launcher = MockDeck::new(Framework::Bespoke, 4).launcher();
        let traversal = run(&launcher, TraversalRequest::whole("https://example.com/deck", CaptureMode::Vector)).await;
        assert_eq!(traversal.artifacts.len(), 4);
        assert!(traversal.finished);
        assert_eq!(traversal.stop, Some(StopReason::Api));
        assert_eq!(traversal.framework, Framework::Bespoke);
        assert_eq!(launcher.closes(), 1);
    }

    #[tokio::test]
    async fn static_generic_deck_stalls_after_one_capture() {
        let launcher = MockDeck::generic(1).launcher();
        let traversal = run(&launcher, TraversalRequest::whole("https://example.com/", CaptureMode::Raster)).await;
        assert_eq!(traversal.artifacts.len(), 1);
        assert!(traversal.finished);
        assert_eq!(traversal.stop, Some(StopReason::VisualStall));
    }

    #[rstest]
    #[case(Framework::Reveal, 6, StopReason::Api)]
    #[case(Framework::Remark, 3, StopReason::Api)]
    #[case(Framework::Impress, 5, StopReason::Api)]
    #[tokio::test]
    async fn api_decks_capture_every_step(#[case] framework: Framework, #[case] count: u64, #[case] stop: StopReason) {
        let launcher = MockDeck::new(framework, count).launcher();
        let traversal = run(&launcher, TraversalRequest::whole("https://example.com/", CaptureMode::Vector)).await;
        assert_eq!(steps(&traversal), (0..count).collect::<Vec<_>>());
        assert_eq!(traversal.stop, Some(stop));
        assert!(traversal.diagnostics.is_empty(), "{:?}", traversal.diagnostics);
    }

    #[rstest]
    #[case(Framework::Impress)]
    #[case(Framework::Bespoke)]
    #[tokio::test]
    async fn wrapping_deck_is_a_loop(#[case] framework: Framework) {
        let launcher = MockDeck::new(framework, 5).wrapping().launcher();
        let traversal = run(&launcher, TraversalRequest::whole("https://example.com/", CaptureMode::Vector)).await;
        assert_eq!(traversal.artifacts.len(), 5);
        assert_eq!(traversal.stop, Some(StopReason::Loop));
        assert!(traversal.finished);
    }

    #[tokio::test]
    async fn keyboard_deck_ends_on_visual_stall() {
        let launcher = MockDeck::new(Framework::Reveal, 4).markup_only().launcher();
        let traversal = run(&launcher, TraversalRequest::whole("https://example.com/", CaptureMode::Raster)).await;
        assert_eq!(traversal.framework, Framework::Reveal);
        assert_eq!(steps(&traversal), vec![0, 1, 2, 3]);
        assert_eq!(traversal.stop, Some(StopReason::VisualStall));
    }

    #[tokio::test]
    async fn disabled_button_ends_the_deck() {
        let launcher = MockDeck::generic(3).with_next_button().without_keyboard().launcher();
        let traversal = run(&launcher, TraversalRequest::whole("https://example.com/", CaptureMode::Raster)).await;
        assert_eq!(traversal.artifacts.len(), 3);
        assert_eq!(traversal.stop, Some(StopReason::ButtonState));
        assert!(traversal.finished);
    }

    #[tokio::test]
    async fn failed_capture_is_skipped() {
        let launcher = MockDeck::new(Framework::Bespoke, 5).failing_capture(2).launcher();
        let traversal = run(&launcher, TraversalRequest::whole("https://example.com/", CaptureMode::Vector)).await;
        assert_eq!(steps(&traversal), vec![0, 1, 3, 4]);
        assert!(traversal.finished);
        assert_eq!(traversal.diagnostics.len(), 1);
    }

    #[tokio::test]
    async fn endless_deck_hits_the_ceiling() {
        let launcher = MockDeck::generic(1_000).launcher();
        let options = TraversalOptions { step_ceiling: 7, ..options() };
        let request = TraversalRequest::whole("https://example.com/", CaptureMode::Raster);
        let traversal = run_traversal(&launcher, &request, &options).await.unwrap();
        assert_eq!(traversal.artifacts.len(), 7);
        assert_eq!(traversal.stop, Some(StopReason::StepCeiling));
        assert!(!traversal.finished);
        assert!(traversal.is_terminal());
    }

    #[tokio::test]
    async fn batches_match_a_single_run() {
        let url = "https://example.com/talk/#/3";
        let launcher = MockDeck::new(Framework::Reveal, 10).launcher();
        let whole = run(&launcher, TraversalRequest::batch(url, 0, 13, CaptureMode::Vector)).await;

        let first = run(&launcher, TraversalRequest::batch(url, 0, 3, CaptureMode::Vector)).await;
        assert_eq!(first.stop, Some(StopReason::BatchLimit));
        assert!(!first.finished);
        assert_eq!(first.ended_at, 3);
        let second = run(&launcher, TraversalRequest::batch(url, first.ended_at, 10, CaptureMode::Vector)).await;

        let batched: Vec<_> = first.artifacts.into_iter().chain(second.artifacts).collect();
        assert_eq!(batched, whole.artifacts);
        assert!(second.finished);
        assert_eq!(launcher.launches(), 3);
        assert_eq!(launcher.closes(), 3);
    }

    #[tokio::test]
    async fn batch_ending_on_the_last_step_reports_finished() {
        let launcher = MockDeck::new(Framework::Bespoke, 4).launcher();
        let traversal = run(&launcher, TraversalRequest::batch("https://example.com/", 0, 4, CaptureMode::Vector)).await;
        assert_eq!(traversal.artifacts.len(), 4);
        assert!(traversal.finished);
    }

    #[tokio::test]
    async fn known_step_count_short_circuits() {
        let launcher = MockDeck::new(Framework::Reveal, 5).with_total(5).launcher();
        let traversal = run(&launcher, TraversalRequest::batch("https://example.com/", 5, 10, CaptureMode::Vector)).await;
        assert!(traversal.artifacts.is_empty());
        assert_eq!(traversal.stop, Some(StopReason::KnownCount));
        assert!(traversal.finished);
        assert_eq!(traversal.ended_at, 5);
    }

    #[tokio::test]
    async fn replay_reaching_the_end() {
        let launcher = MockDeck::new(Framework::Bespoke, 3).launcher();
        let traversal = run(&launcher, TraversalRequest::batch("https://example.com/", 8, 10, CaptureMode::Vector)).await;
        assert!(traversal.artifacts.is_empty());
        assert!(traversal.finished);
        assert_eq!(traversal.stop, Some(StopReason::Api));
    }

    #[tokio::test]
    async fn zero_step_batch_captures_nothing() {
        let launcher = MockDeck::new(Framework::Bespoke, 3).launcher();
        let traversal = run(&launcher, TraversalRequest::batch("https://example.com/", 1, 0, CaptureMode::Vector)).await;
        assert!(traversal.artifacts.is_empty());
        assert_eq!(traversal.stop, Some(StopReason::BatchLimit));
        assert_eq!(traversal.ended_at, 1);
    }

    #[tokio::test]
    async fn fragment_is_stripped_before_loading() {
        let launcher = MockDeck::generic(1).launcher();
        run(&launcher, TraversalRequest::whole("https://example.com/deck?theme=dark#/4/2", CaptureMode::Raster)).await;
        assert_eq!(launcher.loaded().await, vec!["https://example.com/deck?theme=dark".to_string()]);
    }

    #[rstest]
    #[case("not a url")]
    #[case("/relative/path")]
    #[case("mailto:someone@example.com")]
    #[tokio::test]
    async fn invalid_target_is_fatal(#[case] target: &str) {
        let launcher = MockDeck::generic(1).launcher();
        let request = TraversalRequest::whole(target, CaptureMode::Raster);
        let err = run_traversal(&launcher, &request, &options()).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidTarget(_)));
        assert_eq!(launcher.launches(), 0);
    }

    #[tokio::test]
    async fn load_failure_is_fatal_and_closes_the_engine() {
        let launcher = MockDeck::generic(3).failing_load().launcher();
        let request = TraversalRequest::whole("https://example.com/", CaptureMode::Raster);
        let err = run_traversal(&launcher, &request, &options()).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Load));
        assert!(!err.is_retryable());
        assert_eq!(launcher.closes(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_load_times_out() {
        let launcher = MockDeck::generic(3).hanging_load().launcher();
        let request = TraversalRequest::whole("https://example.com/", CaptureMode::Raster);
        let err = run_traversal(&launcher, &request, &options()).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::LoadTimeout));
        assert!(err.is_retryable());
        assert_eq!(launcher.closes(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_capture_is_skipped() {
        let launcher = MockDeck::new(Framework::Bespoke, 4).slow_capture(1).launcher();
        let request = TraversalRequest::whole("https://example.com/", CaptureMode::Vector);
        let options = options();
        let events: Vec<_> = traverse(&launcher, &request, &options).try_collect().await.unwrap();
        let skipped: Vec<_> = events
            .iter()
            .filter_map(|event| match event {
                TraversalEvent::CaptureSkipped { step, reason } => Some((*step, reason.as_str())),
                _ => None,
            })
            .collect();
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].0, 1);
        assert!(skipped[0].1.contains("timed out"), "{}", skipped[0].1);
        assert!(matches!(
            events.last(),
            Some(TraversalEvent::Complete(Summary { stop: StopReason::Api, captures: 3, .. }))
        ));
    }

    #[tokio::test]
    async fn frozen_view_stalls_after_one_capture() {
        let launcher = MockDeck::generic(4).frozen().launcher();
        let traversal = run(&launcher, TraversalRequest::whole("https://example.com/", CaptureMode::Raster)).await;
        assert_eq!(steps(&traversal), vec![0]);
        assert_eq!(traversal.stop, Some(StopReason::VisualStall));
    }

    #[rstest]
    #[case::frozen(MockDeck::generic(4).frozen().hash_routed())]
    #[case::animated(MockDeck::generic(4).animated().hash_routed())]
    #[tokio::test]
    async fn hash_routed_deck_ends_when_the_address_holds(#[case] deck: MockDeck) {
        let launcher = deck.launcher();
        let traversal = run(&launcher, TraversalRequest::whole("https://example.com/", CaptureMode::Raster)).await;
        assert_eq!(steps(&traversal), vec![0, 1, 2, 3]);
        assert_eq!(traversal.stop, Some(StopReason::HashStall));
        assert!(traversal.finished);
    }

    #[tokio::test]
    async fn hash_routed_wrapping_deck_is_a_loop() {
        let launcher = MockDeck::generic(3).hash_routed().wrapping().launcher();
        let traversal = run(&launcher, TraversalRequest::whole("https://example.com/", CaptureMode::Raster)).await;
        assert_eq!(steps(&traversal), vec![0, 1, 2]);
        assert_eq!(traversal.stop, Some(StopReason::Loop));
    }

    #[rstest]
    #[case::space(MockDeck::new(Framework::Reveal, 5), &["0", "1", "2", "3", "4"])]
    #[case::arrow_only(MockDeck::new(Framework::Reveal, 5).without_space(), &["0", "1", "4"])]
    #[tokio::test]
    async fn vertical_stack_in_markup_only_reveal(#[case] deck: MockDeck, #[case] expected: &[&str]) {
        let launcher = deck.markup_only().with_vertical([2, 3]).launcher();
        let traversal = run(&launcher, TraversalRequest::whole("https://example.com/", CaptureMode::Raster)).await;
        // Mock rasters end in the index of the slide they show.
        let shown: Vec<_> = traversal
            .artifacts
            .iter()
            .map(|a| String::from_utf8_lossy(&a.bytes).rsplit(':').next().unwrap_or_default().to_string())
            .collect();
        assert_eq!(shown, expected);
        assert_eq!(traversal.stop, Some(StopReason::VisualStall));
    }

    #[tokio::test(start_paused = true)]
    async fn waits_for_the_network_to_settle() {
        let options = TraversalOptions {
            ready_timeout: Duration::from_secs(10),
            network_quiet: Duration::from_millis(500),
            poll_interval: Duration::from_millis(100),
            ..options()
        };
        let request = TraversalRequest::whole("https://example.com/", CaptureMode::Raster);

        let launcher = MockDeck::generic(1).loading_resources(5).launcher();
        let traversal = run_traversal(&launcher, &request, &options).await.unwrap();
        assert!(traversal.diagnostics.is_empty(), "{:?}", traversal.diagnostics);
        assert!(launcher.resource_reads() >= 10);

        let launcher = MockDeck::generic(1).loading_resources(u64::MAX).launcher();
        let traversal = run_traversal(&launcher, &request, &options).await.unwrap();
        assert!(traversal.diagnostics.iter().any(|d| d.starts_with("network not idle")), "{:?}", traversal.diagnostics);
        assert_eq!(traversal.artifacts.len(), 1);
    }

    #[tokio::test]
    async fn detection_failure_degrades_to_generic() {
        let launcher = MockDeck::new(Framework::Reveal, 2).failing_script(Script::Detect).launcher();
        let traversal = run(&launcher, TraversalRequest::whole("https://example.com/", CaptureMode::Raster)).await;
        assert_eq!(traversal.framework, Framework::Generic);
        assert!(traversal.diagnostics.iter().any(|d| d.contains("detection")));
        assert_eq!(traversal.artifacts.len(), 2);
    }

    #[tokio::test]
    async fn events_are_ordered() {
        let launcher = MockDeck::new(Framework::Remark, 2).launcher();
        let request = TraversalRequest::batch("https://example.com/", 1, 5, CaptureMode::Vector);
        let options = options();
        let events: Vec<_> = traverse(&launcher, &request, &options).try_collect().await.unwrap();
        assert!(matches!(events.first(), Some(TraversalEvent::Started { .. })));
        assert!(matches!(events.get(1), Some(TraversalEvent::Replayed(1))));
        assert!(matches!(events.get(2), Some(TraversalEvent::Captured(Artifact { step: 1, .. }))));
        assert!(matches!(
            events.last(),
            Some(TraversalEvent::Complete(Summary { stop: StopReason::Api, ended_at: 2, captures: 1 }))
        ));
    }

    #[tokio::test]
    async fn detects_without_traversing() {
        let launcher = MockDeck::new(Framework::Impress, 3).launcher();
        let detection = detect_framework(&launcher, "https://example.com/", &options()).await.unwrap();
        assert_eq!(detection, Detection { framework: Framework::Impress, api: true });
        assert_eq!(launcher.closes(), 1);
    }
}
