//! Scripted in-memory presentation for testing.

use crate::framework::Framework;
use crate::page::error::{ErrorKind, Result};
use crate::page::{Fidelity, Key, Launcher, Page, PageHandle, Script, Viewport};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::HashSet;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

/// Produces the bytes of a capture of step `index`.
#[derive(Clone)]
struct Render(Arc<dyn Fn(u64) -> Vec<u8> + Send + Sync>);
impl Debug for Render {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str("Render")
    }
}

/// A deterministic presentation with a fixed number of steps.
///
/// Each launch starts a fresh copy at step 0, the way a real engine reloads
/// the deck from scratch. Captures encode the current step index, so
/// artifact bytes can be compared across runs.
#[derive(Clone, Debug)]
pub struct MockDeck {
    framework: Framework,
    api: bool,
    steps: u64,
    wraps: bool,
    total: Option<u64>,
    next_button: bool,
    keyboard: bool,
    space: bool,
    vertical: HashSet<u64>,
    hash_routed: bool,
    frozen: bool,
    animated: bool,
    resources: u64,
    failing_captures: HashSet<u64>,
    slow_captures: HashSet<u64>,
    failing_scripts: HashSet<Script>,
    failing_load: bool,
    hanging_load: bool,
    rasters: Option<Render>,
    documents: Option<Render>,
}

impl MockDeck {
    /// A deck driven by `framework`'s control API.
    ///
    /// Panics if `steps` is zero. A deck always has a first step.
    pub fn new(framework: Framework, steps: u64) -> Self {
        assert!(steps > 0, "MockDeck needs at least one step");
        Self {
            framework,
            api: framework != Framework::Generic,
            steps,
            wraps: false,
            total: None,
            next_button: false,
            keyboard: true,
            space: true,
            vertical: HashSet::new(),
            hash_routed: false,
            frozen: false,
            animated: false,
            resources: 0,
            failing_captures: HashSet::new(),
            slow_captures: HashSet::new(),
            failing_scripts: HashSet::new(),
            failing_load: false,
            hanging_load: false,
            rasters: None,
            documents: None,
        }
    }

    /// A deck without any framework, navigable by keyboard only.
    pub fn generic(steps: u64) -> Self {
        Self::new(Framework::Generic, steps)
    }

    /// Framework markup is present but its control object is not reachable.
    pub fn markup_only(mut self) -> Self {
        self.api = false;
        self
    }

    /// Advancing past the last step returns to the first.
    pub fn wrapping(mut self) -> Self {
        self.wraps = true;
        self
    }

    /// The framework reports `total` as its step count.
    pub fn with_total(mut self, total: u64) -> Self {
        self.total = Some(total);
        self
    }

    /// A visible "next" button, disabled on the last step.
    pub fn with_next_button(mut self) -> Self {
        self.next_button = true;
        self
    }

    /// Key presses have no effect.
    pub fn without_keyboard(mut self) -> Self {
        self.keyboard = false;
        self
    }

    /// `Space` has no effect. `ArrowRight` still navigates.
    pub fn without_space(mut self) -> Self {
        self.space = false;
        self
    }

    /// Steps `indices` sit below the step before them. `Space` visits them in
    /// order; `ArrowRight` jumps over them to the next top-level step.
    pub fn with_vertical(mut self, indices: impl IntoIterator<Item = u64>) -> Self {
        self.vertical.extend(indices);
        self
    }

    /// Every step has its own `#/<index>` fragment.
    pub fn hash_routed(mut self) -> Self {
        self.hash_routed = true;
        self
    }

    /// The document keeps fetching resources until `count` have started.
    /// Each read sees one more resource.
    pub fn loading_resources(mut self, count: u64) -> Self {
        self.resources = count;
        self
    }

    /// Every capture shows the same image whatever the step.
    pub fn frozen(mut self) -> Self {
        self.frozen = true;
        self
    }

    /// Every capture differs from the previous one, even on the same step.
    pub fn animated(mut self) -> Self {
        self.animated = true;
        self
    }

    /// Full-fidelity captures of step `index` fail.
    pub fn failing_capture(mut self, index: u64) -> Self {
        self.failing_captures.insert(index);
        self
    }

    /// Full-fidelity captures of step `index` take an hour.
    pub fn slow_capture(mut self, index: u64) -> Self {
        self.slow_captures.insert(index);
        self
    }

    /// Evaluating `script` throws.
    pub fn failing_script(mut self, script: Script) -> Self {
        self.failing_scripts.insert(script);
        self
    }

    /// Loading the deck fails.
    pub fn failing_load(mut self) -> Self {
        self.failing_load = true;
        self
    }

    /// Loading the deck never completes.
    pub fn hanging_load(mut self) -> Self {
        self.hanging_load = true;
        self
    }

    /// Full-fidelity raster captures are produced by `render`.
    pub fn with_rasters(mut self, render: impl Fn(u64) -> Vec<u8> + Send + Sync + 'static) -> Self {
        self.rasters = Some(Render(Arc::new(render)));
        self
    }

    /// Vector captures are produced by `render`.
    pub fn with_documents(mut self, render: impl Fn(u64) -> Vec<u8> + Send + Sync + 'static) -> Self {
        self.documents = Some(Render(Arc::new(render)));
        self
    }

    pub fn launcher(self) -> MockLauncher {
        MockLauncher { deck: self, counters: Arc::default() }
    }
}

#[derive(Debug, Default)]
struct Counters {
    launches: AtomicU64,
    closes: AtomicU64,
    resource_reads: AtomicU64,
    loaded: Mutex<Vec<String>>,
}

/// Launches fresh [`MockDeck`] pages and counts engine lifecycles.
#[derive(Clone, Debug)]
pub struct MockLauncher {
    deck: MockDeck,
    counters: Arc<Counters>,
}

impl MockLauncher {
    pub fn launches(&self) -> u64 {
        self.counters.launches.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> u64 {
        self.counters.closes.load(Ordering::SeqCst)
    }

    /// Number of times any page was asked for its resource count.
    pub fn resource_reads(&self) -> u64 {
        self.counters.resource_reads.load(Ordering::SeqCst)
    }

    /// Every address loaded so far, in order.
    pub async fn loaded(&self) -> Vec<String> {
        self.counters.loaded.lock().await.clone()
    }
}

#[async_trait]
impl Launcher for MockLauncher {
    async fn launch(&self) -> Result<PageHandle> {
        self.counters.launches.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockPage {
            deck: self.deck.clone(),
            counters: Arc::clone(&self.counters),
            index: Mutex::new(0),
            frames: AtomicU64::new(0),
        }))
    }
}

struct MockPage {
    deck: MockDeck,
    counters: Arc<Counters>,
    index: Mutex<u64>,
    frames: AtomicU64,
}

impl MockPage {
    fn step_forward(&self, index: &mut u64) {
        if *index + 1 < self.deck.steps {
            *index += 1;
        } else if self.deck.wraps {
            *index = 0;
        }
    }

    /// Move to the next step that is not below another one.
    fn step_across(&self, index: &mut u64) {
        let across = (*index + 1..self.deck.steps).find(|next| !self.deck.vertical.contains(next));
        match across {
            Some(next) => *index = next,
            None if self.deck.wraps => *index = 0,
            None => {},
        }
    }

    async fn slow(&self, index: u64) {
        if self.deck.slow_captures.contains(&index) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
    }

    fn position(&self, index: u64) -> Value {
        match self.deck.framework {
            Framework::Reveal => json!({ "h": index, "v": 0, "f": 0 }),
            _ => json!(index),
        }
    }
}

#[async_trait]
impl Page for MockPage {
    fn viewport(&self) -> Viewport {
        Viewport::default()
    }

    async fn load(&self, url: &str, _timeout: Duration) -> Result<()> {
        self.counters.loaded.lock().await.push(url.to_string());
        if self.deck.failing_load {
            exn::bail!(ErrorKind::Load);
        }
        if self.deck.hanging_load {
            std::future::pending::<()>().await;
        }
        Ok(())
    }

    async fn evaluate(&self, script: &Script) -> Result<Value> {
        if self.deck.failing_scripts.contains(script) {
            exn::bail!(ErrorKind::Script);
        }
        let mut index = self.index.lock().await;
        let last = *index + 1 == self.deck.steps;
        let own = |framework: &Framework| self.deck.api && *framework == self.deck.framework;
        Ok(match script {
            Script::Detect => {
                let name = self.deck.framework.to_string();
                let marked = self.deck.framework != Framework::Generic;
                let globals = if self.deck.api { vec![name.clone()] } else { vec![] };
                let markers = if marked { vec![name] } else { vec![] };
                json!({ "globals": globals, "markers": markers })
            },
            Script::DocumentReady => json!(true),
            Script::ResourceCount => {
                let reads = self.counters.resource_reads.fetch_add(1, Ordering::SeqCst) + 1;
                json!(reads.min(self.deck.resources))
            },
            Script::Hash if self.deck.hash_routed => json!(format!("#/{}", *index)),
            Script::Hash => json!(""),
            Script::FrameworkReady(framework) => json!(own(framework)),
            Script::Position(framework) if own(framework) => self.position(*index),
            Script::IsLastStep(framework @ (Framework::Reveal | Framework::Remark)) if own(framework) => {
                json!(last && !self.deck.wraps)
            },
            Script::TotalSteps(framework) if own(framework) => json!(self.deck.total),
            Script::Next(framework) if own(framework) => {
                self.step_forward(&mut index);
                Value::Null
            },
            Script::ClickNext if self.deck.next_button => {
                if last && !self.deck.wraps {
                    json!({ "found": true, "disabled": true })
                } else {
                    self.step_forward(&mut index);
                    json!({ "found": true, "disabled": false })
                }
            },
            Script::ClickNext => json!({ "found": false, "disabled": false }),
            _ => Value::Null,
        })
    }

    async fn inject_style(&self, _css: &str) -> Result<()> {
        Ok(())
    }

    async fn press_key(&self, key: Key) -> Result<()> {
        if !self.deck.keyboard {
            return Ok(());
        }
        let mut index = self.index.lock().await;
        match key {
            Key::Space if self.deck.space => self.step_forward(&mut index),
            Key::Space => {},
            Key::ArrowRight => self.step_across(&mut index),
        }
        Ok(())
    }

    async fn capture_raster(&self, fidelity: Fidelity) -> Result<Vec<u8>> {
        let index = *self.index.lock().await;
        if fidelity == Fidelity::Full {
            if self.deck.failing_captures.contains(&index) {
                exn::bail!(ErrorKind::Capture);
            }
            self.slow(index).await;
            if let Some(Render(render)) = &self.deck.rasters {
                return Ok(render(index));
            }
        }
        if self.deck.frozen {
            return Ok(format!("raster:{fidelity}:frozen").into_bytes());
        }
        if self.deck.animated {
            let frame = self.frames.fetch_add(1, Ordering::SeqCst);
            return Ok(format!("raster:{fidelity}:{index}:{frame}").into_bytes());
        }
        Ok(format!("raster:{fidelity}:{index}").into_bytes())
    }

    async fn capture_document(&self, viewport: Viewport) -> Result<Vec<u8>> {
        let index = *self.index.lock().await;
        if self.deck.failing_captures.contains(&index) {
            exn::bail!(ErrorKind::Capture);
        }
        self.slow(index).await;
        if let Some(Render(render)) = &self.deck.documents {
            return Ok(render(index));
        }
        Ok(format!("vector:{viewport}:{index}").into_bytes())
    }

    async fn close(&self) -> Result<()> {
        self.counters.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
