//! Scripts evaluated in page context.
//!
//! Every script is a self-contained expression (usually an IIFE) returning a
//! JSON-serialisable value. Engines only ever see the source text; test
//! doubles match on the [`Script`] variant instead.

use crate::framework::Framework;
use derive_more::Display;

/// A script the traversal core evaluates in page context.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash)]
pub enum Script {
    /// `{ globals: string[], markers: string[] }` naming detected frameworks.
    #[display("detect")]
    Detect,
    /// `true` once `document.readyState` is `"complete"`.
    #[display("document-ready")]
    DocumentReady,
    /// Number of resource fetches the document has started so far.
    #[display("resource-count")]
    ResourceCount,
    /// `location.hash`, empty when the address has no fragment.
    #[display("hash")]
    Hash,
    /// `true` once the framework finished its own initialisation.
    #[display("{_0}:ready")]
    FrameworkReady(Framework),
    /// Current position: `{ h, v, f }` or a plain step index.
    #[display("{_0}:position")]
    Position(Framework),
    /// `true` when no further step exists.
    #[display("{_0}:is-last")]
    IsLastStep(Framework),
    /// Upper bound on the number of steps, or `null` if unknown.
    #[display("{_0}:total")]
    TotalSteps(Framework),
    /// Invoke the framework's native "next step" control.
    #[display("{_0}:next")]
    Next(Framework),
    /// Find and click a visible "next" affordance: `{ found, disabled }`.
    #[display("click-next")]
    ClickNext,
}

impl Script {
    /// JavaScript source for this script.
    pub fn source(&self) -> &'static str {
        match self {
            Self::Detect => DETECT,
            Self::DocumentReady => "document.readyState === 'complete'",
            Self::ResourceCount => "performance.getEntriesByType('resource').length",
            Self::Hash => "window.location.hash",
            Self::FrameworkReady(framework) => api(*framework).ready,
            Self::Position(framework) => api(*framework).position,
            Self::IsLastStep(framework) => api(*framework).is_last,
            Self::TotalSteps(framework) => api(*framework).total,
            Self::Next(framework) => api(*framework).next,
            Self::ClickNext => CLICK_NEXT,
        }
    }
}

struct ApiScripts {
    ready: &'static str,
    position: &'static str,
    is_last: &'static str,
    total: &'static str,
    next: &'static str,
}

fn api(framework: Framework) -> &'static ApiScripts {
    match framework {
        Framework::Reveal => &REVEAL,
        Framework::Remark => &REMARK,
        Framework::Impress => &IMPRESS,
        Framework::Bespoke => &BESPOKE,
        Framework::Generic => &GENERIC,
    }
}

const DETECT: &str = r#"(() => {
  const globals = [];
  if (window.Reveal && typeof window.Reveal.next === 'function') globals.push('reveal');
  if (window.slideshow && typeof window.slideshow.gotoNextSlide === 'function') globals.push('remark');
  if (typeof window.impress === 'function' && document.getElementById('impress')) globals.push('impress');
  const deck = window.deck || (window.bespoke && window.bespoke.decks && window.bespoke.decks[0]);
  if (deck && typeof deck.next === 'function' && typeof deck.slide === 'function') globals.push('bespoke');
  const markers = [];
  if (document.querySelector('.reveal .slides')) markers.push('reveal');
  if (document.querySelector('.remark-slides-area, .remark-slide-container')) markers.push('remark');
  if (document.querySelector('#impress .step, body.impress-enabled')) markers.push('impress');
  if (document.querySelector('.bespoke-parent')) markers.push('bespoke');
  return { globals, markers };
})()"#;

// Elements hidden by the suppression stylesheet only have their opacity
// changed, so they still have client rects and remain clickable.
const CLICK_NEXT: &str = r#"(() => {
  const selectors = [
    '.navigate-right', '.next-slide', '.slide-next', '.arrow-right', '.nav-next',
    'button.next', 'a.next', '[rel="next"]',
    '[aria-label*="next slide" i]', '[aria-label*="next" i]', '[title*="next" i]'
  ];
  const words = /(^|[^\p{L}\p{N}])(next|avanti|successiva|suivant|siguiente|weiter|próximo|volgende)($|[^\p{L}\p{N}])/u;
  const symbols = ['>', '→', '›', '»'];
  const present = (el) => el.getClientRects().length > 0;
  let target = null;
  for (const selector of selectors) {
    target = Array.from(document.querySelectorAll(selector)).find(present) || null;
    if (target) break;
  }
  if (!target) {
    target = Array.from(document.querySelectorAll('a, button, [role="button"]')).find((el) => {
      const text = (el.textContent || '').trim().toLowerCase();
      return present(el) && text.length > 0 && text.length <= 24 && (words.test(text) || symbols.some((s) => text.includes(s)));
    }) || null;
  }
  if (!target) return { found: false, disabled: false };
  const disabled = target.disabled === true
    || target.getAttribute('aria-disabled') === 'true'
    || target.classList.contains('disabled')
    || (target.classList.contains('navigate-right') && !target.classList.contains('enabled'));
  if (!disabled) target.click();
  return { found: true, disabled };
})()"#;

const REVEAL: ApiScripts = ApiScripts {
    ready: "(() => typeof Reveal.isReady !== 'function' || Reveal.isReady())()",
    position: r#"(() => {
  const i = Reveal.getIndices();
  return { h: i.h || 0, v: i.v || 0, f: (typeof i.f === 'number' && i.f >= 0) ? i.f + 1 : 0 };
})()"#,
    is_last: r#"(() => {
  const last = typeof Reveal.isLastSlide === 'function' && Reveal.isLastSlide();
  const fragments = typeof Reveal.availableFragments === 'function' ? Reveal.availableFragments() : { next: false };
  return last && !fragments.next;
})()"#,
    total: r#"(() => {
  if (typeof Reveal.getTotalSlides !== 'function') return null;
  return Reveal.getTotalSlides() + document.querySelectorAll('.reveal .slides .fragment').length;
})()"#,
    next: "(() => { Reveal.next(); return true; })()",
};

const REMARK: ApiScripts = ApiScripts {
    ready: "(() => slideshow.getSlideCount() > 0)()",
    position: "(() => slideshow.getCurrentSlideIndex())()",
    is_last: "(() => slideshow.getCurrentSlideIndex() >= slideshow.getSlideCount() - 1)()",
    total: "(() => slideshow.getSlideCount())()",
    next: "(() => { slideshow.gotoNextSlide(); return true; })()",
};

const IMPRESS: ApiScripts = ApiScripts {
    ready: "(() => document.body.classList.contains('impress-enabled'))()",
    position: r#"(() => {
  const steps = Array.from(document.querySelectorAll('#impress .step'));
  const active = document.querySelector('#impress .step.active');
  return active ? steps.indexOf(active) : null;
})()"#,
    is_last: "null",
    total: "(() => document.querySelectorAll('#impress .step').length || null)()",
    next: "(() => { impress().next(); return true; })()",
};

const BESPOKE: ApiScripts = ApiScripts {
    ready: "(() => !!(window.deck || (window.bespoke && window.bespoke.decks && window.bespoke.decks[0])))()",
    position: r#"(() => {
  const deck = window.deck || window.bespoke.decks[0];
  return deck.slide();
})()"#,
    is_last: "null",
    total: r#"(() => {
  const deck = window.deck || window.bespoke.decks[0];
  return Array.isArray(deck.slides) ? deck.slides.length : null;
})()"#,
    next: r#"(() => {
  const deck = window.deck || window.bespoke.decks[0];
  deck.next();
  return true;
})()"#,
};

const GENERIC: ApiScripts = ApiScripts { ready: "true", position: "null", is_last: "null", total: "null", next: "false" };
