//! Presentation framework detection.
//!
//! Detection happens exactly once per session, after the page (and its own
//! initialisation scripts) finished loading. Running it earlier risks the
//! framework's globals not existing yet, which silently downgrades navigation
//! to the generic, less reliable methods.

use crate::page::{Page, Script};
use derive_more::Display;
use serde::Deserialize;
use tracing::instrument;

/// Which presentation framework drives a page.
#[derive(Clone, Copy, Debug, Display, Default, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Framework {
    #[display("reveal")]
    Reveal,
    #[display("remark")]
    Remark,
    #[display("impress")]
    Impress,
    #[display("bespoke")]
    Bespoke,
    /// No known framework; navigation falls back to DOM and keyboard input.
    #[default]
    #[display("generic")]
    Generic,
}
impl Framework {
    /// Detection precedence. Earlier entries win when several match.
    pub const PRECEDENCE: [Framework; 4] = [Self::Reveal, Self::Remark, Self::Impress, Self::Bespoke];
}

/// Raw detection signals reported by [`Script::Detect`].
#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
pub struct Signals {
    /// Frameworks whose global control object is present.
    #[serde(default)]
    pub globals: Vec<Framework>,
    /// Frameworks whose DOM marker classes are present.
    #[serde(default)]
    pub markers: Vec<Framework>,
}

/// Outcome of framework detection.
#[derive(Clone, Copy, Debug, Display, Default, PartialEq, Eq)]
#[display("{framework} (api: {api})")]
pub struct Detection {
    pub framework: Framework,
    /// Whether the framework's control object is reachable from script. A
    /// framework recognised only by its markup cannot be driven through its
    /// API.
    pub api: bool,
}
impl Detection {
    /// Decide on a framework: globals beat markers, and within each group
    /// [`Framework::PRECEDENCE`] applies.
    pub fn from_signals(signals: &Signals) -> Self {
        let first = |found: &[Framework]| Framework::PRECEDENCE.into_iter().find(|f| found.contains(f));
        if let Some(framework) = first(&signals.globals) {
            return Self { framework, api: true };
        }
        if let Some(framework) = first(&signals.markers) {
            return Self { framework, api: false };
        }
        Self::default()
    }
}

/// Classify the framework driving `page`.
///
/// A detection script that throws or returns garbage is not fatal: the page
/// is treated as [`Framework::Generic`] and the reason is returned alongside
/// for diagnostics.
#[instrument(skip_all)]
pub async fn detect(page: &dyn Page) -> (Detection, Option<String>) {
    let value = match page.evaluate(&Script::Detect).await {
        Ok(value) => value,
        Err(e) => return (Detection::default(), Some(format!("framework detection failed: {e}"))),
    };
    match serde_json::from_value::<Signals>(value) {
        Ok(signals) => {
            let detection = Detection::from_signals(&signals);
            tracing::debug!(?signals, %detection, "Framework signals evaluated");
            (detection, None)
        },
        Err(e) => (Detection::default(), Some(format!("framework detection returned unexpected data: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case(json!({"globals": [], "markers": []}), Framework::Generic, false)]
    #[case(json!({"globals": ["reveal"], "markers": ["reveal"]}), Framework::Reveal, true)]
    #[case(json!({"globals": [], "markers": ["remark"]}), Framework::Remark, false)]
    #[case(json!({"globals": ["bespoke", "impress"], "markers": []}), Framework::Impress, true)]
    #[case(json!({"globals": ["bespoke"], "markers": ["reveal"]}), Framework::Bespoke, true)]
    #[case(json!({"markers": ["bespoke", "remark"]}), Framework::Remark, false)]
    fn detection_order(#[case] signals: serde_json::Value, #[case] framework: Framework, #[case] api: bool) {
        let signals: Signals = serde_json::from_value(signals).unwrap();
        assert_eq!(Detection::from_signals(&signals), Detection { framework, api });
    }

    #[test]
    fn unknown_framework_names_are_rejected() {
        let signals = serde_json::from_value::<Signals>(json!({"globals": ["powerpoint"]}));
        assert!(signals.is_err());
    }
}
