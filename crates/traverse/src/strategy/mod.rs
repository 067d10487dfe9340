//! Framework navigation strategies.
//!
//! Each strategy wraps one *capability set* of framework API, not one
//! framework: reveal and remark both expose "next" together with an
//! "is this the last step" predicate, impress and bespoke only expose "next"
//! together with a position query, and everything else has no usable API at
//! all. [`select`] maps a [`Detection`] onto the matching implementation.

mod generic;
mod positional;
mod stepwise;

pub use self::generic::Generic;
pub use self::positional::Positional;
pub use self::stepwise::Stepwise;
use crate::framework::{Detection, Framework};
use crate::page::error::Result;
use crate::page::{Page, Script};
use crate::position::Position;
use async_trait::async_trait;
use serde_json::Value;

/// Which API operations a strategy can perform.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// Native "go to next step" control.
    pub next: bool,
    /// "Is this the last step" predicate.
    pub is_last: bool,
    /// Position query.
    pub position: bool,
}

/// Framework-specific navigation primitives.
///
/// Methods corresponding to an absent [capability](Capabilities) return
/// `Ok(None)` (or `Ok(())` for [`next()`](Self::next)) without touching the
/// page.
#[async_trait]
pub trait Strategy: Send + Sync {
    fn framework(&self) -> Framework;

    fn capabilities(&self) -> Capabilities;

    /// `true` once the framework finished initialising.
    async fn ready(&self, _page: &dyn Page) -> Result<bool> {
        Ok(true)
    }

    /// Invoke the native "next" control.
    async fn next(&self, page: &dyn Page) -> Result<()>;

    /// Whether the current step is the last one.
    async fn is_last(&self, page: &dyn Page) -> Result<Option<bool>>;

    /// The current position, if the framework reports one.
    async fn position(&self, page: &dyn Page) -> Result<Option<Position>>;

    /// Upper bound on the number of steps, if the framework knows it.
    async fn total_steps(&self, page: &dyn Page) -> Result<Option<u64>>;
}

/// Pick the strategy for a detected framework.
///
/// A framework recognised by markup alone (no reachable control object) is
/// navigated generically.
pub fn select(detection: Detection) -> Box<dyn Strategy> {
    match (detection.framework, detection.api) {
        (framework @ (Framework::Reveal | Framework::Remark), true) => Box::new(Stepwise::new(framework)),
        (framework @ (Framework::Impress | Framework::Bespoke), true) => Box::new(Positional::new(framework)),
        (framework, _) => Box::new(Generic::new(framework)),
    }
}

/// Shared helpers for API-backed strategies.
pub(crate) async fn query_position(page: &dyn Page, framework: Framework) -> Result<Option<Position>> {
    Ok(Position::from_value(&page.evaluate(&Script::Position(framework)).await?))
}

pub(crate) async fn query_total(page: &dyn Page, framework: Framework) -> Result<Option<u64>> {
    Ok(page.evaluate(&Script::TotalSteps(framework)).await?.as_u64())
}

pub(crate) async fn query_flag(page: &dyn Page, script: Script) -> Result<Option<bool>> {
    Ok(match page.evaluate(&script).await? {
        Value::Bool(flag) => Some(flag),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Framework::Reveal, true, Capabilities { next: true, is_last: true, position: true })]
    #[case(Framework::Remark, true, Capabilities { next: true, is_last: true, position: true })]
    #[case(Framework::Impress, true, Capabilities { next: true, is_last: false, position: true })]
    #[case(Framework::Bespoke, true, Capabilities { next: true, is_last: false, position: true })]
    #[case(Framework::Reveal, false, Capabilities::default())]
    #[case(Framework::Generic, false, Capabilities::default())]
    fn capability_sets(#[case] framework: Framework, #[case] api: bool, #[case] expected: Capabilities) {
        let strategy = select(Detection { framework, api });
        assert_eq!(strategy.framework(), framework);
        assert_eq!(strategy.capabilities(), expected);
    }
}
