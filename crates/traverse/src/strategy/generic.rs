use super::{Capabilities, Strategy};
use crate::framework::Framework;
use crate::page::Page;
use crate::page::error::Result;
use crate::position::Position;
use async_trait::async_trait;

/// No usable framework API. Navigation relies entirely on DOM affordances and
/// keyboard input, and termination on visual comparison.
///
/// Still remembers which framework the markup suggested, for diagnostics.
pub struct Generic {
    framework: Framework,
}
impl Generic {
    pub fn new(framework: Framework) -> Self {
        Self { framework }
    }
}

#[async_trait]
impl Strategy for Generic {
    fn framework(&self) -> Framework {
        self.framework
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::default()
    }

    async fn next(&self, _page: &dyn Page) -> Result<()> {
        Ok(())
    }

    async fn is_last(&self, _page: &dyn Page) -> Result<Option<bool>> {
        Ok(None)
    }

    async fn position(&self, _page: &dyn Page) -> Result<Option<Position>> {
        Ok(None)
    }

    async fn total_steps(&self, _page: &dyn Page) -> Result<Option<u64>> {
        Ok(None)
    }
}
