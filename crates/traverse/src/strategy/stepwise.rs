use super::{Capabilities, Strategy, query_flag, query_position, query_total};
use crate::framework::Framework;
use crate::page::error::Result;
use crate::page::{Page, Script};
use crate::position::Position;
use async_trait::async_trait;

/// Frameworks exposing "next" plus an "is last step" predicate (reveal,
/// remark). The predicate makes termination a direct API answer.
pub struct Stepwise {
    framework: Framework,
}
impl Stepwise {
    pub fn new(framework: Framework) -> Self {
        Self { framework }
    }
}

#[async_trait]
impl Strategy for Stepwise {
    fn framework(&self) -> Framework {
        self.framework
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities { next: true, is_last: true, position: true }
    }

    async fn ready(&self, page: &dyn Page) -> Result<bool> {
        Ok(query_flag(page, Script::FrameworkReady(self.framework)).await?.unwrap_or(false))
    }

    async fn next(&self, page: &dyn Page) -> Result<()> {
        page.evaluate(&Script::Next(self.framework)).await.map(|_| ())
    }

    async fn is_last(&self, page: &dyn Page) -> Result<Option<bool>> {
        query_flag(page, Script::IsLastStep(self.framework)).await
    }

    async fn position(&self, page: &dyn Page) -> Result<Option<Position>> {
        query_position(page, self.framework).await
    }

    async fn total_steps(&self, page: &dyn Page) -> Result<Option<u64>> {
        query_total(page, self.framework).await
    }
}
