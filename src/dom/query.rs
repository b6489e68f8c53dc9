use crate::core::{Driver, SearchRoot, WaitConfig};
use crate::dom::hit::Hit;
use crate::dom::response::{HitList, Response};
use crate::dom::selector::SelectorKind;
use crate::dom::wait::{poll_until, Condition};
use crate::errors::{DriverError, Result};
use std::sync::Arc;
use tracing::debug;

#[derive(Clone)]
pub struct Parent {
    driver: Arc<dyn Driver>,
    root: SearchRoot,
    wait: WaitConfig,
}

impl Parent {
    pub fn page(driver: Arc<dyn Driver>) -> Self {
        Self {
            driver,
            root: SearchRoot::Page,
            wait: WaitConfig::default(),
        }
    }

    pub fn element(hit: &Hit) -> Self {
        Self {
            driver: hit.driver().clone(),
            root: SearchRoot::Element(hit.handle().clone()),
            wait: WaitConfig::default(),
        }
    }

    pub fn with_wait(mut self, wait: WaitConfig) -> Self {
        self.wait = wait;
        self
    }

    pub fn driver(&self) -> &Arc<dyn Driver> {
        &self.driver
    }

    pub fn root(&self) -> &SearchRoot {
        &self.root
    }

    pub fn wait(&self) -> &WaitConfig {
        &self.wait
    }
}

impl std::fmt::Debug for Parent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Parent")
            .field("session", &self.driver.session_id())
            .field("root", &self.root)
            .field("wait", &self.wait)
            .finish()
    }
}

/// Find the first element matching `selector`.
///
/// Driver absence (no such element, timeout) becomes `Miss`. With `until`,
/// the lookup is repeated every `parent.wait().poll_interval()` until the
/// result satisfies the condition or `parent.wait().timeout()` elapses, which
/// is also `Miss`.
pub async fn find(
    kind: SelectorKind,
    selector: &str,
    parent: &Parent,
    until: Option<&Condition>,
) -> Result<Response> {
    run(parent, until, || find_once(kind, selector, parent)).await
}

pub async fn find_all(
    kind: SelectorKind,
    selector: &str,
    parent: &Parent,
    until: Option<&Condition>,
) -> Result<Response> {
    run(parent, until, || find_all_once(kind, selector, parent)).await
}

async fn run<F, Fut>(parent: &Parent, until: Option<&Condition>, mut attempt: F) -> Result<Response>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<Response>>,
{
    let Some(condition) = until else {
        return attempt().await;
    };

    let ready = poll_until(parent.wait(), || {
        let lookup = attempt();
        async move {
            let response = lookup.await?;
            if response.is_miss() {
                return Ok(None);
            }
            Ok(condition.test(&response).await?.then_some(response))
        }
    })
    .await?;

    Ok(ready.unwrap_or_else(|| {
        debug!(condition = %condition, "condition not met before timeout");
        Response::Miss
    }))
}

async fn find_once(kind: SelectorKind, selector: &str, parent: &Parent) -> Result<Response> {
    match parent.driver.find_one(kind, selector, &parent.root).await {
        Ok(handle) => Ok(Hit::capture(parent.driver.clone(), handle).await?.into()),
        Err(e) => absence_to_miss(kind, selector, e),
    }
}

async fn find_all_once(kind: SelectorKind, selector: &str, parent: &Parent) -> Result<Response> {
    match parent.driver.find_all(kind, selector, &parent.root).await {
        Ok(handles) => Ok(HitList::capture(&parent.driver, handles).await?.into()),
        Err(e) => absence_to_miss(kind, selector, e),
    }
}

fn absence_to_miss(kind: SelectorKind, selector: &str, error: DriverError) -> Result<Response> {
    if error.is_absence() {
        debug!(kind = %kind, selector, error = %error, "lookup missed");
        Ok(Response::Miss)
    } else {
        Err(error.into())
    }
}
