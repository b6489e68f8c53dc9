use crate::core::WaitConfig;
use crate::dom::locator::Locator;
use crate::dom::query::Parent;
use crate::dom::response::Response;
use crate::errors::Result;
use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::debug;

#[async_trait]
pub trait Predicate: Send + Sync {
    async fn test(&self, response: &Response) -> Result<bool>;
}

#[derive(Clone)]
pub struct Condition {
    label: String,
    predicate: Arc<dyn Predicate>,
}

impl Condition {
    pub fn new(label: impl Into<String>, predicate: impl Predicate + 'static) -> Self {
        Self {
            label: label.into(),
            predicate: Arc::new(predicate),
        }
    }

    pub fn from_fn<F>(label: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Response) -> bool + Send + Sync + 'static,
    {
        Self::new(label, FnPredicate(f))
    }

    pub fn present() -> Self {
        Self::from_fn("present", Response::is_truthy)
    }

    pub fn visible() -> Self {
        Self::new("visible", Visible)
    }

    pub fn attribute_equals(name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        Self::new(
            format!("attribute {}={:?}", name, value),
            AttributeEquals { name, value },
        )
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub async fn test(&self, response: &Response) -> Result<bool> {
        self.predicate.test(response).await
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Condition[{}]", self.label)
    }
}

impl PartialEq for Condition {
    fn eq(&self, other: &Self) -> bool {
        self.label == other.label && Arc::ptr_eq(&self.predicate, &other.predicate)
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

struct FnPredicate<F>(F);

#[async_trait]
impl<F> Predicate for FnPredicate<F>
where
    F: Fn(&Response) -> bool + Send + Sync,
{
    async fn test(&self, response: &Response) -> Result<bool> {
        Ok((self.0)(response))
    }
}

struct Visible;

#[async_trait]
impl Predicate for Visible {
    async fn test(&self, response: &Response) -> Result<bool> {
        if !response.is_truthy() {
            return Ok(false);
        }
        for hit in response.hits() {
            if !hit.is_visible().await? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

struct AttributeEquals {
    name: String,
    value: String,
}

#[async_trait]
impl Predicate for AttributeEquals {
    async fn test(&self, response: &Response) -> Result<bool> {
        if !response.is_truthy() {
            return Ok(false);
        }
        for hit in response.hits() {
            if hit.attribute(&self.name).await?.as_deref() != Some(self.value.as_str()) {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

#[derive(Debug, Clone)]
pub enum WaitTarget {
    Locator { locator: Locator, args: Vec<String> },
    Resolved(Response),
}

#[derive(Debug, Clone)]
pub enum WaitOutcome {
    Ready(Response),
    NotYet,
}

#[derive(Debug, Clone)]
pub struct Wait {
    target: WaitTarget,
    condition: Condition,
}

impl Wait {
    pub fn on_locator(locator: Locator, condition: Condition, args: &[&str]) -> Self {
        Self {
            target: WaitTarget::Locator {
                locator,
                args: args.iter().map(|a| a.to_string()).collect(),
            },
            condition,
        }
    }

    pub fn on_response(response: Response, condition: Condition) -> Self {
        Self {
            target: WaitTarget::Resolved(response),
            condition,
        }
    }

    pub fn target(&self) -> &WaitTarget {
        &self.target
    }

    pub async fn poll(&self, parent: &Parent) -> Result<WaitOutcome> {
        let resolved = match &self.target {
            WaitTarget::Locator { locator, args } => {
                let args: Vec<&str> = args.iter().map(String::as_str).collect();
                locator.call(Some(parent), &args, None).await?
            }
            WaitTarget::Resolved(response) => response.clone(),
        };

        if self.condition.test(&resolved).await? {
            Ok(WaitOutcome::Ready(resolved))
        } else {
            Ok(WaitOutcome::NotYet)
        }
    }
}

/// Poll `wait` until it is ready or `config.timeout` elapses. A timeout is
/// reported as `Miss`.
pub async fn wait_until(parent: &Parent, wait: &Wait, config: &WaitConfig) -> Result<Response> {
    let ready = poll_until(config, || async {
        Ok(match wait.poll(parent).await? {
            WaitOutcome::Ready(response) => Some(response),
            WaitOutcome::NotYet => None,
        })
    })
    .await?;

    Ok(ready.unwrap_or_else(|| {
        debug!(condition = %wait.condition, "wait timed out");
        Response::Miss
    }))
}

pub(crate) async fn poll_until<T, F, Fut>(config: &WaitConfig, mut attempt: F) -> Result<Option<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    let deadline = Instant::now() + config.timeout();
    loop {
        if let Some(value) = attempt().await? {
            return Ok(Some(value));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        tokio::time::sleep(config.poll_interval()).await;
    }
}
