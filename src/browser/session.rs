use crate::browser::timelapse::Timelapse;
use crate::core::{Config, Driver, ScriptArg, ScriptValue};
use crate::dom::library;
use crate::dom::{Condition, Locator, Parent, Registry, Response, SelectorKind};
use crate::errors::{Result, UnearthtimeError};
use crate::utils::strings::resolve_query;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

pub const EXPLORE_URL: &str = "https://earthtime.org/explore";

/// Which driver sessions are currently attached to a page.
///
/// Clones share the same ownership table.
#[derive(Debug, Clone, Default)]
pub struct SessionManager {
    owned: Arc<Mutex<HashSet<String>>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn owned(&self) -> MutexGuard<'_, HashSet<String>> {
        self.owned.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn acquire(&self, driver: Arc<dyn Driver>) -> Result<DriverLease> {
        let session_id = driver.session_id().to_string();
        if !self.owned().insert(session_id.clone()) {
            return Err(UnearthtimeError::DriverInUse);
        }
        debug!(session = %session_id, "driver acquired");
        Ok(DriverLease {
            manager: self.clone(),
            driver,
            released: false,
        })
    }

    pub fn release(&self, session_id: &str) -> bool {
        let released = self.owned().remove(session_id);
        if released {
            debug!(session = %session_id, "driver released");
        }
        released
    }

    pub fn is_owned(&self, session_id: &str) -> bool {
        self.owned().contains(session_id)
    }

    pub fn owned_count(&self) -> usize {
        self.owned().len()
    }
}

pub struct DriverLease {
    manager: SessionManager,
    driver: Arc<dyn Driver>,
    released: bool,
}

impl DriverLease {
    pub fn driver(&self) -> &Arc<dyn Driver> {
        &self.driver
    }

    pub fn release(mut self) -> Arc<dyn Driver> {
        self.manager.release(self.driver.session_id());
        self.released = true;
        self.driver.clone()
    }
}

impl Drop for DriverLease {
    fn drop(&mut self) {
        if !self.released {
            self.manager.release(self.driver.session_id());
        }
    }
}

impl fmt::Debug for DriverLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriverLease")
            .field("session", &self.driver.session_id())
            .field("released", &self.released)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub enum LookupKey {
    Name(String),
    Call {
        name: String,
        args: Vec<String>,
        until: Option<Condition>,
    },
}

impl LookupKey {
    pub fn call(name: impl Into<String>, args: &[&str]) -> Self {
        LookupKey::Call {
            name: name.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
            until: None,
        }
    }

    pub fn until(self, condition: Condition) -> Self {
        match self {
            LookupKey::Name(name) => LookupKey::Call {
                name,
                args: vec![],
                until: Some(condition),
            },
            LookupKey::Call { name, args, .. } => LookupKey::Call {
                name,
                args,
                until: Some(condition),
            },
        }
    }

    pub fn name(&self) -> &str {
        match self {
            LookupKey::Name(name) | LookupKey::Call { name, .. } => name,
        }
    }

    pub fn args(&self) -> Vec<&str> {
        match self {
            LookupKey::Name(_) => vec![],
            LookupKey::Call { args, .. } => args.iter().map(String::as_str).collect(),
        }
    }

    pub fn wait(&self) -> Option<&Condition> {
        match self {
            LookupKey::Name(_) => None,
            LookupKey::Call { until, .. } => until.as_ref(),
        }
    }
}

impl From<&str> for LookupKey {
    fn from(name: &str) -> Self {
        LookupKey::Name(name.to_string())
    }
}

impl From<String> for LookupKey {
    fn from(name: String) -> Self {
        LookupKey::Name(name)
    }
}

impl fmt::Display for LookupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LookupKey::Name(name) => f.write_str(name),
            LookupKey::Call { name, args, .. } => write!(f, "{}({})", name, args.join(", ")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub key: LookupKey,
    pub forced: bool,
    pub at: DateTime<Utc>,
}

pub fn validate_url(url: &str) -> Result<()> {
    let invalid = || UnearthtimeError::InvalidUrl(url.to_string());
    let parsed = Url::parse(url).map_err(|_| invalid())?;

    let host_ok = parsed
        .host_str()
        .map(|host| host == "earthtime.org" || host.ends_with(".earthtime.org"))
        .unwrap_or(false);
    let path = parsed.path();
    let page_ok = path.contains("explore") || path.contains("stories/");

    if matches!(parsed.scheme(), "http" | "https") && host_ok && page_ok {
        Ok(())
    } else {
        Err(invalid())
    }
}

/// One EarthTime page driven by one driver.
///
/// Loading takes the driver from a [`SessionManager`], so two pages can't
/// share a driver. Dropping the page gives it back.
pub struct EarthTime {
    driver: Arc<dyn Driver>,
    manager: SessionManager,
    lease: Option<DriverLease>,
    url: String,
    config: Config,
    registry: Registry,
    history: Vec<HistoryEntry>,
}

impl EarthTime {
    pub fn new(driver: Arc<dyn Driver>, url: &str, manager: &SessionManager) -> Result<Self> {
        validate_url(url)?;
        Ok(Self {
            driver,
            manager: manager.clone(),
            lease: None,
            url: url.to_string(),
            config: Config::default(),
            registry: Registry::with_entries(library::builtin()),
            history: Vec::new(),
        })
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub async fn explore(
        driver: Arc<dyn Driver>,
        url: &str,
        manager: &SessionManager,
        config: Config,
    ) -> Result<Self> {
        let mut page = Self::new(driver, url, manager)?.with_config(config);
        page.load().await?;
        Ok(page)
    }

    pub async fn load(&mut self) -> Result<()> {
        if self.lease.is_some() {
            return Ok(());
        }

        let lease = self.manager.acquire(self.driver.clone())?;
        info!(url = %self.url, session = %self.driver.session_id(), "loading EarthTime page");
        self.driver.navigate(&self.url).await?;
        settle(self.config.session.load_settle_ms).await;
        self.lease = Some(lease);
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.lease.is_some()
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn driver(&self) -> &Arc<dyn Driver> {
        &self.driver
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn click_settle(&self) -> Duration {
        self.config.session.click_settle()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    pub async fn goto(&mut self, url: &str) -> Result<()> {
        validate_url(url)?;
        self.parent()?;
        info!(url, "navigating");
        self.driver.navigate(url).await?;
        settle(self.config.session.goto_settle_ms).await;
        self.url = url.to_string();
        Ok(())
    }

    pub fn resolve_name(&self, name: &str) -> Option<String> {
        if self.registry.contains(name) {
            return Some(name.to_string());
        }
        let normalised = resolve_query(name);
        self.registry.contains(&normalised).then_some(normalised)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.resolve_name(name).is_some()
    }

    /// Run the locator registered under `key`. Unknown names are `Miss`.
    pub async fn pull(&mut self, key: impl Into<LookupKey>) -> Result<Response> {
        self.pull_with(key.into(), false).await
    }

    pub async fn pull_forced(&mut self, key: impl Into<LookupKey>) -> Result<Response> {
        self.pull_with(key.into(), true).await
    }

    async fn pull_with(&mut self, key: LookupKey, forced: bool) -> Result<Response> {
        self.history.push(HistoryEntry {
            key: key.clone(),
            forced,
            at: Utc::now(),
        });

        let parent = self.parent()?;
        let Some(locator) = self.lookup(key.name(), forced) else {
            debug!(key = %key, "no locator registered");
            return Ok(Response::Miss);
        };

        locator
            .call(Some(&parent), &key.args(), key.wait().cloned())
            .await
    }

    fn lookup(&self, name: &str, forced: bool) -> Option<Locator> {
        let name = self.resolve_name(name)?;
        let locator = self.registry.get(&name)?;
        Some(if forced {
            locator.to_forced()
        } else {
            locator.clone()
        })
    }

    /// Pull the `index`-th history entry again (`-1` is the latest). Out of
    /// range is `Miss`.
    pub async fn retry(&mut self, index: isize) -> Result<Response> {
        let len = self.history.len();
        let resolved = if index < 0 {
            len.checked_sub(index.unsigned_abs())
        } else {
            Some(index as usize).filter(|i| *i < len)
        };
        let Some(entry) = resolved.and_then(|i| self.history.get(i)).cloned() else {
            return Ok(Response::Miss);
        };
        self.pull_with(entry.key, entry.forced).await
    }

    /// Pull `key`; when `condition` holds for the result, run `action` and
    /// pull again.
    pub async fn retry_if<Fut>(
        &mut self,
        key: impl Into<LookupKey>,
        condition: &Condition,
        action: Fut,
    ) -> Result<Response>
    where
        Fut: Future<Output = Result<()>>,
    {
        let key = key.into();
        let response = self.pull_with(key.clone(), false).await?;
        if condition.test(&response).await? {
            action.await?;
            return self.pull_with(key, false).await;
        }
        Ok(response)
    }

    pub async fn find(
        &self,
        kind: SelectorKind,
        selector: &str,
        until: Option<&Condition>,
    ) -> Result<Response> {
        crate::dom::find(kind, selector, &self.parent()?, until).await
    }

    pub async fn find_all(
        &self,
        kind: SelectorKind,
        selector: &str,
        until: Option<&Condition>,
    ) -> Result<Response> {
        crate::dom::find_all(kind, selector, &self.parent()?, until).await
    }

    pub async fn execute(&self, script: &str, args: &[ScriptArg]) -> Result<ScriptValue> {
        Ok(self.driver.run_script(script, args).await?)
    }

    pub fn timelapse(&self) -> Result<Timelapse> {
        self.parent()?;
        Ok(Timelapse::new(self.driver.clone()))
    }

    pub async fn screenshot(&self) -> Result<Vec<u8>> {
        Ok(self.driver.screenshot(None).await?)
    }

    pub async fn screenshot_base64(&self) -> Result<String> {
        Ok(STANDARD.encode(self.screenshot().await?))
    }

    pub async fn save_screenshot(&self, path: impl AsRef<Path>) -> Result<()> {
        let png = self.screenshot().await?;
        tokio::fs::write(path, png).await?;
        Ok(())
    }

    pub async fn quit(mut self) -> Result<()> {
        if let Some(lease) = self.lease.take() {
            info!(url = %self.url, "quitting EarthTime page");
            let driver = lease.release();
            driver.close().await?;
        }
        Ok(())
    }

    pub fn release_driver(mut self) -> Arc<dyn Driver> {
        match self.lease.take() {
            Some(lease) => lease.release(),
            None => self.driver.clone(),
        }
    }

    pub fn parent(&self) -> Result<Parent> {
        if self.lease.is_none() {
            return Err(UnearthtimeError::NotRunning);
        }
        Ok(Parent::page(self.driver.clone()).with_wait(self.config.wait))
    }
}

async fn settle(millis: u64) {
    if millis > 0 {
        tokio::time::sleep(Duration::from_millis(millis)).await;
    }
}

impl fmt::Display for EarthTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EarthTime:[{}]", self.url)
    }
}

impl fmt::Debug for EarthTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EarthTime")
            .field("url", &self.url)
            .field("session", &self.driver.session_id())
            .field("running", &self.is_running())
            .field("history", &self.history.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{SessionConfig, WaitConfig};
    use crate::testing::{stub_driver, StubDriver};

    fn quick_config() -> Config {
        Config {
            session: SessionConfig::immediate(),
            wait: WaitConfig::new(Duration::from_millis(30), Duration::from_millis(5)),
            ..Config::default()
        }
    }

    fn page(stub: StubDriver, manager: &SessionManager) -> (Arc<StubDriver>, EarthTime) {
        let (stub, driver) = stub_driver(stub);
        let page = EarthTime::new(driver, EXPLORE_URL, manager)
            .unwrap()
            .with_config(quick_config());
        (stub, page)
    }

    #[test]
    fn url_validation() {
        assert!(validate_url("https://earthtime.org/explore").is_ok());
        assert!(validate_url("https://earthtime.org/stories/the_climate_crisis").is_ok());
        assert!(validate_url("https://staging.earthtime.org/explore#v=1").is_ok());

        for bad in [
            "",
            "earthtime.org/explore",
            "https://example.com/explore",
            "https://earthtime.org/",
            "https://earthtime.org/about",
            "ftp://earthtime.org/explore",
        ] {
            assert!(
                matches!(validate_url(bad), Err(UnearthtimeError::InvalidUrl(_))),
                "{} should be rejected",
                bad
            );
        }
    }

    #[tokio::test]
    async fn one_page_per_driver() {
        let manager = SessionManager::new();
        let (stub, mut first) = page(StubDriver::new(), &manager);
        first.load().await.unwrap();
        first.load().await.unwrap();
        assert_eq!(stub.navigations(), vec![EXPLORE_URL.to_string()]);
        assert!(manager.is_owned("stub-session"));

        let driver: Arc<dyn Driver> = stub.clone();
        let mut second = EarthTime::new(driver, EXPLORE_URL, &manager).unwrap();
        assert!(matches!(
            second.load().await.unwrap_err(),
            UnearthtimeError::DriverInUse
        ));

        let driver = first.release_driver();
        assert!(!manager.is_owned("stub-session"));
        assert!(!stub.is_closed());

        let mut third = EarthTime::new(driver, EXPLORE_URL, &manager)
            .unwrap()
            .with_config(quick_config());
        third.load().await.unwrap();
        third.quit().await.unwrap();
        assert!(stub.is_closed());
        assert_eq!(manager.owned_count(), 0);
    }

    #[tokio::test]
    async fn dropping_a_page_releases_its_driver() {
        let manager = SessionManager::new();
        {
            let (_stub, mut page) = page(StubDriver::new(), &manager);
            page.load().await.unwrap();
            assert_eq!(manager.owned_count(), 1);
        }
        assert_eq!(manager.owned_count(), 0);
    }

    #[tokio::test]
    async fn lookups_need_a_loaded_page() {
        let manager = SessionManager::new();
        let (_stub, mut page) = page(StubDriver::new(), &manager);
        assert!(!page.is_running());
        assert!(matches!(
            page.pull("EarthTimeLogo").await.unwrap_err(),
            UnearthtimeError::NotRunning
        ));
        assert!(page.timelapse().is_err());
    }

    #[tokio::test]
    async fn pull_resolves_loose_names_and_records_history() {
        let manager = SessionManager::new();
        let (_stub, mut page) = page(
            StubDriver::new().with_element(SelectorKind::Id, "layers-menu-choice", "menu"),
            &manager,
        );
        page.load().await.unwrap();

        let exact = page.pull("DataLibraryMenu").await.unwrap();
        let loose = page.pull("data library menu").await.unwrap();
        assert_eq!(exact, loose);
        assert!(exact.is_truthy());

        assert!(page.pull("NoSuchThing").await.unwrap().is_miss());
        assert!(page.contains("data-library_menu"));
        assert!(!page.contains("NoSuchThing"));

        let names: Vec<&str> = page.history().iter().map(|e| e.key.name()).collect();
        assert_eq!(names, ["DataLibraryMenu", "data library menu", "NoSuchThing"]);
    }

    #[tokio::test]
    async fn pull_with_arguments_and_forced() {
        let manager = SessionManager::new();
        let (stub, mut page) = page(
            StubDriver::new().with_element(SelectorKind::XPath, "//label[@name=\"Fires\"]/input", "fires"),
            &manager,
        );
        page.load().await.unwrap();
        stub.hide("fires");

        let key = LookupKey::call("LayerCheckbox", &["Fires"]);
        assert!(page.pull(key.clone()).await.unwrap().is_miss());
        assert!(page.pull_forced(key).await.unwrap().is_truthy());

        assert!(!page.history()[0].forced);
        assert!(page.history()[1].forced);

        assert!(matches!(
            page.pull("LayerCheckbox").await.unwrap_err(),
            UnearthtimeError::MissingArguments(_)
        ));
    }

    #[tokio::test]
    async fn retry_replays_history() {
        let manager = SessionManager::new();
        let (stub, mut page) = page(
            StubDriver::new().with_element(SelectorKind::Id, "menu-logo", "logo"),
            &manager,
        );
        page.load().await.unwrap();
        stub.hide("logo");

        assert!(page.pull_forced("EarthTimeLogo").await.unwrap().is_truthy());
        assert!(page.pull("EarthTimeLogo").await.unwrap().is_miss());

        assert!(page.retry(0).await.unwrap().is_truthy());
        assert!(page.retry(-3).await.unwrap().is_truthy());
        assert!(page.retry(10).await.unwrap().is_miss());
        assert!(page.retry(-10).await.unwrap().is_miss());
        assert_eq!(page.history().len(), 4);
    }

    #[tokio::test]
    async fn retry_if_runs_action_when_condition_holds() {
        let manager = SessionManager::new();
        let (stub, mut page) = page(
            StubDriver::new().with_element(SelectorKind::Id, "layers-menu", "menu"),
            &manager,
        );
        page.load().await.unwrap();
        stub.hide("menu");

        let reveal = {
            let stub = stub.clone();
            async move {
                stub.show("menu");
                Ok::<(), UnearthtimeError>(())
            }
        };
        let response = page
            .retry_if("DataLibraryMenuContainer", &Condition::from_fn("missing", |r| r.is_miss()), reveal)
            .await
            .unwrap();
        assert!(response.is_truthy());

        let untouched = page
            .retry_if(
                "DataLibraryMenuContainer",
                &Condition::from_fn("missing", |r| r.is_miss()),
                async { Err(UnearthtimeError::NotRunning) },
            )
            .await
            .unwrap();
        assert!(untouched.is_truthy());
    }

    #[tokio::test]
    async fn registry_layers_override_builtins() {
        let manager = SessionManager::new();
        let (_stub, mut page) = page(
            StubDriver::new().with_element(SelectorKind::CssSelector, "img.logo", "new-logo"),
            &manager,
        );
        page.load().await.unwrap();
        page.registry_mut()
            .register_front([("EarthTimeLogo", Locator::css("img.logo"))]);

        let logo = page.pull("EarthTimeLogo").await.unwrap();
        assert_eq!(logo.as_hit().unwrap().handle().id(), "new-logo");
    }

    #[tokio::test]
    async fn screenshots_and_scripts() {
        let manager = SessionManager::new();
        let (stub, mut page) = page(
            StubDriver::new().with_script_result("return document.title;", ScriptValue::Value("EarthTime".into())),
            &manager,
        );
        page.load().await.unwrap();

        let png = page.screenshot().await.unwrap();
        assert!(png.starts_with(&crate::testing::PNG_SIGNATURE));
        assert_eq!(page.screenshot_base64().await.unwrap(), STANDARD.encode(&png));

        let title = page.execute("return document.title;", &[]).await.unwrap();
        assert_eq!(title.as_str(), Some("EarthTime"));
        assert_eq!(stub.script_count("return document.title;"), 1);

        page.goto("https://earthtime.org/stories/coral").await.unwrap();
        assert_eq!(page.url(), "https://earthtime.org/stories/coral");
        assert!(page.goto("https://example.com").await.is_err());
        assert_eq!(page.to_string(), "EarthTime:[https://earthtime.org/stories/coral]");
    }
}
