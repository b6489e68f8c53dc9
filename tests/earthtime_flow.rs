use std::time::Duration;
use unearthtime::browser::EXPLORE_URL;
use unearthtime::core::SessionConfig;
use unearthtime::testing::{stub_driver, StubDriver, PNG_SIGNATURE};
use unearthtime::{
    Condition, Config, EarthTime, Locator, LookupKey, Response, SelectorKind, SessionManager,
    UnearthtimeError, WaitConfig,
};

fn quick_config() -> Config {
    Config {
        wait: WaitConfig::new(Duration::from_millis(30), Duration::from_millis(5)),
        session: SessionConfig::immediate(),
        ..Config::default()
    }
}

async fn open(stub: StubDriver) -> (std::sync::Arc<StubDriver>, EarthTime) {
    let (stub, driver) = stub_driver(stub);
    let page = EarthTime::explore(driver, EXPLORE_URL, &SessionManager::new(), quick_config())
        .await
        .unwrap();
    (stub, page)
}

#[tokio::test]
async fn layer_checkbox_by_name_and_argument() {
    let (stub, mut page) = open(
        StubDriver::new()
            .with_element(SelectorKind::XPath, "//label[@name=\"Fires\"]/input", "fires")
            .with_tag("fires", "input"),
    )
    .await;

    assert_eq!(stub.navigations(), vec![EXPLORE_URL.to_string()]);

    let response = page
        .pull(LookupKey::call("layer_checkbox", &["Fires"]))
        .await
        .unwrap();
    let hit = response.as_hit().expect("checkbox should be found");
    assert_eq!(hit.tag_name().await.unwrap(), "input");

    hit.click(page.click_settle()).await.unwrap();
    assert_eq!(stub.native_clicks("fires"), 1);

    assert!(matches!(
        page.pull("LayerCheckbox").await.unwrap_err(),
        UnearthtimeError::MissingArguments(_)
    ));
}

#[tokio::test]
async fn hidden_elements_need_a_forced_pull() {
    let (stub, mut page) = open(
        StubDriver::new()
            .with_element(SelectorKind::Id, "layers-legend", "legend")
            .with_hidden("legend"),
    )
    .await;

    assert!(page.pull("LegendContainer").await.unwrap().is_miss());
    assert!(page.pull_forced("LegendContainer").await.unwrap().as_hit().is_some());

    stub.show("legend");
    let again = page.retry(0).await.unwrap();
    assert!(again.as_hit().is_some());
}

#[tokio::test]
async fn category_header_falls_back_to_later_candidates() {
    let (stub, mut page) = open(
        StubDriver::new()
            .with_element(SelectorKind::CssSelector, "h3[aria-controls='category-co2']", "header")
            .with_text("header", "CO2 Emissions"),
    )
    .await;

    let response = page.pull(LookupKey::call("category_header", &["co2"])).await.unwrap();
    let hit = response.into_hit().expect("second candidate should match");
    assert_eq!(hit.text().await.unwrap(), "CO2 Emissions");

    assert_eq!(stub.find_calls_for(SelectorKind::CssSelector, "h3#co2"), 1);
    assert_eq!(
        stub.find_calls_for(
            SelectorKind::CssSelector,
            "h3[aria-controls='category-co2-featured']"
        ),
        0
    );
}

#[tokio::test]
async fn waiting_pull_sees_late_elements() {
    let (_stub, mut page) = open(StubDriver::new().with_element_after(
        SelectorKind::CssSelector,
        "div.shareView",
        "share",
        3,
    ))
    .await;

    assert!(page.pull("ShareViewContainer").await.unwrap().is_miss());

    let key = LookupKey::from("ShareViewContainer").until(Condition::visible());
    assert!(page.pull(key).await.unwrap().is_truthy());
}

#[tokio::test]
async fn custom_layer_overrides_builtin() {
    let (_stub, mut page) = open(
        StubDriver::new()
            .with_element(SelectorKind::Id, "custom-zoom", "zoom")
            .with_element(SelectorKind::CssSelector, "button.zoomin", "builtin-zoom"),
    )
    .await;

    page.registry_mut()
        .register_front([("ZoomInButton", Locator::id("custom-zoom"))]);

    let hit = page.pull("zoom_in_button").await.unwrap().into_hit().unwrap();
    assert_eq!(hit.handle().id(), "zoom");

    page.registry_mut().delete_first("ZoomInButton");
    let hit = page.pull("ZoomInButton").await.unwrap().into_hit().unwrap();
    assert_eq!(hit.handle().id(), "builtin-zoom");
}

#[tokio::test]
async fn quit_closes_and_frees_the_driver() {
    let manager = SessionManager::new();
    let (stub, driver) = stub_driver(StubDriver::new().with_session_id("s-1"));

    let page = EarthTime::explore(driver.clone(), EXPLORE_URL, &manager, quick_config())
        .await
        .unwrap();
    assert!(manager.is_owned("s-1"));

    let png = page.screenshot().await.unwrap();
    assert!(png.starts_with(&PNG_SIGNATURE));

    page.quit().await.unwrap();
    assert!(stub.is_closed());
    assert!(!manager.is_owned("s-1"));

    let mut other = EarthTime::new(driver, EXPLORE_URL, &manager)
        .unwrap()
        .with_config(quick_config());
    other.load().await.unwrap();
    assert!(other.is_running());
}

#[test]
fn lookups_before_load_fail() {
    let (_stub, driver) = stub_driver(StubDriver::new());
    let mut page = EarthTime::new(driver, EXPLORE_URL, &SessionManager::new()).unwrap();

    let err = tokio_test::block_on(page.pull("ZoomInButton")).unwrap_err();
    assert!(matches!(err, UnearthtimeError::NotRunning));
    assert_eq!(page.history().len(), 1);
    assert!(matches!(
        tokio_test::block_on(page.retry(5)).unwrap(),
        Response::Miss
    ));
}
