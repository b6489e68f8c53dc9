use crate::core::{Driver, ScriptArg, ScriptValue};
use crate::dom::hit::{PageFunction, Property};
use crate::dom::{Hit, HitList};
use crate::errors::{Result, UnearthtimeError};
use serde_json::Value;
use std::sync::Arc;

const PROPERTY: &str = "return timelapse[arguments[0]];";
const PAUSE_AT_START: &str = "timelapse.pause(); timelapse.seek(0);";
const PAUSE_AT_END: &str = "timelapse.pause(); timelapse.seek(timelapse.getCaptureTimes().length - 1);";

#[derive(Clone)]
pub struct Timelapse {
    driver: Arc<dyn Driver>,
}

impl Timelapse {
    pub fn new(driver: Arc<dyn Driver>) -> Self {
        Self { driver }
    }

    pub async fn property(&self, name: &str) -> Result<Property> {
        let value = self
            .driver
            .run_script(PROPERTY, &[ScriptArg::from(name)])
            .await?;

        Ok(match value {
            ScriptValue::Null => Property::Value(Value::Null),
            ScriptValue::Value(value) => Property::Value(value),
            ScriptValue::Element(handle) => {
                Property::Element(Hit::capture(self.driver.clone(), handle).await?)
            }
            ScriptValue::Elements(handles) => {
                Property::Elements(HitList::capture(&self.driver, handles).await?)
            }
            ScriptValue::Function { arity } => Property::Function(PageFunction::global(
                self.driver.clone(),
                "timelapse",
                name,
                arity,
            )),
        })
    }

    pub async fn call(&self, name: &str, args: &[Value]) -> Result<ScriptValue> {
        match self.property(name).await? {
            Property::Function(function) => function.call(args).await,
            _ => Err(UnearthtimeError::InvalidAttribute(format!("timelapse.{}", name))),
        }
    }

    pub async fn pause_at_start(&self) -> Result<()> {
        self.driver.run_script(PAUSE_AT_START, &[]).await?;
        Ok(())
    }

    pub async fn pause_at_end(&self) -> Result<()> {
        self.driver.run_script(PAUSE_AT_END, &[]).await?;
        Ok(())
    }
}

impl std::fmt::Debug for Timelapse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Timelapse")
            .field("session", &self.driver.session_id())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::stub_driver;
    use crate::testing::StubDriver;
    use serde_json::json;

    fn global_call_script() -> &'static str {
        "const target = timelapse; return target[arguments[0]].apply(target, arguments[1]);"
    }

    #[tokio::test]
    async fn values_and_functions() {
        let (stub, driver) = stub_driver(
            StubDriver::new()
                .with_script_result(PROPERTY, ScriptValue::Function { arity: 1 })
                .with_script_result(global_call_script(), ScriptValue::Value(json!(true))),
        );
        let timelapse = Timelapse::new(driver);

        match timelapse.property("seek").await.unwrap() {
            Property::Function(seek) => {
                assert_eq!(seek.name(), "seek");
                assert_eq!(seek.arity(), 1);
            }
            other => panic!("expected function, got {:?}", other),
        }

        let result = timelapse.call("seek", &[json!(0)]).await.unwrap();
        assert_eq!(result, ScriptValue::Value(json!(true)));

        let args = stub.script_args(global_call_script());
        assert_eq!(
            args,
            vec![vec![ScriptArg::from("seek"), ScriptArg::Value(json!([0]))]]
        );

        assert!(matches!(
            timelapse.call("seek", &[]).await.unwrap_err(),
            UnearthtimeError::ArityMismatch { expected: 1, given: 0, .. }
        ));
    }

    #[tokio::test]
    async fn plain_values_are_not_callable() {
        let (_stub, driver) = stub_driver(
            StubDriver::new().with_script_result(PROPERTY, ScriptValue::Value(json!(12.5))),
        );
        let timelapse = Timelapse::new(driver);

        assert!(matches!(
            timelapse.property("playbackRate").await.unwrap(),
            Property::Value(v) if v == json!(12.5)
        ));
        assert!(matches!(
            timelapse.call("playbackRate", &[]).await.unwrap_err(),
            UnearthtimeError::InvalidAttribute(name) if name == "timelapse.playbackRate"
        ));
    }

    #[tokio::test]
    async fn pause_helpers_run_scripts() {
        let (stub, driver) = stub_driver(StubDriver::new());
        let timelapse = Timelapse::new(driver);
        timelapse.pause_at_start().await.unwrap();
        timelapse.pause_at_end().await.unwrap();
        assert_eq!(stub.script_count(PAUSE_AT_START), 1);
        assert_eq!(stub.script_count(PAUSE_AT_END), 1);
    }
}
