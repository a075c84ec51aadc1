//! # Registry
//!
//! Explicit name to factory registration of targets, performed once at process startup

use super::target::MetricTarget;
use super::{Builder, Error};
use std::collections::HashMap;
use tracing::info;

/// Name the CloudWatch metric target is registered under by [TargetRegistry::with_defaults]
pub const TARGET_NAME: &str = "AWSCloudWatch";

pub type TargetFactory = Box<dyn Fn(&serde_json::Value) -> Result<MetricTarget, Error> + Send + Sync>;

/// Targets keyed by type name
///
/// # Example
/// ```no_run
/// let registry = tracing_cloudwatch_metric::TargetRegistry::with_defaults();
/// let target = registry
///     .create(
///         "AWSCloudWatch",
///         &serde_json::json!({ "namespace": "App", "metric_name": "Errors", "value": 1.0 }),
///     )
///     .unwrap();
/// ```
#[derive(Default)]
pub struct TargetRegistry {
    factories: HashMap<String, TargetFactory>,
}

impl TargetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the CloudWatch metric target under [TARGET_NAME]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.factories.insert(
            TARGET_NAME.to_owned(),
            Box::new(|config: &serde_json::Value| Builder::from_json(config)?.build_target()),
        );
        registry
    }

    /// Register a factory under `name`, names can only be registered once
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> Result<&mut Self, Error>
    where
        F: Fn(&serde_json::Value) -> Result<MetricTarget, Error> + Send + Sync + 'static,
    {
        let name = name.into();
        if self.factories.contains_key(&name) {
            return Err(format!("target {name:?} is already registered").into());
        }
        info!(target_type = %name, "Registered target");
        self.factories.insert(name, Box::new(factory));
        Ok(self)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Build an uninitialized target of type `name` from its configuration
    pub fn create(&self, name: &str, config: &serde_json::Value) -> Result<MetricTarget, Error> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| format!("unknown target type {name:?}"))?;
        factory(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::State;
    use crate::test::fake::{Behavior, FakeFactory};

    #[test]
    fn defaults_register_cloudwatch() {
        let registry = TargetRegistry::with_defaults();
        assert!(registry.contains(TARGET_NAME));
        assert!(!registry.contains("Console"));
    }

    #[test]
    fn create_unknown_and_invalid() {
        let registry = TargetRegistry::with_defaults();
        let config = serde_json::json!({ "namespace": "App", "metric_name": "Errors", "value": 1.0 });

        let err = registry.create("Console", &config).err().unwrap();
        assert_eq!(err.to_string(), r#"unknown target type "Console""#);

        let invalid = serde_json::json!({ "namespace": "App", "value": 1.0 });
        assert!(registry.create(TARGET_NAME, &invalid).is_err());
    }

    #[test]
    fn register_custom_factory() {
        let factory = FakeFactory::new(Behavior::Succeed);
        let mut registry = TargetRegistry::new();
        registry
            .register("FakeCloudWatch", move |config| {
                Builder::from_json(config)?.client_factory(factory.clone()).build_target()
            })
            .unwrap();

        assert!(registry.register("FakeCloudWatch", |_| Err("unused".into())).is_err());

        let target = registry
            .create(
                "FakeCloudWatch",
                &serde_json::json!({ "namespace": "App", "metric_name": "Errors", "value": 1.0 }),
            )
            .unwrap();
        assert_eq!(target.state(), State::Uninitialized);
        assert_eq!(target.config().namespace, "App");
    }
}
