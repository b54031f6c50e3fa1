//! Verification preloader rule.
//!
//! Runs the attribute set through the shared preload engine configured by a
//! verification file. Every instance of the rule shares the process-wide preload
//! worker through its own [`ClientHandle`].

use crate::core::identity::{ConfigIdentity, expand_path_tags};
use crate::plugins::{Plugin, Rule, RuleCategory};
use crate::preload::{ClientHandle, EngineFactory, PreloadCoordinator, PreloadEngine};
use crate::types::{AttributeSet, DocumentContext};
use crate::{Result, RuleError};
use async_trait::async_trait;
use std::sync::Arc;

const DEFAULT_NAME: &str = "verification-preloader";

/// `Modifier` rule that preloads attributes with a verification configuration.
///
/// The configuration path is a template (see
/// [`expand_path_tags`](crate::core::identity::expand_path_tags)), expanded per
/// document. When two documents resolve to different files, the shared worker is
/// restarted for the newer one.
pub struct VerificationPreloader<F: EngineFactory> {
    name: String,
    config_template: String,
    handle: Arc<ClientHandle<F>>,
}

impl<F> VerificationPreloader<F>
where
    F: EngineFactory,
    F::Engine: PreloadEngine<Request = AttributeSet, Response = AttributeSet>,
{
    pub fn new(coordinator: &Arc<PreloadCoordinator<F>>, config_template: impl Into<String>) -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            config_template: config_template.into(),
            handle: Arc::new(coordinator.client()),
        }
    }

    /// Register under a different name, e.g. to keep several instances side by side.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn config_template(&self) -> &str {
        &self.config_template
    }

    pub fn handle(&self) -> &ClientHandle<F> {
        &self.handle
    }

    /// Configuration identity this rule needs for `document`.
    pub fn resolve_identity(&self, document: &DocumentContext) -> Result<ConfigIdentity> {
        let path = expand_path_tags(&self.config_template, document)?;
        ConfigIdentity::from_path(path)
    }

    fn task_failure(&self, identity: &ConfigIdentity, err: tokio::task::JoinError) -> RuleError {
        RuleError::rule(
            &self.name,
            identity.as_str(),
            RuleError::Other(format!("Preload task failed: {}", err)),
        )
    }

    /// Blocking variant of [`Rule::process`] for hosts without an async runtime.
    pub fn preload(&self, attributes: AttributeSet, document: &DocumentContext) -> Result<AttributeSet> {
        let identity = self
            .resolve_identity(document)
            .map_err(|e| RuleError::rule(&self.name, &self.config_template, e))?;
        preload_with(&self.handle, &identity, attributes).map_err(|e| RuleError::rule(&self.name, identity.as_str(), e))
    }
}

fn preload_with<F>(handle: &ClientHandle<F>, identity: &ConfigIdentity, attributes: AttributeSet) -> Result<AttributeSet>
where
    F: EngineFactory,
    F::Engine: PreloadEngine<Request = AttributeSet, Response = AttributeSet>,
{
    handle.acquire(identity)?;
    handle.submit(attributes)
}

impl<F: EngineFactory> Plugin for VerificationPreloader<F> {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> String {
        env!("CARGO_PKG_VERSION").to_string()
    }

    fn initialize(&self) -> Result<()> {
        if self.config_template.trim().is_empty() {
            return Err(RuleError::validation(format!(
                "Rule '{}' needs a verification configuration path",
                self.name
            )));
        }
        Ok(())
    }

    fn shutdown(&self) -> Result<()> {
        self.handle.release();
        Ok(())
    }

    fn description(&self) -> &str {
        "Reorders and defaults attribute values using a verification configuration"
    }
}

#[async_trait]
impl<F> Rule for VerificationPreloader<F>
where
    F: EngineFactory,
    F::Engine: PreloadEngine<Request = AttributeSet, Response = AttributeSet>,
{
    fn category(&self) -> RuleCategory {
        RuleCategory::Modifier
    }

    async fn process(&self, attributes: &mut AttributeSet, document: &DocumentContext) -> Result<()> {
        let identity = self
            .resolve_identity(document)
            .map_err(|e| RuleError::rule(&self.name, &self.config_template, e))?;

        let handle = Arc::clone(&self.handle);
        let request = attributes.clone();
        let task_identity = identity.clone();
        let outcome = tokio::task::spawn_blocking(move || preload_with(&handle, &task_identity, request))
            .await
            .map_err(|e| self.task_failure(&identity, e))?;

        match outcome {
            Ok(preloaded) => {
                *attributes = preloaded;
                Ok(())
            }
            Err(err) => Err(RuleError::rule(&self.name, identity.as_str(), err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::PreloaderConfig;
    use crate::preload::{BlockedErrors, WorkerState};
    use crate::types::Attribute;

    /// Marks every attribute with the file the engine was built from.
    struct StampEngine {
        source: String,
    }

    impl PreloadEngine for StampEngine {
        type Request = AttributeSet;
        type Response = AttributeSet;

        fn load(&mut self, mut request: AttributeSet, _blocked: &BlockedErrors) -> Result<AttributeSet> {
            if request.iter().any(|a| a.name == "Reject") {
                return Err(RuleError::preload("attribute rejected"));
            }
            for attribute in &mut request {
                attribute.attribute_type = self.source.clone();
            }
            Ok(request)
        }
    }

    struct StampFactory;

    impl EngineFactory for StampFactory {
        type Engine = StampEngine;

        fn construct(&self, identity: &ConfigIdentity, _blocked: &BlockedErrors) -> Result<StampEngine> {
            Ok(StampEngine {
                source: identity.to_string(),
            })
        }
    }

    fn coordinator() -> Arc<PreloadCoordinator<StampFactory>> {
        PreloadCoordinator::new(StampFactory, PreloaderConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_process_replaces_attributes() {
        let coordinator = coordinator();
        let rule = VerificationPreloader::new(&coordinator, "<SourceDocDir>/verify.vcfg");
        rule.initialize().unwrap();

        let document = DocumentContext::new("/batch/doc1.tif");
        let mut attributes = vec![Attribute::new("Total", "10.00")];
        rule.process(&mut attributes, &document).await.unwrap();

        assert_eq!(attributes[0].attribute_type, "/batch/verify.vcfg");
        assert_eq!(
            coordinator.loaded_identity(),
            Some(ConfigIdentity::new("/batch/verify.vcfg"))
        );
    }

    #[tokio::test]
    async fn test_failure_is_wrapped_with_identity() {
        let coordinator = coordinator();
        let rule = VerificationPreloader::new(&coordinator, "/cfg/verify.vcfg");

        let mut attributes = vec![Attribute::new("Reject", "x")];
        let err = rule
            .process(&mut attributes, &DocumentContext::default())
            .await
            .unwrap_err();

        match &err {
            RuleError::Rule { rule_name, message, .. } => {
                assert_eq!(rule_name, "verification-preloader");
                assert!(message.contains("/cfg/verify.vcfg"));
                assert!(message.contains("attribute rejected"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(attributes[0].attribute_type, "");
    }

    #[test]
    fn test_blocking_preload_and_shutdown_release() {
        let coordinator = coordinator();
        let rule = VerificationPreloader::new(&coordinator, "/cfg/a.vcfg").with_name("preload-a");

        let out = rule
            .preload(vec![Attribute::new("A", "1")], &DocumentContext::default())
            .unwrap();
        assert_eq!(out[0].attribute_type, "/cfg/a.vcfg");
        assert_eq!(coordinator.client_count(), 1);

        rule.shutdown().unwrap();
        rule.shutdown().unwrap();
        assert_eq!(coordinator.client_count(), 0);
        assert_eq!(coordinator.worker_state(), WorkerState::Ended);
    }

    #[test]
    fn test_empty_template_fails_initialize() {
        let coordinator = coordinator();
        let rule = VerificationPreloader::new(&coordinator, "  ");
        assert!(matches!(rule.initialize(), Err(RuleError::Validation { .. })));
    }

    #[tokio::test]
    async fn test_task_failure_carries_identity() {
        let coordinator = coordinator();
        let rule = VerificationPreloader::new(&coordinator, "/cfg/verify.vcfg");
        let identity = ConfigIdentity::new("/cfg/verify.vcfg");

        let join_error = tokio::task::spawn_blocking::<_, ()>(|| panic!("blocking pool lost"))
            .await
            .unwrap_err();
        let err = rule.task_failure(&identity, join_error);

        match &err {
            RuleError::Rule { rule_name, message, .. } => {
                assert_eq!(rule_name, "verification-preloader");
                assert!(message.starts_with("/cfg/verify.vcfg: "));
                assert!(message.contains("Preload task failed"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
