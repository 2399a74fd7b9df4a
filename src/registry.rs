//! Named pipelines built from configuration.
//!
//! Each configured target gets exactly one pipeline, so every caller of the
//! same target shares one circuit breaker.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::ServicesConfig;
use crate::observability::EventSink;
use crate::resilience::ResiliencePipeline;

#[derive(Debug, Default)]
pub struct PipelineRegistry {
    pipelines: BTreeMap<String, Arc<ResiliencePipeline>>,
}

impl PipelineRegistry {
    /// Bind one pipeline per target. Policies are fixed from here on.
    pub fn from_config(config: &ServicesConfig, sink: Arc<dyn EventSink>) -> Self {
        let pipelines = config
            .targets
            .iter()
            .map(|(name, target)| {
                let pipeline = ResiliencePipeline::new(name.clone(), target.policy(), sink.clone());
                tracing::debug!(
                    target_name = %name,
                    timeout_secs = target.timeout_in_seconds,
                    max_retries = target.number_of_retries,
                    failure_threshold = target.handled_events_allowed_before_breaking,
                    "Pipeline bound"
                );
                (name.clone(), Arc::new(pipeline))
            })
            .collect();

        Self { pipelines }
    }

    pub fn get(&self, name: &str) -> Option<Arc<ResiliencePipeline>> {
        self.pipelines.get(name).cloned()
    }

    /// Target names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.pipelines.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TargetConfig;
    use crate::observability::TracingEventSink;
    use std::time::Duration;

    fn config() -> ServicesConfig {
        let mut config = ServicesConfig::default();
        let mut weather = TargetConfig::new("https://weather.example.com/", "w");
        weather.timeout_in_seconds = 5;
        config.targets.insert("weather".into(), weather);
        config
            .targets
            .insert("billing".into(), TargetConfig::new("https://billing.example.com/", "b"));
        config
    }

    #[test]
    fn test_one_pipeline_per_target() {
        let registry = PipelineRegistry::from_config(&config(), Arc::new(TracingEventSink));

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["billing", "weather"]);
        assert!(registry.get("missing").is_none());

        let weather = registry.get("weather").unwrap();
        assert_eq!(weather.target(), "weather");
        assert_eq!(weather.policy().timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_lookups_share_the_same_pipeline() {
        let registry = PipelineRegistry::from_config(&config(), Arc::new(TracingEventSink));

        let a = registry.get("billing").unwrap();
        let b = registry.get("billing").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_empty_config() {
        let registry =
            PipelineRegistry::from_config(&ServicesConfig::default(), Arc::new(TracingEventSink));
        assert!(registry.is_empty());
    }
}
