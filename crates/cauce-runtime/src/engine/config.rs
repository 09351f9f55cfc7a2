//! Engine configuration.

use std::time::Duration;

use derive_builder::Builder;

/// Configuration for the flow execution engine.
#[derive(Debug, Clone, Builder)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct EngineConfig {
    /// Maximum visits to a single node within one run before the cycle
    /// guard aborts it.
    #[builder(default = "10")]
    pub max_node_visits: u32,

    /// Timeout applied to each external adapter call.
    #[builder(default = "Duration::from_secs(30)")]
    pub call_timeout: Duration,

    /// Number of history turns retained per conversation.
    #[builder(default = "20")]
    pub history_limit: usize,
}

impl EngineConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(max) = self.max_node_visits {
            if max == 0 {
                return Err("max_node_visits must be at least 1".into());
            }
        }
        if let Some(limit) = self.history_limit {
            if limit == 0 {
                return Err("history_limit must be at least 1".into());
            }
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_node_visits: 10,
            call_timeout: Duration::from_secs(30),
            history_limit: 20,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = EngineConfigBuilder::default().build().unwrap();
        assert_eq!(config.max_node_visits, 10);
        assert_eq!(config.call_timeout, Duration::from_secs(30));
        assert_eq!(config.history_limit, 20);
    }

    #[test]
    fn test_builder_rejects_zero_visits() {
        let result = EngineConfigBuilder::default().max_node_visits(0u32).build();
        assert!(result.is_err());
    }
}
