use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::dependency::DependencyKey;
use crate::engine::{CircuitBreakerState, CircuitControl};
use crate::observability::metrics;
use crate::properties::{PropertyNames, PropertySource};

/// Override requested by an operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ForceCommand {
    ForcedOpen,
    ForcedClosed,
    ForcedReset,
}

impl ForceCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ForcedOpen => "FORCED_OPEN",
            Self::ForcedClosed => "FORCED_CLOSED",
            Self::ForcedReset => "FORCED_RESET",
        }
    }
}

impl fmt::Display for ForceCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ForceCommand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "FORCED_OPEN" => Ok(Self::ForcedOpen),
            "FORCED_CLOSED" => Ok(Self::ForcedClosed),
            "FORCED_RESET" => Ok(Self::ForcedReset),
            other => Err(format!(
                "unknown state '{}', expected FORCED_OPEN, FORCED_CLOSED or FORCED_RESET",
                other
            )),
        }
    }
}

/// What the admin surface reports for one breaker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitBreakerView {
    pub id: DependencyKey,
    pub open: bool,
}

/// Query and override breakers without touching the engine's internals.
#[derive(Clone)]
pub struct CircuitBreakerAdmin {
    properties: Arc<dyn PropertySource>,
    control: Arc<dyn CircuitControl>,
}

impl CircuitBreakerAdmin {
    pub fn new(properties: Arc<dyn PropertySource>, control: Arc<dyn CircuitControl>) -> Self {
        Self { properties, control }
    }

    /// Views for the given keys; keys without a breaker are skipped.
    pub fn list<'a, I>(&self, keys: I) -> Vec<CircuitBreakerView>
    where
        I: IntoIterator<Item = &'a DependencyKey>,
    {
        keys.into_iter().filter_map(|key| self.get(key)).collect()
    }

    pub fn get(&self, key: &DependencyKey) -> Option<CircuitBreakerView> {
        if !self.control.instantiated(key) {
            return None;
        }
        Some(CircuitBreakerView {
            id: key.clone(),
            open: self.control.is_open(key),
        })
    }

    pub fn state(&self, key: &DependencyKey) -> Option<CircuitBreakerState> {
        self.control.state(key)
    }

    /// Write the override and report the breaker as it looks right after.
    pub fn force_state(&self, key: &DependencyKey, command: ForceCommand) -> Option<CircuitBreakerView> {
        let names = PropertyNames::for_key(key);
        match command {
            ForceCommand::ForcedOpen => {
                self.properties.set(&names.force_open(), "true");
                self.properties.set(&names.force_closed(), "false");
            }
            ForceCommand::ForcedClosed => {
                self.properties.set(&names.force_open(), "false");
                self.properties.set(&names.force_closed(), "true");
            }
            ForceCommand::ForcedReset => {
                self.properties.clear(&names.force_open());
                self.properties.clear(&names.force_closed());
            }
        }

        metrics::record_forced_state(key, command);
        let view = self.get(key);
        tracing::info!(
            key = %key,
            command = %command,
            instantiated = view.is_some(),
            "Circuit breaker state forced"
        );
        view
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dependency::{CircuitBreakerSettings, ResilienceConfiguration};
    use crate::engine::{BoxError, ExecutionEngine, FailureCause, LocalEngine};
    use crate::properties::InMemoryPropertySource;

    fn setup() -> (Arc<InMemoryPropertySource>, Arc<LocalEngine>, CircuitBreakerAdmin) {
        let store = Arc::new(InMemoryPropertySource::new());
        let engine = Arc::new(LocalEngine::new(store.clone()));
        let admin = CircuitBreakerAdmin::new(store.clone(), engine.clone());
        (store, engine, admin)
    }

    fn key(name: &str) -> DependencyKey {
        DependencyKey::new(name).unwrap()
    }

    #[test]
    fn test_force_command_parsing_and_json() {
        assert_eq!("forced_open".parse::<ForceCommand>().unwrap(), ForceCommand::ForcedOpen);
        assert!("OPEN".parse::<ForceCommand>().is_err());
        let parsed: ForceCommand = serde_json::from_str("\"FORCED_RESET\"").unwrap();
        assert_eq!(parsed, ForceCommand::ForcedReset);
    }

    #[test]
    fn test_view_serializes_as_id_and_open() {
        let view = CircuitBreakerView { id: key("payments"), open: false };
        assert_eq!(
            serde_json::to_value(&view).unwrap(),
            serde_json::json!({"id": "PAYMENTS", "open": false})
        );
    }

    #[test]
    fn test_uninstantiated_breaker_is_absent_but_override_is_written() {
        let (store, _, admin) = setup();
        assert!(admin.get(&key("payments")).is_none());
        assert!(admin.list(&[key("payments")]).is_empty());

        assert!(admin.force_state(&key("payments"), ForceCommand::ForcedOpen).is_none());
        assert_eq!(
            store.get("resilience.command.PAYMENTS.circuitBreaker.forceOpen").as_deref(),
            Some("true")
        );
        assert_eq!(
            store.get("resilience.command.PAYMENTS.circuitBreaker.forceClosed").as_deref(),
            Some("false")
        );
    }

    #[tokio::test]
    async fn test_force_transitions_on_live_breaker() {
        let (store, engine, admin) = setup();
        let config = Default::default();
        engine.run(&key("payments"), &config, async { Ok(()) }).await.unwrap();

        let view = admin.force_state(&key("payments"), ForceCommand::ForcedOpen).unwrap();
        assert!(view.open);
        assert_eq!(admin.state(&key("payments")), Some(CircuitBreakerState::ForcedOpen));

        let view = admin.force_state(&key("payments"), ForceCommand::ForcedClosed).unwrap();
        assert!(!view.open);
        assert_eq!(admin.state(&key("payments")), Some(CircuitBreakerState::ForcedClosed));

        let view = admin.force_state(&key("payments"), ForceCommand::ForcedReset).unwrap();
        assert!(!view.open);
        assert_eq!(admin.state(&key("payments")), Some(CircuitBreakerState::Closed));
        assert!(store.get("resilience.command.PAYMENTS.circuitBreaker.forceOpen").is_none());
        assert!(store.get("resilience.command.PAYMENTS.circuitBreaker.forceClosed").is_none());
    }

    #[tokio::test]
    async fn test_forced_reset_reopens_after_failures() {
        let (_, engine, admin) = setup();
        let config = ResilienceConfiguration::default()
            .with_circuit_breaker(CircuitBreakerSettings::new(2, 60_000, 50, 10_000, 10).unwrap());

        admin.force_state(&key("payments"), ForceCommand::ForcedClosed);
        for _ in 0..3 {
            let outcome = engine
                .run(&key("payments"), &config, async {
                    Err::<(), BoxError>("boom".into())
                })
                .await;
            assert!(matches!(outcome, Err(FailureCause::ExecutionFailure(_))));
        }
        assert!(!admin.get(&key("payments")).unwrap().open);

        let view = admin.force_state(&key("payments"), ForceCommand::ForcedReset).unwrap();
        assert!(view.open);
        assert_eq!(admin.state(&key("payments")), Some(CircuitBreakerState::Open));
    }

    #[tokio::test]
    async fn test_list_only_reports_instantiated_keys() {
        let (_, engine, admin) = setup();
        let config = Default::default();
        engine.run(&key("b"), &config, async { Ok(()) }).await.unwrap();

        let views = admin.list(&[key("a"), key("b")]);
        assert_eq!(views, vec![CircuitBreakerView { id: key("b"), open: false }]);
    }
}
