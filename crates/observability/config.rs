use std::env;
use tracing::Level;

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct ServiceContext {
    pub(crate) service_name: String,
    pub(crate) environment: String,
    pub(crate) component: String,
}

#[derive(Clone, Debug)]
pub(crate) struct ObservabilityConfig {
    pub(crate) service_context: ServiceContext,
    /// Level used when RUST_LOG is unset.
    pub(crate) default_level: Level,
    /// Warnings captured during config parsing so they can be logged after tracing is initialized.
    pub(crate) warnings: Vec<String>,
}

impl ObservabilityConfig {
    pub(crate) fn from_env(component: &str) -> Self {
        Self::from_lookup(component, |key| env::var(key).ok())
    }

    fn from_lookup(component: &str, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let component = component.trim().to_string();
        let mut warnings = Vec::new();

        let service_name = lookup("SERVICE_NAME")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| component.clone());

        let environment = lookup("STAGE")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| "unknown".to_string());

        let default_level = match lookup("LOG_DEFAULT_LEVEL") {
            Some(raw) if !raw.trim().is_empty() => match parse_level(&raw) {
                Some(level) => level,
                None => {
                    warnings.push(format!(
                        "LOG_DEFAULT_LEVEL is invalid (value: {raw}); defaulting to INFO"
                    ));
                    Level::INFO
                }
            },
            _ => Level::INFO,
        };

        Self {
            service_context: ServiceContext {
                service_name,
                environment,
                component,
            },
            default_level,
            warnings,
        }
    }
}

fn parse_level(input: &str) -> Option<Level> {
    match input.trim().to_ascii_lowercase().as_str() {
        "error" => Some(Level::ERROR),
        "warn" | "warning" => Some(Level::WARN),
        "info" => Some(Level::INFO),
        "debug" => Some(Level::DEBUG),
        "trace" => Some(Level::TRACE),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_with(component: &str, vars: &[(&str, &str)]) -> ObservabilityConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ObservabilityConfig::from_lookup(component, |key| vars.get(key).cloned())
    }

    #[test]
    fn service_name_falls_back_to_component() {
        let config = config_with(" backend ", &[]);
        assert_eq!(config.service_context.service_name, "backend");
        assert_eq!(config.service_context.environment, "unknown");
        assert_eq!(config.default_level, Level::INFO);
        assert!(config.warnings.is_empty());
    }

    #[test]
    fn explicit_service_context_wins() {
        let config = config_with(
            "worker",
            &[("SERVICE_NAME", "quota-engine"), ("STAGE", "production")],
        );
        assert_eq!(config.service_context.service_name, "quota-engine");
        assert_eq!(config.service_context.environment, "production");
        assert_eq!(config.service_context.component, "worker");
    }

    #[test]
    fn invalid_level_is_reported_not_fatal() {
        let config = config_with("backend", &[("LOG_DEFAULT_LEVEL", "loud")]);
        assert_eq!(config.default_level, Level::INFO);
        assert_eq!(config.warnings.len(), 1);

        let config = config_with("backend", &[("LOG_DEFAULT_LEVEL", "Warning")]);
        assert_eq!(config.default_level, Level::WARN);
    }
}
