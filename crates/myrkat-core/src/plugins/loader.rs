//! Plugin loading
//!
//! Plugins are listed explicitly at build time as [`PluginEntry`] values. Each
//! entry's registration function runs once, in list order; a failing or
//! panicking plugin is logged and skipped without affecting the others.

use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{info, warn};

use super::notes;
use super::registry::{PluginError, PluginRegistry};

/// Registration function a plugin exposes
pub type RegisterFn = fn(&mut PluginRegistry) -> Result<(), PluginError>;

/// One loadable plugin
#[derive(Debug, Clone, Copy)]
pub struct PluginEntry {
    /// Where the plugin comes from, for log messages
    pub source: &'static str,
    /// Id the plugin registers under, used to honour the disabled list
    pub plugin_id: &'static str,
    pub register: RegisterFn,
}

/// Outcome of [`load_plugins`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Sources that registered successfully
    pub registered: Vec<String>,
    /// Sources skipped because their plugin is disabled
    pub skipped: Vec<String>,
    /// Sources whose registration failed, with the reason
    pub failed: Vec<(String, String)>,
}

/// Plugins shipped with the core
pub fn builtin_plugins() -> Vec<PluginEntry> {
    vec![notes::ENTRY]
}

/// Run every enabled entry's registration function against `registry`.
pub fn load_plugins<F>(
    registry: &mut PluginRegistry,
    entries: &[PluginEntry],
    is_disabled: F,
) -> LoadReport
where
    F: Fn(&str) -> bool,
{
    let mut report = LoadReport::default();

    for entry in entries {
        if is_disabled(entry.plugin_id) {
            info!("Skipping disabled plugin '{}' from {}", entry.plugin_id, entry.source);
            report.skipped.push(entry.source.to_string());
            continue;
        }

        info!("Registering plugin from: {}", entry.source);
        let outcome = catch_unwind(AssertUnwindSafe(|| (entry.register)(registry)));

        match outcome {
            Ok(Ok(())) => report.registered.push(entry.source.to_string()),
            Ok(Err(e)) => {
                warn!("Failed to register plugin from {}: {}", entry.source, e);
                report.failed.push((entry.source.to_string(), e.to_string()));
            }
            Err(_) => {
                warn!("Plugin registration from {} panicked", entry.source);
                report
                    .failed
                    .push((entry.source.to_string(), "registration panicked".to_string()));
            }
        }
    }

    info!(
        "Plugin loading complete: {} registered, {} skipped, {} failed",
        report.registered.len(),
        report.skipped.len(),
        report.failed.len()
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::registry::{PluginDescriptor, Registry};
    use tracing_test::traced_test;

    fn register_alpha(registry: &mut PluginRegistry) -> Result<(), PluginError> {
        registry.register_plugin(PluginDescriptor::new("alpha", "Alpha"))
    }

    fn register_broken(_: &mut PluginRegistry) -> Result<(), PluginError> {
        Err(PluginError::Registration {
            plugin: "broken".to_string(),
            reason: "missing assets".to_string(),
        })
    }

    fn register_panicking(_: &mut PluginRegistry) -> Result<(), PluginError> {
        panic!("plugin bug")
    }

    const ALPHA: PluginEntry = PluginEntry {
        source: "tests/alpha",
        plugin_id: "alpha",
        register: register_alpha,
    };
    const BROKEN: PluginEntry = PluginEntry {
        source: "tests/broken",
        plugin_id: "broken",
        register: register_broken,
    };
    const PANICKING: PluginEntry = PluginEntry {
        source: "tests/panicking",
        plugin_id: "panicking",
        register: register_panicking,
    };

    #[test]
    #[traced_test]
    fn test_failures_are_isolated() {
        let mut registry = PluginRegistry::new();

        let report = load_plugins(&mut registry, &[BROKEN, PANICKING, ALPHA], |_| false);

        assert_eq!(report.registered, vec!["tests/alpha"]);
        assert_eq!(report.failed.len(), 2);
        assert!(registry.contains("alpha"));
        assert!(logs_contain("missing assets"));
    }

    #[test]
    fn test_disabled_plugins_are_skipped() {
        let mut registry = PluginRegistry::new();

        let report = load_plugins(&mut registry, &[ALPHA], |id| id == "alpha");

        assert_eq!(report.skipped, vec!["tests/alpha"]);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_builtins_register_notes() {
        let mut registry = PluginRegistry::new();

        let report = load_plugins(&mut registry, &builtin_plugins(), |_| false);

        assert!(report.failed.is_empty());
        assert!(registry.contains(notes::NOTES_PLUGIN_ID));
    }
}
