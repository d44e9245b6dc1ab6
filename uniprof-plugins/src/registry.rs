use std::path::Path;
use std::sync::Arc;

use crate::plugin::PlatformPlugin;
use crate::plugins::{
    beam::BeamPlugin, dotnet::DotnetPlugin, jvm::JvmPlugin, native::NativePlugin,
    nodejs::NodejsPlugin, php::PhpPlugin, python::PythonPlugin, ruby::RubyPlugin,
};

/// Mapping from plugin name to plugin value (spec.md §3 `PluginRegistry`).
/// Insertion order is fixed; detection iterates all non-fallback plugins
/// first, the `native` fallback last. Created once at process start.
pub struct PluginRegistry {
    plugins: Vec<Arc<dyn PlatformPlugin>>,
    fallback: Arc<dyn PlatformPlugin>,
}

impl PluginRegistry {
    /// Registers every built-in plugin in the order listed in spec.md §4.2.
    pub fn with_builtins() -> Self {
        let plugins: Vec<Arc<dyn PlatformPlugin>> = vec![
            Arc::new(PythonPlugin::new()),
            Arc::new(NodejsPlugin::new()),
            Arc::new(RubyPlugin::new()),
            Arc::new(PhpPlugin::new()),
            Arc::new(JvmPlugin::new()),
            Arc::new(DotnetPlugin::new()),
            Arc::new(BeamPlugin::new()),
        ];
        Self {
            plugins,
            fallback: Arc::new(NativePlugin::new()),
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn PlatformPlugin>> {
        if self.fallback.name() == name {
            return Some(self.fallback.clone());
        }
        self.plugins.iter().find(|p| p.name() == name).cloned()
    }

    /// Detection order: iterate all non-fallback plugins in registration
    /// order; the first `detectCommand` that returns true wins. If none
    /// claim it, try the fallback `native` plugin (ELF/Mach-O magic checks).
    /// If still no match, returns `None` so the caller can prompt for
    /// `--platform`.
    pub fn detect_from_command(&self, binary: &Path) -> Option<Arc<dyn PlatformPlugin>> {
        for plugin in &self.plugins {
            if plugin.detect_command(binary) {
                return Some(plugin.clone());
            }
        }
        if self.fallback.detect_command(binary) {
            return Some(self.fallback.clone());
        }
        None
    }

    /// Recognizes a previously-written Speedscope file's `exporter` field
    /// (used by `analyze`/`visualize` re-invoked without a fresh `record`).
    pub fn detect_from_profile(&self, exporter: &str) -> Option<Arc<dyn PlatformPlugin>> {
        for plugin in &self.plugins {
            if plugin.detect_from_profile(exporter) {
                return Some(plugin.clone());
            }
        }
        if self.fallback.detect_from_profile(exporter) {
            return Some(self.fallback.clone());
        }
        None
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn PlatformPlugin>> {
        self.plugins.iter().chain(std::iter::once(&self.fallback))
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_is_tried_last() {
        let registry = PluginRegistry::with_builtins();
        let names: Vec<&str> = registry.iter().map(|p| p.name()).collect();
        assert_eq!(names.last(), Some(&"native"));
    }

    #[test]
    fn get_returns_fallback_by_name() {
        let registry = PluginRegistry::with_builtins();
        assert!(registry.get("native").is_some());
        assert!(registry.get("does-not-exist").is_none());
    }
}
