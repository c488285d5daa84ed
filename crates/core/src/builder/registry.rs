//! The class registry (§4.5): maps a configuration's `class:` string to a
//! factory function producing the concrete component.

use std::collections::HashMap;

use crate::link::Component;

/// Constructs a fresh, unconfigured component instance.
pub type Factory = fn() -> Box<dyn Component>;

/// Class-name → [`Factory`] lookup, split into a default layer (the
/// standard library registered by [`crate::components::register_standard`])
/// and a user-extension layer. Lookup tries the default layer first, so a
/// user extension can never shadow a standard class by accident — "first
/// hit wins" (§4.5).
#[derive(Default)]
pub struct ClassRegistry {
    default: HashMap<String, Factory>,
    extensions: HashMap<String, Factory>,
}

impl ClassRegistry {
    /// An empty registry with no classes registered.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry pre-populated with every standard-library component
    /// class.
    #[must_use]
    pub fn standard() -> Self {
        let mut registry = Self::new();
        crate::components::register_standard(&mut registry);
        registry
    }

    /// Registers `class` in the default layer. Used internally by
    /// [`Self::standard`]; panics on a duplicate class name, since that
    /// would be a bug in the standard library itself rather than a user
    /// configuration error.
    pub fn register_default(&mut self, class: &str, factory: Factory) {
        assert!(
            self.default.insert(class.to_string(), factory).is_none(),
            "duplicate standard-library class {class:?}"
        );
    }

    /// Registers `class` in the user-extension layer, for embedders that
    /// link additional component types into the simulator.
    pub fn register(&mut self, class: &str, factory: Factory) {
        self.extensions.insert(class.to_string(), factory);
    }

    /// Looks up the factory for `class`, default layer first.
    #[must_use]
    pub fn lookup(&self, class: &str) -> Option<Factory> {
        self.default.get(class).or_else(|| self.extensions.get(class)).copied()
    }
}
