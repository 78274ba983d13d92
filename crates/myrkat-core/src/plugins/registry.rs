//! Plugin Registry
//!
//! Maps plugin ids to descriptors. Each descriptor contributes view slots
//! (main view, sidebar view, logo) that the rendering layer looks up by kind.
//! Registration order is kept; re-registering an id replaces the descriptor
//! in place.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Read-only key-value lookups shared by registries.
pub trait Registry {
    /// The key type used for lookups
    type Key;

    /// The value type stored in the registry
    type Value;

    /// Get a value by key
    fn get<Q>(&self, key: &Q) -> Option<&Self::Value>
    where
        Self::Key: Borrow<Q>,
        Q: ?Sized + Eq + std::hash::Hash;

    /// Check if the registry contains a key
    fn contains<Q>(&self, key: &Q) -> bool
    where
        Self::Key: Borrow<Q>,
        Q: ?Sized + Eq + std::hash::Hash,
    {
        self.get(key).is_some()
    }

    /// All entries, in registration order
    fn iter(&self) -> impl Iterator<Item = (&Self::Key, &Self::Value)>;

    /// Number of entries in the registry
    fn len(&self) -> usize;

    /// Check if the registry is empty
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Errors raised while registering plugins
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PluginError {
    #[error("Plugin descriptor has an empty id")]
    MissingId,

    #[error("Plugin '{plugin}' failed to register: {reason}")]
    Registration { plugin: String, reason: String },
}

// ============================================================================
// Components and slots
// ============================================================================

/// Opaque handle to something the rendering layer knows how to draw.
pub trait ViewComponent: Send + Sync + std::fmt::Debug {
    /// Stable name the renderer resolves
    fn component_name(&self) -> &str;
}

/// Component identified only by name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedComponent(String);

impl NamedComponent {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Shared handle, ready to put in a [`ViewSlot`]
    pub fn shared(name: impl Into<String>) -> Arc<dyn ViewComponent> {
        Arc::new(Self::new(name))
    }
}

impl ViewComponent for NamedComponent {
    fn component_name(&self) -> &str {
        &self.0
    }
}

/// Kind of contribution a plugin makes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotKind {
    MainView,
    SidebarView,
    Logo,
}

/// One contribution of a plugin
#[derive(Debug, Clone)]
pub enum ViewSlot {
    MainView(Arc<dyn ViewComponent>),
    SidebarView(Arc<dyn ViewComponent>),
    Logo(Arc<dyn ViewComponent>),
}

impl ViewSlot {
    pub fn kind(&self) -> SlotKind {
        match self {
            Self::MainView(_) => SlotKind::MainView,
            Self::SidebarView(_) => SlotKind::SidebarView,
            Self::Logo(_) => SlotKind::Logo,
        }
    }

    pub fn component(&self) -> &Arc<dyn ViewComponent> {
        match self {
            Self::MainView(component) | Self::SidebarView(component) | Self::Logo(component) => {
                component
            }
        }
    }
}

/// What a plugin registers
#[derive(Debug, Clone)]
pub struct PluginDescriptor {
    pub id: String,
    pub name: String,
    pub slots: Vec<ViewSlot>,
}

impl PluginDescriptor {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            slots: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_main_view(mut self, component: Arc<dyn ViewComponent>) -> Self {
        self.slots.push(ViewSlot::MainView(component));
        self
    }

    #[must_use]
    pub fn with_sidebar_view(mut self, component: Arc<dyn ViewComponent>) -> Self {
        self.slots.push(ViewSlot::SidebarView(component));
        self
    }

    #[must_use]
    pub fn with_logo(mut self, component: Arc<dyn ViewComponent>) -> Self {
        self.slots.push(ViewSlot::Logo(component));
        self
    }

    /// Components this plugin contributes to `kind`, in declaration order
    pub fn components(&self, kind: SlotKind) -> impl Iterator<Item = &Arc<dyn ViewComponent>> {
        self.slots
            .iter()
            .filter(move |slot| slot.kind() == kind)
            .map(ViewSlot::component)
    }

    /// First logo, if any
    pub fn logo(&self) -> Option<&Arc<dyn ViewComponent>> {
        self.components(SlotKind::Logo).next()
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Registered plugins in registration order.
#[derive(Debug, Default)]
pub struct PluginRegistry {
    plugins: Vec<PluginDescriptor>,
    index: HashMap<String, usize>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a plugin, or replace the one with the same id keeping its position.
    pub fn register_plugin(&mut self, descriptor: PluginDescriptor) -> Result<(), PluginError> {
        if descriptor.id.is_empty() {
            return Err(PluginError::MissingId);
        }

        let existing = self.index.get(&descriptor.id).copied();
        match existing {
            Some(position) => {
                debug!("Replacing plugin '{}'", descriptor.id);
                self.plugins[position] = descriptor;
            }
            None => {
                info!("Registered plugin '{}' ({})", descriptor.id, descriptor.name);
                self.index.insert(descriptor.id.clone(), self.plugins.len());
                self.plugins.push(descriptor);
            }
        }
        Ok(())
    }

    /// All descriptors in registration order
    pub fn plugins(&self) -> &[PluginDescriptor] {
        &self.plugins
    }

    /// Every main-view contribution, across plugins in registration order
    pub fn main_view_components(&self) -> Vec<Arc<dyn ViewComponent>> {
        self.components(SlotKind::MainView)
    }

    /// Every sidebar contribution, across plugins in registration order
    pub fn sidebar_components(&self) -> Vec<Arc<dyn ViewComponent>> {
        self.components(SlotKind::SidebarView)
    }

    fn components(&self, kind: SlotKind) -> Vec<Arc<dyn ViewComponent>> {
        self.plugins
            .iter()
            .flat_map(|plugin| plugin.components(kind).cloned())
            .collect()
    }
}

impl Registry for PluginRegistry {
    type Key = String;
    type Value = PluginDescriptor;

    fn get<Q>(&self, key: &Q) -> Option<&PluginDescriptor>
    where
        String: Borrow<Q>,
        Q: ?Sized + Eq + std::hash::Hash,
    {
        self.index.get(key).map(|&position| &self.plugins[position])
    }

    fn iter(&self) -> impl Iterator<Item = (&String, &PluginDescriptor)> {
        self.plugins.iter().map(|plugin| (&plugin.id, plugin))
    }

    fn len(&self) -> usize {
        self.plugins.len()
    }
}
