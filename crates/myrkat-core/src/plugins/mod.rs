//! Plugin Registry and the built-in plugins

pub mod loader;
pub mod notes;
pub mod registry;

pub use loader::{builtin_plugins, load_plugins, LoadReport, PluginEntry, RegisterFn};
pub use registry::{
    NamedComponent, PluginDescriptor, PluginError, PluginRegistry, Registry, SlotKind,
    ViewComponent, ViewSlot,
};
