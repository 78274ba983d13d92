//! Built-in "Myrkat Notes" plugin registration.
//!
//! Note behaviour lives in [`crate::notes`]; this module only describes what
//! the plugin contributes to the shell.

use tracing::info;

use super::loader::PluginEntry;
use super::registry::{NamedComponent, PluginDescriptor, PluginError, PluginRegistry};

pub const NOTES_PLUGIN_ID: &str = "myrkat-notes";
pub const NOTES_PLUGIN_NAME: &str = "Myrkat Notes";

/// Collection the notes plugin stores its documents in
pub const NOTES_COLLECTION: &str = "notes";

pub const LOGO_COMPONENT: &str = "NotesLogo";
pub const SIDEBAR_COMPONENT: &str = "MyrkatNotesSidebar";
pub const MAIN_COMPONENT: &str = "MyrkatNotesMain";

pub const ENTRY: PluginEntry = PluginEntry {
    source: "builtin/myrkat-notes",
    plugin_id: NOTES_PLUGIN_ID,
    register,
};

/// The plugin's descriptor
pub fn descriptor() -> PluginDescriptor {
    PluginDescriptor::new(NOTES_PLUGIN_ID, NOTES_PLUGIN_NAME)
        .with_logo(NamedComponent::shared(LOGO_COMPONENT))
        .with_sidebar_view(NamedComponent::shared(SIDEBAR_COMPONENT))
        .with_main_view(NamedComponent::shared(MAIN_COMPONENT))
}

pub fn register(registry: &mut PluginRegistry) -> Result<(), PluginError> {
    registry.register_plugin(descriptor())?;
    info!("Notes plugin registered");
    Ok(())
}
