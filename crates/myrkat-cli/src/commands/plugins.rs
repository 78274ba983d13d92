use myrkat_core::plugins::SlotKind;
use myrkat_core::{AppContext, PluginDescriptor};

/// One line per plugin, then anything the loader skipped or rejected.
pub fn list(context: &AppContext) -> String {
    let mut lines: Vec<String> = context.plugins().plugins().iter().map(describe).collect();

    let report = context.plugin_report();
    for source in &report.skipped {
        lines.push(format!("{} (disabled)", source));
    }
    for (source, reason) in &report.failed {
        lines.push(format!("{} (failed: {})", source, reason));
    }

    if lines.is_empty() {
        return "No plugins registered".to_string();
    }
    lines.join("\n")
}

fn describe(plugin: &PluginDescriptor) -> String {
    let names = |kind: SlotKind| {
        plugin
            .components(kind)
            .map(|c| c.component_name().to_string())
            .collect::<Vec<_>>()
            .join(", ")
    };

    format!(
        "{}\t{}\tmain: [{}]\tsidebar: [{}]\tlogo: {}",
        plugin.id,
        plugin.name,
        names(SlotKind::MainView),
        names(SlotKind::SidebarView),
        plugin.logo().map_or("-", |logo| logo.component_name()),
    )
}
