use cloudplug_engine::Registry;
use colored::Colorize;

pub fn handle(registry: &Registry) {
    println!("{}", "Plugins:".bold());
    for (plugin, actions) in registry.plugins() {
        println!("  {} {}", plugin.cyan(), actions.join(", "));
    }
}
