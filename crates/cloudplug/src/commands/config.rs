use super::plugin_options;
use cloudplug_config::{KindSettings, LoadedConfig, PollSettings, Settings};
use cloudplug_tencent::KindOptions;
use colored::Colorize;

fn effective(options: KindOptions) -> KindSettings {
    KindSettings {
        interval_secs: Some(options.poll.interval.as_secs()),
        max_attempts: Some(options.poll.max_attempts),
        failure_policy: Some(options.failure_policy),
    }
}

pub fn handle(loaded: &LoadedConfig) -> anyhow::Result<()> {
    match &loaded.path {
        Some(path) => eprintln!("{} {}", "Config file:".bold(), path.display().to_string().cyan()),
        None => eprintln!("{}", "No config file found, showing defaults".yellow()),
    }

    let options = plugin_options(&loaded.settings.poll);
    let settings = Settings {
        poll: PollSettings {
            nat_gateway: effective(options.nat_gateway),
            redis: effective(options.redis),
            storage: effective(options.storage),
        },
        endpoints: loaded.settings.endpoints.clone(),
    };
    print!("{}", settings.to_yaml()?);
    Ok(())
}
