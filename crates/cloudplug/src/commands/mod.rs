pub mod config;
pub mod plugins;
pub mod run;

use anyhow::Context;
use cloudplug_config::{EndpointSettings, KindSettings, LoadedConfig, PollSettings, Settings};
use cloudplug_engine::{PollPolicy, Registry};
use cloudplug_tencent::{Endpoints, KindOptions, PluginOptions, TencentClientFactory};
use std::path::Path;
use std::sync::Arc;

pub fn load_config(explicit: Option<&Path>) -> anyhow::Result<LoadedConfig> {
    cloudplug_config::load(explicit).context("failed to load configuration")
}

/// Overlay configured values on the provider defaults for one kind
fn kind_options(settings: &KindSettings, defaults: KindOptions) -> KindOptions {
    KindOptions::new(
        PollPolicy::new(
            settings.interval().unwrap_or(defaults.poll.interval),
            settings.max_attempts.unwrap_or(defaults.poll.max_attempts),
        ),
        settings.failure_policy.unwrap_or(defaults.failure_policy),
    )
}

pub fn plugin_options(poll: &PollSettings) -> PluginOptions {
    let defaults = PluginOptions::default();
    PluginOptions {
        nat_gateway: kind_options(&poll.nat_gateway, defaults.nat_gateway),
        redis: kind_options(&poll.redis, defaults.redis),
        storage: kind_options(&poll.storage, defaults.storage),
    }
}

fn endpoints(settings: &EndpointSettings) -> Endpoints {
    Endpoints {
        vpc: settings.vpc.clone(),
        redis: settings.redis.clone(),
        cvm: settings.cvm.clone(),
        cbs: settings.cbs.clone(),
    }
}

pub fn build_registry(settings: &Settings) -> anyhow::Result<Registry> {
    let factory = TencentClientFactory::new(endpoints(&settings.endpoints))
        .context("failed to create the HTTP client")?;
    let options = plugin_options(&settings.poll);
    let builder =
        cloudplug_tencent::register_plugins(Registry::builder(), Arc::new(factory), &options);
    Ok(builder.build())
}
