use anyhow::Context;
use cloudplug_engine::Registry;
use colored::Colorize;
use std::io::Read;
use std::path::Path;

fn read_input(input: Option<&Path>) -> anyhow::Result<String> {
    match input {
        Some(path) if path != Path::new("-") => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display())),
        _ => {
            let mut raw = String::new();
            std::io::stdin()
                .read_to_string(&mut raw)
                .context("failed to read stdin")?;
            Ok(raw)
        }
    }
}

pub async fn handle(
    registry: &Registry,
    plugin: &str,
    action: &str,
    input: Option<&Path>,
) -> anyhow::Result<()> {
    let raw = read_input(input)?;
    tracing::debug!(plugin, action, bytes = raw.len(), "read batch input");
    let report = registry.invoke(plugin, action, &raw).await;

    // Per-item outcomes are printed even when the batch failed
    println!("{}", serde_json::to_string_pretty(&report.output)?);

    match report.error {
        None => Ok(()),
        Some(err) => {
            if err.requires_resubmit() {
                eprintln!(
                    "{}",
                    "The resource may be in an intermediate state; resubmit the same batch to retry."
                        .yellow()
                );
            }
            Err(anyhow::Error::new(err).context(format!("{} {} failed", plugin, action)))
        }
    }
}
