//! `info` command implementation.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use contracts::IngestConfig;
use serde::Serialize;
use tracing::info;

use super::default_registry;
use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    manager: ManagerInfo,
    backends: Vec<BackendInfo>,
    available_selectors: Vec<String>,
}

#[derive(Serialize)]
struct ManagerInfo {
    consumers: usize,
    idle_wait_ms: u64,
    stats_interval_secs: u64,
    shutdown_timeout_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    health_check_interval_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_queue_len: Option<usize>,
}

#[derive(Serialize)]
struct BackendInfo {
    id: String,
    selector: String,
    resolvable: bool,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    params: BTreeMap<String, String>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let config = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    let info = build_config_info(&config, args.params);
    if args.json {
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&info);
    }

    Ok(())
}

fn build_config_info(config: &IngestConfig, with_params: bool) -> ConfigInfo {
    let registry = default_registry();
    let manager = &config.manager;

    let backends = config
        .backends
        .iter()
        .map(|backend| BackendInfo {
            id: backend.id.clone(),
            selector: backend.selector.clone(),
            resolvable: registry.contains(&backend.selector),
            params: if with_params {
                backend.params.clone().into_iter().collect()
            } else {
                BTreeMap::new()
            },
        })
        .collect();

    ConfigInfo {
        manager: ManagerInfo {
            consumers: manager.consumers,
            idle_wait_ms: manager.idle_wait_ms,
            stats_interval_secs: manager.stats_interval_secs,
            shutdown_timeout_ms: manager.shutdown_timeout_ms,
            health_check_interval_secs: manager.health_check_interval_secs,
            max_queue_len: manager.max_queue_len,
        },
        backends,
        available_selectors: registry.selectors().into_iter().map(String::from).collect(),
    }
}

fn print_config_info(info: &ConfigInfo) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║               Ingest Dispatch Configuration                  ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    let manager = &info.manager;
    println!("⚙️  Manager");
    println!("   ├─ Consumers: {}", manager.consumers);
    println!("   ├─ Idle wait: {} ms", manager.idle_wait_ms);
    println!("   ├─ Stats interval: {} s", manager.stats_interval_secs);
    println!("   ├─ Shutdown timeout: {} ms", manager.shutdown_timeout_ms);
    match manager.health_check_interval_secs {
        Some(secs) => println!("   ├─ Health check: every {} s", secs),
        None => println!("   ├─ Health check: disabled"),
    }
    match manager.max_queue_len {
        Some(limit) => println!("   └─ Queue limit: {}", limit),
        None => println!("   └─ Queue limit: unbounded"),
    }

    println!("\n📤 Backends ({})", info.backends.len());
    for (i, backend) in info.backends.iter().enumerate() {
        let is_last = i == info.backends.len() - 1;
        let prefix = if is_last { "└─" } else { "├─" };
        let child_prefix = if is_last { "   " } else { "│  " };
        let marker = if backend.resolvable { "" } else { " (unknown selector)" };

        println!("   {} {} ({}){}", prefix, backend.id, backend.selector, marker);
        for (key, value) in &backend.params {
            println!("   {}  · {} = {}", child_prefix, key, value);
        }
    }

    println!("\n🔌 Available selectors: {}", info.available_selectors.join(", "));
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::BackendConfig;

    #[test]
    fn test_build_config_info() {
        let config = IngestConfig {
            backends: vec![
                BackendConfig::new("redis_main", "redis").with_param("host", "localhost"),
                BackendConfig::new("cold", "glacier"),
            ],
            ..IngestConfig::default()
        };

        let info = build_config_info(&config, false);
        assert!(info.backends[0].resolvable);
        assert!(!info.backends[1].resolvable);
        assert!(info.backends[0].params.is_empty());
        assert!(info.available_selectors.contains(&"memory".to_string()));

        let detailed = build_config_info(&config, true);
        assert_eq!(
            detailed.backends[0].params.get("host").map(String::as_str),
            Some("localhost")
        );
    }
}
