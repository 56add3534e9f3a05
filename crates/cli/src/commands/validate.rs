//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::IngestConfig;
use dispatcher::BackendRegistry;
use serde::Serialize;
use tracing::info;

use super::default_registry;
use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    consumers: usize,
    backend_count: usize,
    max_queue_len: Option<usize>,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    // Check file exists
    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    // Try to load and validate
    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(config) => {
            let warnings = collect_warnings(&config, &default_registry());

            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    consumers: config.manager.consumers,
                    backend_count: config.backends.len(),
                    max_queue_len: config.manager.max_queue_len,
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(config: &IngestConfig, registry: &BackendRegistry) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.backends.is_empty() {
        warnings.push("No backends configured - items will be discarded".to_string());
    }

    // Unknown selectors are recorded as not working at startup
    for backend in &config.backends {
        if !registry.contains(&backend.selector) {
            warnings.push(format!(
                "Backend '{}' uses unknown selector '{}' and will not be working",
                backend.id, backend.selector
            ));
        }
    }

    if config.manager.max_queue_len.is_none() {
        warnings.push("manager.max_queue_len is unset - the work queue is unbounded".to_string());
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Consumers: {}", summary.consumers);
            println!("  Backends: {}", summary.backend_count);
            match summary.max_queue_len {
                Some(limit) => println!("  Queue limit: {}", limit),
                None => println!("  Queue limit: unbounded"),
            }
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
