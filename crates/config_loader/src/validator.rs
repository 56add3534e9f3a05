//! 配置校验模块
//!
//! 校验规则：
//! - backend id 非空且唯一
//! - selector 非空（未知 selector 在 initialize 时记为不可用，不在此处报错）
//! - consumers >= 1
//! - idle_wait_ms / stats_interval_secs >= 1
//! - max_queue_len 配置时 >= 1

use std::collections::HashSet;

use contracts::{ContractError, IngestConfig, ManagerSettings};

/// 校验 IngestConfig 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(config: &IngestConfig) -> Result<(), ContractError> {
    validate_manager(&config.manager)?;
    validate_backends(config)?;
    Ok(())
}

/// 校验管理器参数
fn validate_manager(manager: &ManagerSettings) -> Result<(), ContractError> {
    if manager.consumers == 0 {
        return Err(ContractError::config_validation(
            "manager.consumers",
            "consumers must be >= 1",
        ));
    }

    if manager.idle_wait_ms == 0 {
        return Err(ContractError::config_validation(
            "manager.idle_wait_ms",
            "idle_wait_ms must be >= 1",
        ));
    }

    if manager.stats_interval_secs == 0 {
        return Err(ContractError::config_validation(
            "manager.stats_interval_secs",
            "stats_interval_secs must be >= 1",
        ));
    }

    if manager.health_check_interval_secs == Some(0) {
        return Err(ContractError::config_validation(
            "manager.health_check_interval_secs",
            "health_check_interval_secs must be >= 1 when set",
        ));
    }

    if manager.max_queue_len == Some(0) {
        return Err(ContractError::config_validation(
            "manager.max_queue_len",
            "max_queue_len must be >= 1 when set",
        ));
    }

    Ok(())
}

/// 校验后端列表
fn validate_backends(config: &IngestConfig) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for (idx, backend) in config.backends.iter().enumerate() {
        if backend.id.trim().is_empty() {
            return Err(ContractError::config_validation(
                format!("backends[{idx}].id"),
                "backend id cannot be empty",
            ));
        }

        if backend.selector.trim().is_empty() {
            return Err(ContractError::config_validation(
                format!("backends[id={}].selector", backend.id),
                "selector cannot be empty",
            ));
        }

        if !seen.insert(backend.id.as_str()) {
            return Err(ContractError::config_validation(
                format!("backends[id={}]", backend.id),
                "duplicate backend id",
            ));
        }
    }
    Ok(())
}
