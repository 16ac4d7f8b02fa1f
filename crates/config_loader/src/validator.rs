//! 配置校验模块
//!
//! 校验规则：
//! - 字段范围由 `validator` derive 检查 (frame_rate / 超时 > 0, 名称非空)
//! - sensor_id 非空且唯一，且不与 vehicle_id 冲突
//! - 数值字段必须有限 (拒绝 NaN / inf)

use std::collections::HashSet;

use ::validator::{Validate, ValidationErrors, ValidationErrorsKind};
use contracts::{CaptureBlueprint, ContractError};

/// 校验 CaptureBlueprint 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(blueprint: &CaptureBlueprint) -> Result<(), ContractError> {
    validate_fields(blueprint)?;
    validate_sensor_ids(blueprint)?;
    validate_finite(blueprint)?;
    Ok(())
}

/// derive 规则
fn validate_fields(blueprint: &CaptureBlueprint) -> Result<(), ContractError> {
    match blueprint.validate() {
        Ok(()) => Ok(()),
        Err(errors) => {
            let (field, message) = first_violation("", &errors)
                .unwrap_or_else(|| ("blueprint".to_string(), errors.to_string()));
            Err(ContractError::config_validation(field, message))
        }
    }
}

/// 深度优先找出第一个字段错误，按字段名排序保证结果稳定
fn first_violation(prefix: &str, errors: &ValidationErrors) -> Option<(String, String)> {
    let mut fields: Vec<_> = errors.errors().iter().collect();
    fields.sort_by(|a, b| a.0.cmp(b.0));

    for (field, kind) in fields {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };
        match kind {
            ValidationErrorsKind::Field(list) => {
                if let Some(err) = list.first() {
                    let message = err
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| err.code.to_string());
                    return Some((path, message));
                }
            }
            ValidationErrorsKind::Struct(inner) => {
                if let Some(found) = first_violation(&path, inner) {
                    return Some(found);
                }
            }
            ValidationErrorsKind::List(items) => {
                for (idx, inner) in items {
                    if let Some(found) = first_violation(&format!("{path}[{idx}]"), inner) {
                        return Some(found);
                    }
                }
            }
        }
    }
    None
}

/// 校验 sensor_id 唯一性
fn validate_sensor_ids(blueprint: &CaptureBlueprint) -> Result<(), ContractError> {
    let vehicle = &blueprint.vehicle;
    let mut seen = HashSet::new();
    for (idx, sensor) in vehicle.sensors.iter().enumerate() {
        if sensor.id.is_empty() {
            return Err(ContractError::config_validation(
                format!("vehicle.sensors[{idx}].id"),
                "sensor id cannot be empty",
            ));
        }
        if sensor.id == vehicle.id {
            return Err(ContractError::config_validation(
                format!("vehicle.sensors[id={}]", sensor.id),
                "sensor_id collides with vehicle id",
            ));
        }
        if !seen.insert(&sensor.id) {
            return Err(ContractError::config_validation(
                format!("vehicle.sensors[id={}]", sensor.id),
                "duplicate sensor_id",
            ));
        }
    }
    Ok(())
}

/// 超时上限 (秒)，超过即视为配置错误
pub const MAX_TIMEOUT_SEC: f64 = 3600.0;

/// 拒绝非有限数值与超出上限的超时
fn validate_finite(blueprint: &CaptureBlueprint) -> Result<(), ContractError> {
    let capture = &blueprint.capture;
    let checks = [
        ("capture.frame_rate", capture.frame_rate),
        ("capture.tick_timeout_sec", capture.tick_timeout_sec),
        ("capture.spectator_height", capture.spectator_height),
        ("world.client_timeout_sec", blueprint.world.client_timeout_sec),
    ];
    for (field, value) in checks {
        if !value.is_finite() {
            return Err(ContractError::config_validation(
                field,
                format!("must be a finite number, got {value}"),
            ));
        }
    }

    let timeouts = [
        ("capture.tick_timeout_sec", capture.tick_timeout_sec),
        ("world.client_timeout_sec", blueprint.world.client_timeout_sec),
    ];
    for (field, value) in timeouts {
        if value > MAX_TIMEOUT_SEC {
            return Err(ContractError::config_validation(
                field,
                format!("must be at most {MAX_TIMEOUT_SEC} seconds, got {value}"),
            ));
        }
    }
    Ok(())
}
