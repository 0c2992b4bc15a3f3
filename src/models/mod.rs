//! 数据模型模块

pub mod auth;
pub mod user;

use validator::ValidationErrors;

/// 将字段校验错误整理为一条可读消息
pub fn format_validation_errors(errors: &ValidationErrors) -> String {
    let mut messages: Vec<String> = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| match e.code.as_ref() {
                "email" => "Invalid email format".to_string(),
                "length" => match e.params.get("min") {
                    Some(min) => format!("{} must be at least {} characters", field, min),
                    None => format!("{} has an invalid length", field),
                },
                "url" => format!("{} must be a valid URL", field),
                _ => format!("{} is invalid", field),
            })
        })
        .collect();
    messages.sort();
    messages.join(", ")
}
