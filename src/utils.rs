use std::env::var;
use std::str::FromStr;

/// Get the value of ENV var, or a default
///
/// Only when:
/// - It is set
/// - It is not empty
pub fn env_var_or_else(var_name: &'static str, or_else: fn() -> String) -> String {
    if let Ok(value) = var(var_name) {
        if !value.is_empty() {
            return value;
        }
    }

    or_else()
}

/// Get the parsed value of ENV var, or a default
///
/// Unparsable values are reported and replaced by the default
pub fn env_var_parsed_or<T>(var_name: &'static str, default: T) -> T
where
    T: FromStr,
{
    match var(var_name) {
        Ok(value) if !value.is_empty() => value.parse::<T>().unwrap_or_else(|_| {
            tracing::warn!("`{var_name}` has an invalid value, using the default");
            default
        }),
        _ => default,
    }
}
