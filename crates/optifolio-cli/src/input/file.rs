use serde_json::Value;
use std::fs;

use optifolio_core::EngineConfig;

/// Read a JSON file as a generic serde_json::Value.
pub fn read_json_value(path: &str) -> Result<Value, Box<dyn std::error::Error>> {
    let contents = read_text(path)?;
    let value: Value = serde_json::from_str(&contents)
        .map_err(|e| format!("'{}' is not valid JSON: {}", path, e))?;
    Ok(value)
}

/// Load and validate an engine configuration file (YAML or JSON).
pub fn read_config(path: &str) -> Result<EngineConfig, Box<dyn std::error::Error>> {
    let contents = read_text(path)?;
    let config = EngineConfig::from_yaml_str(&contents)
        .map_err(|e| format!("Invalid config '{}': {}", path, e))?;
    Ok(config)
}

/// Contents of a regular file. Relative paths are resolved by the OS
/// against the working directory.
fn read_text(path: &str) -> Result<String, Box<dyn std::error::Error>> {
    match fs::metadata(path) {
        Ok(meta) if meta.is_file() => {}
        Ok(_) => return Err(format!("'{}' is a directory, expected a file", path).into()),
        Err(e) => return Err(format!("Cannot open '{}': {}", path, e).into()),
    }
    Ok(fs::read_to_string(path).map_err(|e| format!("Cannot read '{}': {}", path, e))?)
}
