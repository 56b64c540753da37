pub mod file;
pub mod stdin;

use serde_json::Value;

/// Read a JSON request from `--input` or, failing that, piped stdin.
pub fn read_request(path: Option<&str>, command: &str) -> Result<Value, Box<dyn std::error::Error>> {
    if let Some(path) = path {
        return file::read_json_value(path);
    }
    match stdin::read_stdin()? {
        Some(raw) => Ok(serde_json::from_str(&raw)?),
        None => Err(format!("--input <file.json> or stdin required for {}", command).into()),
    }
}
