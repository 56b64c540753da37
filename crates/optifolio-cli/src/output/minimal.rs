use serde_json::Value;

/// Print just the key answer from the output.
///
/// Optimization responses print the allocation as `asset=weight` pairs, or
/// `kind: message` on failure. Anything else falls back to the first
/// well-known field of the result object.
pub fn print_minimal(value: &Value) {
    if let Some(map) = value.as_object() {
        if map.get("status").and_then(Value::as_str) == Some("error") {
            println!(
                "{}: {}",
                map.get("kind").map(format_minimal).unwrap_or_default(),
                map.get("message").map(format_minimal).unwrap_or_default()
            );
            return;
        }
        if let Some(Value::Object(allocation)) = map.get("allocation") {
            if allocation.is_empty() {
                println!("(empty portfolio)");
            } else {
                let pairs: Vec<String> = allocation
                    .iter()
                    .map(|(asset, w)| format!("{}={}", asset, format_minimal(w)))
                    .collect();
                println!("{}", pairs.join(" "));
            }
            return;
        }
    }

    let result_obj = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);

    let priority_keys = [
        "sharpe_ratio",
        "expected_return",
        "volatility",
        "expected_returns",
        "name",
    ];

    if let Value::Object(map) = result_obj {
        for key in &priority_keys {
            if let Some(val) = map.get(*key) {
                if !val.is_null() {
                    println!("{}", format_minimal(val));
                    return;
                }
            }
        }
        if let Some((key, val)) = map.iter().next() {
            println!("{}: {}", key, format_minimal(val));
            return;
        }
    }

    if let Value::Array(items) = result_obj {
        for item in items {
            let label = item
                .as_object()
                .and_then(|m| m.get("name"))
                .unwrap_or(item);
            println!("{}", format_minimal(label));
        }
        return;
    }

    println!("{}", format_minimal(result_obj));
}

fn format_minimal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
