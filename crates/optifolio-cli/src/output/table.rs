use colored::Colorize;
use serde_json::{Map, Value};
use tabled::{builder::Builder, Table};

/// Format output as tables using the tabled crate.
///
/// `ComputationOutput` envelopes print their `result`; optimization
/// responses print one titled table per section.
pub fn print_table(value: &Value) {
    match value {
        Value::Object(map) => {
            if let Some(result) = map.get("result") {
                print_result_table(result, map);
            } else {
                print_sections(map);
            }
        }
        Value::Array(arr) => print_array_table(arr),
        _ => println!("{}", value),
    }
}

fn print_result_table(result: &Value, envelope: &Map<String, Value>) {
    match result {
        Value::Object(res_map) => print_sections(res_map),
        other => println!("{}", format_value(other)),
    }

    if let Some(Value::String(meth)) = envelope.get("methodology") {
        println!("\nMethodology: {}", meth);
    }
    print_warnings(envelope);
}

/// Scalars go in one Field/Value table; nested objects get their own
/// titled table.
fn print_sections(map: &Map<String, Value>) {
    let mut builder = Builder::default();
    builder.push_record(["Field", "Value"]);
    let mut scalars = 0;
    for (key, val) in map {
        if key == "warnings" || val.is_object() {
            continue;
        }
        builder.push_record([key.as_str(), &format_value(val)]);
        scalars += 1;
    }
    if scalars > 0 {
        println!("{}", Table::from(builder));
    }

    for (key, val) in map {
        if let Value::Object(section) = val {
            println!("\n{}", title(key).bold());
            if section.is_empty() {
                println!("(empty)");
                continue;
            }
            let mut builder = Builder::default();
            builder.push_record(["Field", "Value"]);
            for (k, v) in section {
                builder.push_record([k.as_str(), &format_value(v)]);
            }
            println!("{}", Table::from(builder));
        }
    }

    print_warnings(map);
}

fn print_warnings(map: &Map<String, Value>) {
    if let Some(Value::Array(warnings)) = map.get("warnings") {
        if !warnings.is_empty() {
            println!("\n{}", "Warnings:".yellow());
            for w in warnings {
                if let Value::String(s) = w {
                    println!("  - {}", s);
                }
            }
        }
    }
}

fn print_array_table(arr: &[Value]) {
    if arr.is_empty() {
        println!("(empty)");
        return;
    }

    if let Some(Value::Object(first)) = arr.first() {
        let headers: Vec<String> = first.keys().cloned().collect();
        let mut builder = Builder::default();
        builder.push_record(&headers);

        for item in arr {
            if let Value::Object(map) = item {
                let row: Vec<String> = headers
                    .iter()
                    .map(|h| map.get(h.as_str()).map(format_value).unwrap_or_default())
                    .collect();
                builder.push_record(row);
            }
        }
        println!("{}", Table::from(builder));
    } else {
        for item in arr {
            println!("{}", format_value(item));
        }
    }
}

/// `monte_carlo` -> `Monte Carlo`
fn title(key: &str) -> String {
    key.split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(c) => c.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        Value::Array(arr) => {
            if arr.iter().all(Value::is_array) {
                // Matrix: one row per line.
                arr.iter().map(format_value).collect::<Vec<_>>().join("\n")
            } else {
                arr.iter().map(format_value).collect::<Vec<_>>().join(", ")
            }
        }
        Value::Object(_) => serde_json::to_string(value).unwrap_or_default(),
    }
}
