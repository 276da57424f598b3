use cultstat_core::FetchError;
use serde::Serialize;
use serde_json::Value;

use crate::cli::OutputFormat;
use crate::error::CliError;
use crate::metadata::Metadata;

/// Structured error line of an envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnvelopeError {
    pub code: String,
    pub message: String,
    pub retryable: bool,
}

impl From<&FetchError> for EnvelopeError {
    fn from(error: &FetchError) -> Self {
        Self {
            code: error.code().to_owned(),
            message: error.message().to_owned(),
            retryable: error.retryable(),
        }
    }
}

/// Printed command result.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope {
    pub meta: Metadata,
    pub data: Value,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<EnvelopeError>,
}

pub fn render(envelope: &Envelope, format: OutputFormat, pretty: bool) -> Result<(), CliError> {
    match format {
        OutputFormat::Json => {
            let payload = if pretty {
                serde_json::to_string_pretty(envelope)?
            } else {
                serde_json::to_string(envelope)?
            };
            println!("{payload}");
        }
        OutputFormat::Table => print!("{}", render_table(envelope)?),
    }

    Ok(())
}

fn render_table(envelope: &Envelope) -> Result<String, CliError> {
    let mut out = String::new();
    out.push_str(&format!("request_id  : {}\n", envelope.meta.request_id));
    out.push_str(&format!("command     : {}\n", envelope.meta.command));
    out.push_str(&format!("generated_at: {}\n", envelope.meta.generated_at));
    out.push_str(&format!("latency_ms  : {}\n", envelope.meta.latency_ms));

    if !envelope.meta.warnings.is_empty() {
        out.push_str("warnings:\n");
        for warning in &envelope.meta.warnings {
            out.push_str(&format!("  - {warning}\n"));
        }
    }

    match envelope.data.get("entries").and_then(Value::as_array) {
        Some(entries) => {
            for (field, value) in envelope.data.as_object().into_iter().flatten() {
                if field != "entries" && !value.is_object() && !value.is_null() {
                    out.push_str(&format!("{field:<12}: {}\n", scalar(value)));
                }
            }
            out.push_str(&entry_table(entries));
        }
        None => {
            out.push_str("data:\n");
            for line in serde_json::to_string_pretty(&envelope.data)?.lines() {
                out.push_str(&format!("  {line}\n"));
            }
        }
    }

    if !envelope.errors.is_empty() {
        out.push_str("errors:\n");
        for error in &envelope.errors {
            out.push_str(&format!("  - {}: {}\n", error.code, error.message));
        }
    }

    Ok(out)
}

fn entry_table(entries: &[Value]) -> String {
    let rows = entries
        .iter()
        .map(|entry| {
            let key = entry.get("key").map(scalar).unwrap_or_default();
            let available = entry.get("available").and_then(Value::as_bool).unwrap_or(false);
            let value = if available {
                let value = entry.get("value").map(scalar).unwrap_or_default();
                match entry.get("unit").and_then(Value::as_str) {
                    Some(unit) => format!("{value} {unit}"),
                    None => value,
                }
            } else {
                String::from("unavailable")
            };
            (key, value)
        })
        .collect::<Vec<_>>();

    let width = rows.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    let mut out = String::from("values:\n");
    for (key, value) in rows {
        out.push_str(&format!("  {key:<width$}  {value}\n"));
    }
    out
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
