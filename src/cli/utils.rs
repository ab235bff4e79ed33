use serde::Serialize;
use serde_json::{json, Value};

use crate::cli::config::Context;
use crate::cli::OutputFormat;
use crate::guard::{GuardDecision, RouteGuard};

/// Output a success message in the appropriate format
pub fn output_success(
    output_format: &OutputFormat,
    message: &str,
    data: Option<Value>,
) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": true,
                "message": message
            });

            if let (Some(response), Some(Value::Object(extra))) = (response.as_object_mut(), data) {
                response.extend(extra);
            }

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            println!("✓ {}", message);
        }
    }
    Ok(())
}

/// Output an error message in the appropriate format
pub fn output_error(
    output_format: &OutputFormat,
    message: &str,
    error_code: Option<&str>,
) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": false,
                "error": message
            });

            if let Some(code) = error_code {
                response["error_code"] = json!(code);
            }

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            eprintln!("Error: {}", message);
        }
    }
    Ok(())
}

/// Output an empty collection in the appropriate format
pub fn output_empty_collection(
    output_format: &OutputFormat,
    collection_name: &str,
    message: &str,
) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&json!({
                collection_name: []
            }))?);
        }
        OutputFormat::Text => {
            println!("{}", message);
        }
    }
    Ok(())
}

/// Print a serializable value as pretty JSON
pub fn output_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Warn in text mode when a read fell back to empty data
pub fn warn_degraded(output_format: &OutputFormat, what: &str, error: Option<&str>) {
    if let OutputFormat::Text = output_format {
        match error {
            Some(message) => eprintln!("Warning: could not load {}: {}", what, message),
            None => eprintln!("Warning: could not load {}, showing empty data", what),
        }
    }
}

/// Gate a protected command on a signed-in session
pub async fn require_signed_in(ctx: &Context, location: &str) -> anyhow::Result<()> {
    match RouteGuard::private_only().resolve(&ctx.auth, location).await {
        GuardDecision::Render => Ok(()),
        GuardDecision::Redirect { .. } => Err(anyhow::anyhow!("Not signed in. Run `dash auth login <email>` first")),
        GuardDecision::Pending => Err(anyhow::anyhow!("Session check did not settle")),
    }
}

/// Gate login/registration on there being no session yet
pub async fn require_signed_out(ctx: &Context, location: &str) -> anyhow::Result<()> {
    match RouteGuard::public_only().resolve(&ctx.auth, location).await {
        GuardDecision::Render => Ok(()),
        GuardDecision::Redirect { .. } => {
            let who = ctx
                .auth
                .user()
                .and_then(|u| u.email)
                .unwrap_or_else(|| "another user".to_string());
            Err(anyhow::anyhow!("Already signed in as {}. Run `dash auth logout` first", who))
        }
        GuardDecision::Pending => Err(anyhow::anyhow!("Session check did not settle")),
    }
}

/// Parse a lowercase enum keyword through its serde names
pub fn parse_keyword<T: serde::de::DeserializeOwned>(value: &str) -> Result<T, String> {
    serde_json::from_value(Value::String(value.to_string())).map_err(|_| format!("invalid value '{}'", value))
}

/// Parse `key=value`; the value is read as JSON when it parses, else as a string
pub fn parse_key_value(pair: &str) -> Result<(String, Value), String> {
    let (key, raw) = pair
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", pair))?;
    if key.is_empty() {
        return Err(format!("empty key in '{}'", pair));
    }
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((key.to_string(), value))
}
