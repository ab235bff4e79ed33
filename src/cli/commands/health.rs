use serde_json::json;

use crate::cli::config::Context;
use crate::cli::utils::{output_error, output_success};
use crate::cli::OutputFormat;
use crate::error::UNAVAILABLE_MESSAGE;

pub async fn handle(ctx: &Context, output_format: OutputFormat) -> anyhow::Result<()> {
    if ctx.backend.health_check().await {
        output_success(&output_format, "Backend is reachable", Some(json!({ "healthy": true })))
    } else {
        output_error(&output_format, UNAVAILABLE_MESSAGE, Some("BACKEND_UNAVAILABLE"))?;
        Err(anyhow::anyhow!("backend health check failed"))
    }
}
