use crate::cli::config::Context;
use crate::cli::utils::{output_json, require_signed_in, warn_degraded};
use crate::cli::OutputFormat;
use crate::store::FetchOutcome;
use crate::types::Resource;

pub async fn handle(ctx: &Context, output_format: OutputFormat) -> anyhow::Result<()> {
    require_signed_in(ctx, "/dashboard").await?;

    let outcome = ctx.app.fetch_dashboard_stats().await;
    if let FetchOutcome::Degraded(_) = outcome {
        warn_degraded(&output_format, "some counters", ctx.app.state().error(Resource::Stats));
    }
    let stats = outcome
        .into_value()
        .ok_or_else(|| anyhow::anyhow!("Stats are already being fetched"))?;

    match output_format {
        OutputFormat::Json => output_json(&stats)?,
        OutputFormat::Text => {
            println!("Total users:           {}", stats.total_users);
            println!("Active users:          {}", stats.active_users);
            println!("Total notifications:   {}", stats.total_notifications);
            println!("Unread notifications:  {}", stats.unread_notifications);
        }
    }
    Ok(())
}
