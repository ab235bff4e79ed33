use clap::Subcommand;
use serde_json::json;
use uuid::Uuid;

use crate::cli::config::Context;
use crate::cli::utils::{output_empty_collection, output_json, output_success, require_signed_in, warn_degraded};
use crate::cli::OutputFormat;
use crate::models::NewNotification;
use crate::store::FetchOutcome;
use crate::types::Resource;

#[derive(Subcommand)]
pub enum NotificationCommands {
    #[command(about = "List notifications, newest first")]
    List {
        #[arg(long, help = "Only unread notifications")]
        unread: bool,
    },

    #[command(about = "Mark one notification as read")]
    Read {
        #[arg(help = "Notification ID")]
        id: Uuid,
    },

    #[command(about = "Mark every notification as read")]
    ReadAll,

    #[command(about = "Send a notification to a user")]
    Create {
        #[arg(help = "Recipient user ID")]
        user_id: Uuid,
        #[arg(help = "Title")]
        title: String,
        #[arg(help = "Message")]
        message: String,
    },
}

pub async fn handle(cmd: NotificationCommands, ctx: &Context, output_format: OutputFormat) -> anyhow::Result<()> {
    require_signed_in(ctx, "/notifications").await?;

    match cmd {
        NotificationCommands::List { unread } => {
            let outcome = ctx.app.fetch_notifications().await;
            if let FetchOutcome::Degraded(_) = outcome {
                warn_degraded(&output_format, "notifications", ctx.app.state().error(Resource::Notifications));
            }

            let state = ctx.app.state();
            let shown: Vec<_> = state.notifications.iter().filter(|n| !unread || !n.is_read).collect();
            if shown.is_empty() {
                return output_empty_collection(&output_format, "notifications", "No notifications");
            }
            match output_format {
                OutputFormat::Json => output_json(&json!({
                    "notifications": shown,
                    "unread_count": state.unread_count,
                }))?,
                OutputFormat::Text => {
                    for n in shown {
                        let marker = if n.is_read { " " } else { "*" };
                        println!("{} {}  {}  {}", marker, n.id, n.created_at.format("%Y-%m-%d %H:%M"), n.title);
                        println!("    {}", n.message);
                    }
                    println!("{} unread", state.unread_count);
                }
            }
            Ok(())
        }
        NotificationCommands::Read { id } => {
            ctx.app.fetch_notifications().await;
            ctx.app.mark_notification_as_read(id).await?;
            output_success(
                &output_format,
                &format!("Marked {} as read", id),
                Some(json!({ "unread_count": ctx.app.state().unread_count })),
            )
        }
        NotificationCommands::ReadAll => {
            ctx.app.mark_all_notifications_as_read().await?;
            output_success(&output_format, "Marked all notifications as read", Some(json!({ "unread_count": 0 })))
        }
        NotificationCommands::Create { user_id, title, message } => {
            ctx.app.create_notification(NewNotification::new(user_id, title, message)).await?;
            output_success(
                &output_format,
                "Notification created",
                Some(json!({ "unread_count": ctx.app.state().unread_count })),
            )
        }
    }
}
