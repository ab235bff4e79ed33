use clap::Subcommand;
use serde_json::json;
use uuid::Uuid;

use crate::cli::config::Context;
use crate::cli::utils::{output_empty_collection, output_json, output_success, require_signed_in, warn_degraded};
use crate::cli::OutputFormat;
use crate::models::{NewUserProfile, Role, UserProfilePatch, UserStatus};
use crate::store::{FetchOutcome, UserQuery};
use crate::types::Resource;

#[derive(Subcommand)]
pub enum UserCommands {
    #[command(about = "List user profiles, newest first")]
    List {
        #[arg(long, default_value_t = 1, help = "Page number (1-based)")]
        page: u32,
        #[arg(long, help = "Rows per page")]
        page_size: Option<u32>,
        #[arg(long, help = "Match name or email (case-insensitive)")]
        search: Option<String>,
    },

    #[command(about = "Create a user profile")]
    Create {
        #[arg(help = "Email")]
        email: String,
        #[arg(help = "Full name")]
        full_name: String,
        #[arg(long, default_value = "user", help = "user | admin | moderator")]
        role: Role,
        #[arg(long, default_value = "pending", help = "active | inactive | pending")]
        status: UserStatus,
    },

    #[command(about = "Update fields of a user profile")]
    Update {
        #[arg(help = "Profile ID")]
        id: Uuid,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        full_name: Option<String>,
        #[arg(long)]
        avatar_url: Option<String>,
        #[arg(long)]
        role: Option<Role>,
        #[arg(long)]
        status: Option<UserStatus>,
    },

    #[command(about = "Delete a user profile")]
    Delete {
        #[arg(help = "Profile ID")]
        id: Uuid,
    },
}

pub async fn handle(cmd: UserCommands, ctx: &Context, output_format: OutputFormat) -> anyhow::Result<()> {
    require_signed_in(ctx, "/users").await?;

    match cmd {
        UserCommands::List { page, page_size, search } => {
            let mut query = UserQuery::page(page);
            if let Some(page_size) = page_size {
                query = query.with_page_size(page_size);
            }
            if let Some(search) = search {
                query = query.with_search(search);
            }

            let outcome = ctx.app.fetch_users(query).await;
            if let FetchOutcome::Degraded(_) = outcome {
                warn_degraded(&output_format, "users", ctx.app.state().error(Resource::Users));
            }
            let Some(page) = outcome.into_value() else {
                return Err(anyhow::anyhow!("User list is already being fetched"));
            };

            if page.data.is_empty() {
                return output_empty_collection(&output_format, "data", "No users found");
            }
            match output_format {
                OutputFormat::Json => output_json(&page)?,
                OutputFormat::Text => {
                    for user in &page.data {
                        println!(
                            "{}  {:<30} {:<28} {:?}/{:?}",
                            user.id, user.email, user.full_name, user.role, user.status
                        );
                    }
                    println!("Page {} of {} ({} users)", page.page, page.total_pages, page.count);
                }
            }
            Ok(())
        }
        UserCommands::Create { email, full_name, role, status } => {
            let profile = NewUserProfile::new(&email, full_name).with_role(role).with_status(status);
            ctx.app.create_user(profile).await?;
            output_success(
                &output_format,
                &format!("Created user {}", email),
                Some(json!({ "users": ctx.app.state().users })),
            )
        }
        UserCommands::Update { id, email, full_name, avatar_url, role, status } => {
            let patch = UserProfilePatch { email, full_name, avatar_url, role, status };
            if patch.is_empty() {
                return Err(anyhow::anyhow!("Nothing to update"));
            }
            ctx.app.update_user(id, patch).await?;
            output_success(&output_format, &format!("Updated user {}", id), None)
        }
        UserCommands::Delete { id } => {
            ctx.app.delete_user(id).await?;
            output_success(&output_format, &format!("Deleted user {}", id), None)
        }
    }
}
