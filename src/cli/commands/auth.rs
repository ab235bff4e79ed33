use clap::Subcommand;
use serde_json::{json, Map, Value};

use crate::cli::config::Context;
use crate::cli::utils::{output_success, parse_key_value, require_signed_in, require_signed_out};
use crate::cli::OutputFormat;
use crate::store::AuthPhase;

#[derive(Subcommand)]
pub enum AuthCommands {
    #[command(about = "Sign in with email and password")]
    Login {
        #[arg(help = "Email")]
        email: String,
        #[arg(long, env = "DASH_PASSWORD", hide_env_values = true, help = "Password")]
        password: String,
    },

    #[command(about = "Create an account and sign in")]
    Register {
        #[arg(help = "Email")]
        email: String,
        #[arg(long, env = "DASH_PASSWORD", hide_env_values = true, help = "Password")]
        password: String,
        #[arg(long, help = "Full name stored in the profile metadata")]
        name: Option<String>,
    },

    #[command(about = "Sign out and forget the local session")]
    Logout,

    #[command(about = "Show current authentication status")]
    Status,

    #[command(about = "Send a password reset email")]
    ResetPassword {
        #[arg(help = "Email")]
        email: String,
    },

    #[command(about = "Update the signed-in user's metadata")]
    UpdateProfile {
        #[arg(long, help = "Full name")]
        name: Option<String>,
        #[arg(long, help = "Avatar URL")]
        avatar_url: Option<String>,
        #[arg(long = "set", value_parser = parse_key_value, help = "Extra metadata as key=value (repeatable)")]
        fields: Vec<(String, Value)>,
    },
}

pub async fn handle(cmd: AuthCommands, ctx: &Context, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        AuthCommands::Login { email, password } => {
            require_signed_out(ctx, "/login").await?;
            ctx.auth.sign_in(&email, &password).await?;
            output_success(
                &output_format,
                &format!("Signed in as {}", email),
                Some(json!({ "user": ctx.auth.user() })),
            )
        }
        AuthCommands::Register { email, password, name } => {
            require_signed_out(ctx, "/register").await?;
            ctx.auth.sign_up(&email, &password, name.as_deref()).await?;
            let state = ctx.auth.state();
            let message = if state.session.is_some() {
                format!("Registered and signed in as {}", email)
            } else {
                format!("Registered {}; confirm the email before signing in", email)
            };
            output_success(&output_format, &message, Some(json!({ "user": state.user })))
        }
        AuthCommands::Logout => {
            require_signed_in(ctx, "/logout").await?;
            ctx.auth.sign_out().await?;
            output_success(&output_format, "Signed out", None)
        }
        AuthCommands::Status => {
            ctx.auth.initialize().await;
            let state = ctx.auth.state();
            let authenticated = state.phase() == AuthPhase::Authenticated;

            match output_format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&json!({
                        "authenticated": authenticated,
                        "user": state.user,
                        "expires_at": state.session.as_ref().and_then(|s| s.expires_at),
                        "error": state.error,
                    }))?);
                }
                OutputFormat::Text => match &state.user {
                    Some(user) => {
                        println!("Signed in as {}", user.email.as_deref().unwrap_or("(no email)"));
                        if let Some(name) = user.full_name() {
                            println!("Name: {}", name);
                        }
                        println!("User ID: {}", user.id);
                    }
                    None => println!("Not signed in"),
                },
            }
            Ok(())
        }
        AuthCommands::ResetPassword { email } => {
            ctx.auth.reset_password(&email).await?;
            output_success(&output_format, &format!("Password reset email sent to {}", email), None)
        }
        AuthCommands::UpdateProfile { name, avatar_url, fields } => {
            let mut updates: Map<String, Value> = fields.into_iter().collect();
            if let Some(name) = name {
                updates.insert("full_name".to_string(), Value::String(name));
            }
            if let Some(url) = avatar_url {
                updates.insert("avatar_url".to_string(), Value::String(url));
            }
            if updates.is_empty() {
                return Err(anyhow::anyhow!("Nothing to update; pass --name, --avatar-url or --set key=value"));
            }

            require_signed_in(ctx, "/profile").await?;
            ctx.auth.update_profile(updates).await?;
            output_success(&output_format, "Profile updated", Some(json!({ "user": ctx.auth.user() })))
        }
    }
}
