use clap::Subcommand;
use serde_json::json;

use crate::cli::config::Context;
use crate::cli::utils::{output_json, output_success, parse_keyword};
use crate::cli::OutputFormat;
use crate::models::{AppSettings, EmailFrequency, Language, SettingsPatch, Theme};

#[derive(Subcommand)]
pub enum SettingsCommands {
    #[command(about = "Show the current settings")]
    Show,

    #[command(about = "Change one or more settings")]
    Set {
        #[arg(long, value_parser = parse_keyword::<Theme>, help = "light | dark | system")]
        theme: Option<Theme>,
        #[arg(long, value_parser = parse_keyword::<Language>, help = "pt-BR | en-US")]
        language: Option<Language>,
        #[arg(long, value_parser = parse_keyword::<EmailFrequency>, help = "daily | weekly | monthly")]
        email_frequency: Option<EmailFrequency>,
        #[arg(long)]
        compact_sidebar: Option<bool>,
        #[arg(long)]
        timezone: Option<String>,
        #[arg(long)]
        animations: Option<bool>,
    },

    #[command(about = "Restore default settings")]
    Reset,
}

pub async fn handle(cmd: SettingsCommands, ctx: &Context, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        SettingsCommands::Show => {
            let settings = ctx.app.settings();
            match output_format {
                OutputFormat::Json => output_json(&settings)?,
                OutputFormat::Text => print_settings(&settings),
            }
            Ok(())
        }
        SettingsCommands::Set { theme, language, email_frequency, compact_sidebar, timezone, animations } => {
            let patch = SettingsPatch {
                theme,
                language,
                email_frequency,
                compact_sidebar,
                timezone,
                animations,
                ..Default::default()
            };
            if patch == SettingsPatch::default() {
                return Err(anyhow::anyhow!("Nothing to change"));
            }
            let settings = ctx.app.update_settings(patch)?;
            output_success(&output_format, "Settings saved", Some(json!({ "settings": settings })))
        }
        SettingsCommands::Reset => {
            let defaults = AppSettings::default();
            let settings = ctx.app.update_settings(SettingsPatch {
                theme: Some(defaults.theme),
                language: Some(defaults.language),
                notifications: Some(defaults.notifications),
                privacy: Some(defaults.privacy),
                email_frequency: Some(defaults.email_frequency),
                compact_sidebar: Some(defaults.compact_sidebar),
                timezone: Some(defaults.timezone),
                animations: Some(defaults.animations),
            })?;
            output_success(&output_format, "Settings reset to defaults", Some(json!({ "settings": settings })))
        }
    }
}

fn print_settings(settings: &AppSettings) {
    println!("Theme:            {:?}", settings.theme);
    println!("Language:         {:?}", settings.language);
    println!("Email frequency:  {:?}", settings.email_frequency);
    println!("Compact sidebar:  {}", settings.compact_sidebar);
    println!("Timezone:         {}", settings.timezone);
    println!("Animations:       {}", settings.animations);
    let n = &settings.notifications;
    println!("Notifications:    email={} push={} marketing={} system={}", n.email, n.push, n.marketing, n.system);
    let p = &settings.privacy;
    println!(
        "Privacy:          online_status={} data_collection={} public_profile={}",
        p.show_online_status, p.data_collection, p.public_profile
    );
}
