use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    #[default]
    System,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Language {
    #[default]
    #[serde(rename = "pt-BR")]
    PtBr,
    #[serde(rename = "en-US")]
    EnUs,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmailFrequency {
    Daily,
    #[default]
    Weekly,
    Monthly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationPreferences {
    pub email: bool,
    pub push: bool,
    pub marketing: bool,
    pub system: bool,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self {
            email: true,
            push: true,
            marketing: false,
            system: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PrivacyPreferences {
    pub show_online_status: bool,
    pub data_collection: bool,
    pub public_profile: bool,
}

impl Default for PrivacyPreferences {
    fn default() -> Self {
        Self {
            show_online_status: true,
            data_collection: false,
            public_profile: true,
        }
    }
}

/// Per-user dashboard preferences, persisted locally as one JSON object.
///
/// Every field carries a default so blobs written by older versions still
/// load; missing keys take the default value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AppSettings {
    pub theme: Theme,
    pub language: Language,
    pub notifications: NotificationPreferences,
    pub privacy: PrivacyPreferences,
    pub email_frequency: EmailFrequency,
    pub compact_sidebar: bool,
    pub timezone: String,
    pub animations: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            theme: Theme::System,
            language: Language::PtBr,
            notifications: NotificationPreferences::default(),
            privacy: PrivacyPreferences::default(),
            email_frequency: EmailFrequency::Weekly,
            compact_sidebar: false,
            timezone: "America/Sao_Paulo".to_string(),
            animations: true,
        }
    }
}

/// Shallow partial update: a present nested group replaces the whole group
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme: Option<Theme>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<Language>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notifications: Option<NotificationPreferences>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub privacy: Option<PrivacyPreferences>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_frequency: Option<EmailFrequency>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compact_sidebar: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub animations: Option<bool>,
}

impl AppSettings {
    pub fn merge(mut self, patch: SettingsPatch) -> Self {
        if let Some(v) = patch.theme { self.theme = v; }
        if let Some(v) = patch.language { self.language = v; }
        if let Some(v) = patch.notifications { self.notifications = v; }
        if let Some(v) = patch.privacy { self.privacy = v; }
        if let Some(v) = patch.email_frequency { self.email_frequency = v; }
        if let Some(v) = patch.compact_sidebar { self.compact_sidebar = v; }
        if let Some(v) = patch.timezone { self.timezone = v; }
        if let Some(v) = patch.animations { self.animations = v; }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_serializes_camel_case() {
        let json = serde_json::to_value(AppSettings::default()).unwrap();
        assert_eq!(json["theme"], "system");
        assert_eq!(json["language"], "pt-BR");
        assert_eq!(json["emailFrequency"], "weekly");
        assert_eq!(json["privacy"]["showOnlineStatus"], true);
        assert_eq!(json["timezone"], "America/Sao_Paulo");
    }

    #[test]
    fn test_old_blob_missing_fields_takes_defaults() {
        let settings: AppSettings = serde_json::from_value(json!({
            "theme": "dark",
            "language": "en-US",
            "notifications": {"email": false}
        }))
        .unwrap();
        assert_eq!(settings.theme, Theme::Dark);
        assert_eq!(settings.language, Language::EnUs);
        assert!(!settings.notifications.email);
        assert!(settings.notifications.push);
        assert!(settings.animations);
        assert_eq!(settings.timezone, "America/Sao_Paulo");
    }

    #[test]
    fn test_merge_is_shallow() {
        let merged = AppSettings::default().merge(SettingsPatch {
            theme: Some(Theme::Light),
            notifications: Some(NotificationPreferences { email: false, push: false, marketing: true, system: false }),
            ..Default::default()
        });
        assert_eq!(merged.theme, Theme::Light);
        assert!(merged.notifications.marketing);
        assert!(!merged.notifications.system);
        assert_eq!(merged.privacy, PrivacyPreferences::default());
    }
}
