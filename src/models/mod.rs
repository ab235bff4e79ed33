pub mod auth;
pub mod notification;
pub mod settings;
pub mod stats;
pub mod user;

pub use auth::{AuthResponse, AuthUser, Session};
pub use notification::{count_unread, NewNotification, Notification};
pub use settings::{
    AppSettings, EmailFrequency, Language, NotificationPreferences, PrivacyPreferences, SettingsPatch, Theme,
};
pub use stats::DashboardStats;
pub use user::{NewUserProfile, Role, UserProfile, UserProfilePatch, UserStatus};
