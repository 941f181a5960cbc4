use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::ids::UserId;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(Role::Admin),
            "user" => Some(Role::User),
            _ => None,
        }
    }
}

/// Account record as exposed outside the db layer. Password material never
/// leaves `db::queries`.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub settings: UserSettings,
    pub created_at: NaiveDateTime,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserSettings {
    #[serde(default)]
    pub notifications: NotificationPrefs,
    #[serde(default)]
    pub appearance: Appearance,
    #[serde(default)]
    pub privacy: Privacy,
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_language() -> String {
    "English".to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationPrefs {
    #[serde(default = "default_true")]
    pub email: bool,
    #[serde(default = "default_true")]
    pub appointment: bool,
    #[serde(default)]
    pub reminders: bool,
}

impl Default for NotificationPrefs {
    fn default() -> Self {
        Self {
            email: true,
            appointment: true,
            reminders: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Appearance {
    #[serde(default)]
    pub dark_mode: bool,
    #[serde(default)]
    pub compact_view: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Privacy {
    #[serde(default)]
    pub two_factor_auth: bool,
    #[serde(default = "default_true")]
    pub data_sharing: bool,
}

impl Default for Privacy {
    fn default() -> Self {
        Self {
            two_factor_auth: false,
            data_sharing: true,
        }
    }
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            notifications: NotificationPrefs::default(),
            appearance: Appearance::default(),
            privacy: Privacy::default(),
            language: default_language(),
        }
    }
}

impl UserSettings {
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Section-by-section merge; absent fields keep their current value.
    pub fn merge(&mut self, patch: SettingsPatch) {
        if let Some(n) = patch.notifications {
            if let Some(v) = n.email {
                self.notifications.email = v;
            }
            if let Some(v) = n.appointment {
                self.notifications.appointment = v;
            }
            if let Some(v) = n.reminders {
                self.notifications.reminders = v;
            }
        }
        if let Some(a) = patch.appearance {
            if let Some(v) = a.dark_mode {
                self.appearance.dark_mode = v;
            }
            if let Some(v) = a.compact_view {
                self.appearance.compact_view = v;
            }
        }
        if let Some(p) = patch.privacy {
            if let Some(v) = p.two_factor_auth {
                self.privacy.two_factor_auth = v;
            }
            if let Some(v) = p.data_sharing {
                self.privacy.data_sharing = v;
            }
        }
        if let Some(lang) = patch.language.filter(|l| !l.trim().is_empty()) {
            self.language = lang;
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsPatch {
    pub notifications: Option<NotificationPrefsPatch>,
    pub appearance: Option<AppearancePatch>,
    pub privacy: Option<PrivacyPatch>,
    pub language: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationPrefsPatch {
    pub email: Option<bool>,
    pub appointment: Option<bool>,
    pub reminders: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppearancePatch {
    pub dark_mode: Option<bool>,
    pub compact_view: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PrivacyPatch {
    pub two_factor_auth: Option<bool>,
    pub data_sharing: Option<bool>,
}
