//! The application's data layer containing models that will be queried from
//! and inserted into the database.
//!
//! Simple helper functions are allowed, but they should be kept extremely
//! simple, with preference for any and all domain logic to be offloaded to a
//! mediator.
//!
//! Insertable models are found in the `Insertable` module. These are distinct
//! from queryable models so that we can take advantage of default values
//! provided by the database (the best example being ID sequences, but applies
//! to any field with a `DEFAULT`).

use errors::*;

use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;

#[derive(Clone, Debug, Queryable, Serialize)]
pub struct Device {
    pub id:          i64,
    pub caption:     String,
    pub created_at:  DateTime<Utc>,
    pub device_type: String,
    pub name:        String,
    pub updated_at:  DateTime<Utc>,
    pub user_id:     i64,
}

#[derive(Clone, Debug, Queryable)]
pub struct Episode {
    pub id:         i64,
    pub guid:       Option<String>,
    pub podcast_id: i64,
    pub url:        String,
}

#[derive(Clone, Debug, PartialEq, Queryable)]
pub struct EpisodeAction {
    pub id:          i64,
    pub action:      String,
    pub device_id:   Option<i64>,
    pub episode_id:  i64,
    pub occurred_at: DateTime<Utc>,
    pub podcast_id:  i64,
    pub position:    Option<i64>,
    pub started:     Option<i64>,
    pub total:       Option<i64>,
}

/// An episode action joined with the URLs and device name that a client
/// knows it by. This is what's handed back to the formatting layer.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EpisodeActionView {
    #[serde(skip_serializing)]
    pub id: i64,

    #[serde(skip_serializing)]
    pub episode_id: i64,

    pub action:    String,
    pub device:    Option<String>,
    pub episode:   String,
    pub guid:      Option<String>,
    pub podcast:   String,
    pub position:  Option<i64>,
    pub started:   Option<i64>,
    pub timestamp: DateTime<Utc>,
    pub total:     Option<i64>,
}

/// The shape that episode action queries select into before being converted
/// to an `EpisodeActionView`: the action, podcast URL, episode URL, episode
/// GUID, and device name (null if the action was detached from its device).
pub type EpisodeActionViewRow = (
    EpisodeAction,
    String,
    String,
    Option<String>,
    Option<String>,
);

impl From<EpisodeActionViewRow> for EpisodeActionView {
    fn from(row: EpisodeActionViewRow) -> Self {
        let (action, podcast, episode, guid, device) = row;
        EpisodeActionView {
            id: action.id,
            episode_id: action.episode_id,
            action: action.action,
            device,
            episode,
            guid,
            podcast,
            position: action.position,
            started: action.started,
            timestamp: action.occurred_at,
            total: action.total,
        }
    }
}

#[derive(Clone, Debug, Queryable, Serialize)]
pub struct Podcast {
    pub id:          i64,
    pub description: Option<String>,
    pub subscribed:  bool,
    pub title:       Option<String>,
    pub updated_at:  DateTime<Utc>,
    pub url:         String,
    pub user_id:     i64,
    pub website:     Option<String>,
}

impl Podcast {
    /// Marks the podcast subscribed as of `at`. Returns `false` without
    /// touching `updated_at` if it already was.
    pub fn set_subscribed(&mut self, at: DateTime<Utc>) -> bool {
        if self.subscribed {
            return false;
        }

        self.subscribed = true;
        self.updated_at = at;
        true
    }

    /// Marks the podcast unsubscribed as of `at`. Returns `false` without
    /// touching `updated_at` if it already was.
    pub fn set_unsubscribed(&mut self, at: DateTime<Utc>) -> bool {
        if !self.subscribed {
            return false;
        }

        self.subscribed = false;
        self.updated_at = at;
        true
    }
}

#[derive(Clone, Debug, Queryable)]
pub struct Setting {
    pub id:         i64,
    pub device_id:  Option<i64>,
    pub episode_id: Option<i64>,
    pub key:        String,
    pub podcast_id: Option<i64>,
    pub scope:      String,
    pub user_id:    i64,
    pub value:      String,
}

#[derive(Clone, Debug, Queryable, Serialize)]
pub struct User {
    pub id:         i64,
    pub created_at: DateTime<Utc>,
    pub locked:     bool,

    #[serde(skip_serializing)]
    pub password_scrypt: String,

    pub username: String,
}

//
// Enumerations
//
// These are stored as `TEXT` (constrained with `CHECK` in the database) and
// parsed at the edges so that bad input surfaces as a validation error.
//

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActionKind {
    Delete,
    Download,
    Flattr,
    New,
    Play,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match *self {
            ActionKind::Delete => "delete",
            ActionKind::Download => "download",
            ActionKind::Flattr => "flattr",
            ActionKind::New => "new",
            ActionKind::Play => "play",
        }
    }
}

impl FromStr for ActionKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "delete" => Ok(ActionKind::Delete),
            "download" => Ok(ActionKind::Download),
            "flattr" => Ok(ActionKind::Flattr),
            "new" => Ok(ActionKind::New),
            "play" => Ok(ActionKind::Play),
            _ => Err(user_errors::validation(format!(
                "Unknown episode action \"{}\".",
                s
            ))),
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeviceType {
    Desktop,
    Laptop,
    Mobile,
    Other,
    Server,
}

impl DeviceType {
    pub fn as_str(&self) -> &'static str {
        match *self {
            DeviceType::Desktop => "desktop",
            DeviceType::Laptop => "laptop",
            DeviceType::Mobile => "mobile",
            DeviceType::Other => "other",
            DeviceType::Server => "server",
        }
    }
}

impl FromStr for DeviceType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "desktop" => Ok(DeviceType::Desktop),
            "laptop" => Ok(DeviceType::Laptop),
            "mobile" => Ok(DeviceType::Mobile),
            "other" => Ok(DeviceType::Other),
            "server" => Ok(DeviceType::Server),
            _ => Err(user_errors::validation(format!(
                "Unknown device type \"{}\".",
                s
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SettingScope {
    Account,
    Device,
    Episode,
    Podcast,
}

impl SettingScope {
    pub fn as_str(&self) -> &'static str {
        match *self {
            SettingScope::Account => "account",
            SettingScope::Device => "device",
            SettingScope::Episode => "episode",
            SettingScope::Podcast => "podcast",
        }
    }
}

impl FromStr for SettingScope {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "account" => Ok(SettingScope::Account),
            "device" => Ok(SettingScope::Device),
            "episode" => Ok(SettingScope::Episode),
            "podcast" => Ok(SettingScope::Podcast),
            _ => Err(user_errors::validation(format!("Unknown scope \"{}\".", s))),
        }
    }
}


pub mod insertable {
    use schema::{devices, episode_actions, episodes, podcasts, users};

    use chrono::{DateTime, Utc};

    #[derive(Insertable)]
    #[table_name = "devices"]
    pub struct Device {
        pub caption:     String,
        pub device_type: String,
        pub name:        String,
        pub user_id:     i64,
    }

    #[derive(Insertable)]
    #[table_name = "episodes"]
    pub struct Episode {
        pub guid:       Option<String>,
        pub podcast_id: i64,
        pub url:        String,
    }

    #[derive(Insertable)]
    #[table_name = "episode_actions"]
    pub struct EpisodeAction {
        pub action:      String,
        pub device_id:   Option<i64>,
        pub episode_id:  i64,
        pub occurred_at: DateTime<Utc>,
        pub podcast_id:  i64,
        pub position:    Option<i64>,
        pub started:     Option<i64>,
        pub total:       Option<i64>,
    }

    #[derive(Insertable)]
    #[table_name = "podcasts"]
    pub struct Podcast {
        pub subscribed: bool,
        pub updated_at: DateTime<Utc>,
        pub url:        String,
        pub user_id:    i64,
    }

    #[derive(Insertable)]
    #[table_name = "users"]
    pub struct User {
        pub password_scrypt: String,
        pub username:        String,
    }
}
