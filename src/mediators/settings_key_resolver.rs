use errors::*;
use mediators::common;
use model;
use model::SettingScope;
use time_helpers;
use url_sanitizer;

use diesel::pg::PgConnection;
use slog::Logger;

/// Identifies the set of settings that a request is reading or writing, as a
/// client refers to it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SettingsKey<'a> {
    Account,
    Device { device: &'a str },
    Episode { episode: &'a str, podcast: &'a str },
    Podcast { podcast: &'a str },
}

impl<'a> SettingsKey<'a> {
    /// Builds a key from a free-form scope name and whichever of the scope
    /// parameters came along with it. Parameters that the scope doesn't use
    /// are ignored.
    pub fn parse(
        scope: &str,
        device: Option<&'a str>,
        podcast: Option<&'a str>,
        episode: Option<&'a str>,
    ) -> Result<SettingsKey<'a>> {
        match scope.parse::<SettingScope>()? {
            SettingScope::Account => Ok(SettingsKey::Account),
            SettingScope::Device => Ok(SettingsKey::Device {
                device: required("device", device)?,
            }),
            SettingScope::Episode => Ok(SettingsKey::Episode {
                episode: required("episode", episode)?,
                podcast: required("podcast", podcast)?,
            }),
            SettingScope::Podcast => Ok(SettingsKey::Podcast {
                podcast: required("podcast", podcast)?,
            }),
        }
    }
}

/// A `SettingsKey` after its references have been looked up.
#[derive(Clone, Debug)]
pub enum ResolvedSettingsKey {
    Account,
    Device(model::Device),
    Episode(model::Podcast, model::Episode),
    Podcast(model::Podcast),
}

impl ResolvedSettingsKey {
    pub fn scope(&self) -> SettingScope {
        match *self {
            ResolvedSettingsKey::Account => SettingScope::Account,
            ResolvedSettingsKey::Device(_) => SettingScope::Device,
            ResolvedSettingsKey::Episode(_, _) => SettingScope::Episode,
            ResolvedSettingsKey::Podcast(_) => SettingScope::Podcast,
        }
    }

    pub fn device_id(&self) -> Option<i64> {
        match *self {
            ResolvedSettingsKey::Device(ref device) => Some(device.id),
            _ => None,
        }
    }

    pub fn episode_id(&self) -> Option<i64> {
        match *self {
            ResolvedSettingsKey::Episode(_, ref episode) => Some(episode.id),
            _ => None,
        }
    }

    pub fn podcast_id(&self) -> Option<i64> {
        match *self {
            ResolvedSettingsKey::Episode(ref podcast, _) | ResolvedSettingsKey::Podcast(ref podcast) => {
                Some(podcast.id)
            }
            _ => None,
        }
    }
}

/// Resolves a `SettingsKey` against the database.
///
/// Unlike the sync paths, nothing is created here: a device, podcast, or
/// episode that doesn't exist yet is an error.
pub struct Mediator<'a> {
    pub conn: &'a PgConnection,
    pub key:  SettingsKey<'a>,
    pub user: &'a model::User,
}

impl<'a> Mediator<'a> {
    pub fn run(&mut self, log: &Logger) -> Result<RunResult> {
        time_helpers::log_timed(&log.new(o!("step" => file!())), |log| self.run_inner(log))
    }

    fn run_inner(&mut self, log: &Logger) -> Result<RunResult> {
        let resolved = match self.key {
            SettingsKey::Account => ResolvedSettingsKey::Account,
            SettingsKey::Device { device } => {
                ResolvedSettingsKey::Device(common::load_device(log, self.conn, self.user, device)?)
            }
            SettingsKey::Episode { episode, podcast } => {
                let podcast = self.load_podcast(log, podcast)?;
                let episode = self.load_episode(log, &podcast, episode)?;
                ResolvedSettingsKey::Episode(podcast, episode)
            }
            SettingsKey::Podcast { podcast } => {
                ResolvedSettingsKey::Podcast(self.load_podcast(log, podcast)?)
            }
        };

        Ok(RunResult { resolved })
    }

    //
    // Steps
    //

    // Episodes are matched by URL first and then by GUID, which is kept
    // exactly as the client sent it.
    fn load_episode(
        &mut self,
        log: &Logger,
        podcast: &model::Podcast,
        raw: &str,
    ) -> Result<model::Episode> {
        if let Some(url) = url_sanitizer::sanitize(raw) {
            if let Some(episode) = common::find_episode(log, self.conn, podcast, &url)? {
                return Ok(episode);
            }
        }

        match common::find_episode(log, self.conn, podcast, raw)? {
            Some(episode) => Ok(episode),
            None => Err(user_errors::unknown_episode(raw)),
        }
    }

    fn load_podcast(&mut self, log: &Logger, raw: &str) -> Result<model::Podcast> {
        let podcast = match url_sanitizer::sanitize(raw) {
            Some(url) => common::find_podcast(log, self.conn, self.user, &url)?,
            None => None,
        };

        match podcast {
            Some(podcast) => Ok(podcast),
            None => Err(user_errors::unknown_podcast(raw)),
        }
    }
}

pub struct RunResult {
    pub resolved: ResolvedSettingsKey,
}

//
// Private functions
//

fn required<'a>(name: &str, value: Option<&'a str>) -> Result<&'a str> {
    match value {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(user_errors::validation(format!(
            "Please specify the {} for this scope.",
            name
        ))),
    }
}

//
// Tests
//
