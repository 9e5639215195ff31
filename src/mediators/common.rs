//! Lookups and small write steps shared between mediators. Everything here
//! expects to be called from inside a mediator's transaction.

use errors::*;
use model;
use model::insertable;
use schema;
use time_helpers;

use diesel;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use regex::Regex;
use slog::Logger;

/// Checks that a user or device name is something that we're willing to store
/// and that can appear in a URL path segment.
pub fn validate_name(kind: &str, name: &str) -> Result<()> {
    lazy_static! {
        static ref NAME_REGEX: Regex = Regex::new(r"^[A-Za-z0-9._-]+$").unwrap();
    }

    if name.is_empty() {
        bail!(user_errors::validation(format!(
            "Please specify a {} name.",
            kind
        )));
    }

    if !NAME_REGEX.is_match(name) {
        bail!(user_errors::validation(format!(
            "A {} name may only contain letters, numbers, dots, dashes, and underscores.",
            kind
        )));
    }

    Ok(())
}

pub fn load_user(log: &Logger, conn: &PgConnection, username: &str) -> Result<model::User> {
    if username.is_empty() {
        bail!(user_errors::validation("Please specify a user name."));
    }

    let user = time_helpers::log_timed(&log.new(o!("step" => "load_user")), |_log| {
        schema::users::table
            .filter(schema::users::username.eq(username))
            .first::<model::User>(conn)
            .optional()
            .chain_err(|| "Error selecting user")
    })?;

    match user {
        Some(user) => Ok(user),
        None => Err(user_errors::unknown_user(username)),
    }
}

pub fn find_device(
    log: &Logger,
    conn: &PgConnection,
    user: &model::User,
    name: &str,
) -> Result<Option<model::Device>> {
    time_helpers::log_timed(&log.new(o!("step" => "find_device")), |_log| {
        schema::devices::table
            .filter(schema::devices::user_id.eq(user.id))
            .filter(schema::devices::name.eq(name))
            .first::<model::Device>(conn)
            .optional()
            .chain_err(|| "Error selecting device")
    })
}

/// Like `find_device`, but a miss is an error.
pub fn load_device(
    log: &Logger,
    conn: &PgConnection,
    user: &model::User,
    name: &str,
) -> Result<model::Device> {
    match find_device(log, conn, user, name)? {
        Some(device) => Ok(device),
        None => Err(user_errors::unknown_device(name)),
    }
}

/// Looks up a podcast by an already sanitized URL.
pub fn find_podcast(
    log: &Logger,
    conn: &PgConnection,
    user: &model::User,
    url: &str,
) -> Result<Option<model::Podcast>> {
    time_helpers::log_timed(&log.new(o!("step" => "find_podcast")), |_log| {
        schema::podcasts::table
            .filter(schema::podcasts::user_id.eq(user.id))
            .filter(schema::podcasts::url.eq(url))
            .first::<model::Podcast>(conn)
            .optional()
            .chain_err(|| "Error selecting podcast")
    })
}

/// Finds a podcast by an already sanitized URL, inserting it if it's never
/// been seen before.
///
/// New podcasts start out unsubscribed with an epoch `updated_at` so that they
/// don't show up in any subscription diff until they transition.
pub fn find_or_create_podcast(
    log: &Logger,
    conn: &PgConnection,
    user: &model::User,
    url: &str,
) -> Result<model::Podcast> {
    time_helpers::log_timed(&log.new(o!("step" => "insert_podcast")), |_log| {
        diesel::insert_into(schema::podcasts::table)
            .values(&insertable::Podcast {
                subscribed: false,
                updated_at: time_helpers::epoch(),
                url:        url.to_owned(),
                user_id:    user.id,
            })
            .on_conflict((schema::podcasts::user_id, schema::podcasts::url))
            .do_nothing()
            .execute(conn)
            .chain_err(|| "Error inserting podcast")
    })?;

    match find_podcast(log, conn, user, url)? {
        Some(podcast) => Ok(podcast),
        None => bail!("Podcast missing after insert: {}", url),
    }
}

/// Looks up an episode within a podcast by either its URL or its GUID.
/// Matches by URL are preferred.
pub fn find_episode(
    log: &Logger,
    conn: &PgConnection,
    podcast: &model::Podcast,
    url_or_guid: &str,
) -> Result<Option<model::Episode>> {
    time_helpers::log_timed(&log.new(o!("step" => "find_episode")), |_log| {
        schema::episodes::table
            .filter(schema::episodes::podcast_id.eq(podcast.id))
            .filter(
                schema::episodes::url
                    .eq(url_or_guid)
                    .or(schema::episodes::guid.eq(url_or_guid)),
            )
            .order((
                schema::episodes::url.eq(url_or_guid).desc(),
                schema::episodes::id.asc(),
            ))
            .first::<model::Episode>(conn)
            .optional()
            .chain_err(|| "Error selecting episode")
    })
}

/// Finds an episode by an already sanitized URL, inserting it if it's never
/// been seen before. A GUID is only recorded for new episodes or for existing
/// ones that didn't have one yet.
pub fn find_or_create_episode(
    log: &Logger,
    conn: &PgConnection,
    podcast: &model::Podcast,
    url: &str,
    guid: Option<&str>,
) -> Result<model::Episode> {
    let episode = time_helpers::log_timed(&log.new(o!("step" => "insert_episode")), |_log| {
        diesel::insert_into(schema::episodes::table)
            .values(&insertable::Episode {
                guid:       guid.map(|g| g.to_owned()),
                podcast_id: podcast.id,
                url:        url.to_owned(),
            })
            .on_conflict((schema::episodes::podcast_id, schema::episodes::url))
            .do_nothing()
            .execute(conn)
            .chain_err(|| "Error inserting episode")?;

        schema::episodes::table
            .filter(schema::episodes::podcast_id.eq(podcast.id))
            .filter(schema::episodes::url.eq(url))
            .first::<model::Episode>(conn)
            .chain_err(|| "Error selecting episode")
    })?;

    if let (None, Some(guid)) = (episode.guid.as_ref(), guid) {
        return time_helpers::log_timed(&log.new(o!("step" => "update_episode_guid")), |_log| {
            diesel::update(schema::episodes::table)
                .filter(schema::episodes::id.eq(episode.id))
                .set(schema::episodes::guid.eq(Some(guid)))
                .get_result(conn)
                .chain_err(|| "Error updating episode GUID")
        });
    }

    Ok(episode)
}

/// Persists a podcast's subscription state after a transition. Only ever
/// called for podcasts whose `set_subscribed`/`set_unsubscribed` returned
/// `true`.
pub fn update_podcast_subscription(
    log: &Logger,
    conn: &PgConnection,
    podcast: &model::Podcast,
) -> Result<model::Podcast> {
    time_helpers::log_timed(
        &log.new(o!("step" => "update_podcast_subscription", "subscribed" => podcast.subscribed)),
        |_log| {
            diesel::update(schema::podcasts::table)
                .filter(schema::podcasts::id.eq(podcast.id))
                .set((
                    schema::podcasts::subscribed.eq(podcast.subscribed),
                    schema::podcasts::updated_at.eq(podcast.updated_at),
                ))
                .get_result(conn)
                .chain_err(|| "Error updating podcast subscription")
        },
    )
}
