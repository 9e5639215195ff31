use errors::*;
use mediators::common;
use model;
use model::EpisodeActionView;
use schema;
use time_helpers;
use url_sanitizer;

use chrono::{DateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use slog::Logger;
use std::collections::HashMap;

/// Lists episode actions from an account's log.
///
/// `device` names a device whose own actions should be left out (so that a
/// client doesn't get its own uploads echoed back); actions that have no
/// device are always included. With `aggregated` set, only the latest action
/// for each episode is kept.
pub struct Mediator<'a> {
    pub aggregated: bool,
    pub conn:       &'a PgConnection,
    pub device:     Option<&'a str>,
    pub limit:      Option<i64>,
    pub order:      SortOrder,
    pub podcast:    Option<&'a str>,
    pub since:      Option<DateTime<Utc>>,
    pub username:   &'a str,
}

impl<'a> Mediator<'a> {
    pub fn run(&mut self, log: &Logger) -> Result<RunResult> {
        time_helpers::log_timed(&log.new(o!("step" => file!())), |log| {
            self.conn.transaction::<_, Error, _>(|| self.run_inner(log))
        })
    }

    fn run_inner(&mut self, log: &Logger) -> Result<RunResult> {
        let timestamp = Utc::now();
        let user = common::load_user(log, self.conn, self.username)?;

        let device = match self.device {
            Some(name) => Some(common::load_device(log, self.conn, &user, name)?),
            None => None,
        };

        let podcast = match self.podcast {
            Some(url) => match find_podcast_by_raw_url(log, self.conn, &user, url)? {
                Some(podcast) => Some(podcast),
                None => {
                    return Ok(RunResult {
                        actions: vec![],
                        timestamp,
                    })
                }
            },
            None => None,
        };

        let mut actions = self.select_actions(log, &user, device.as_ref(), podcast.as_ref())?;

        // Aggregation has to see every matching row before anything can be
        // cut, so only the plain listing is ordered and limited in the query.
        if self.aggregated {
            actions = aggregate_latest(actions);
            sort_actions(&mut actions, self.order);

            if let Some(limit) = self.limit {
                actions.truncate(limit.max(0) as usize);
            }
        }

        Ok(RunResult { actions, timestamp })
    }

    //
    // Steps
    //

    fn select_actions(
        &mut self,
        log: &Logger,
        user: &model::User,
        device: Option<&model::Device>,
        podcast: Option<&model::Podcast>,
    ) -> Result<Vec<EpisodeActionView>> {
        let (limit, order) = if self.aggregated {
            (None, None)
        } else {
            (self.limit, Some(self.order))
        };

        load_views(
            log,
            self.conn,
            &ViewFilter {
                exclude_device_id: device.map(|d| d.id),
                limit,
                order,
                podcast_id: podcast.map(|p| p.id),
                since: self.since,
                ..ViewFilter::new(user)
            },
        )
    }
}

pub struct RunResult {
    pub actions:   Vec<EpisodeActionView>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// Collapses a set of actions down to the latest one for each episode.
///
/// "Latest" is by timestamp, with ties going to the action that was recorded
/// last (highest ID). Ordering of the result is unspecified.
pub fn aggregate_latest(actions: Vec<EpisodeActionView>) -> Vec<EpisodeActionView> {
    let mut latest: HashMap<i64, EpisodeActionView> = HashMap::new();

    for action in actions {
        let replace = match latest.get(&action.episode_id) {
            Some(current) => (action.timestamp, action.id) > (current.timestamp, current.id),
            None => true,
        };

        if replace {
            latest.insert(action.episode_id, action);
        }
    }

    latest.into_iter().map(|(_, action)| action).collect()
}

/// Sorts actions by timestamp, then ID.
pub fn sort_actions(actions: &mut [EpisodeActionView], order: SortOrder) {
    actions.sort_by_key(|a| (a.timestamp, a.id));

    if order == SortOrder::Descending {
        actions.reverse();
    }
}

/// Finds a podcast by a URL as a client sent it. URLs that don't sanitize
/// can't match anything.
pub fn find_podcast_by_raw_url(
    log: &Logger,
    conn: &PgConnection,
    user: &model::User,
    raw: &str,
) -> Result<Option<model::Podcast>> {
    match url_sanitizer::sanitize(raw) {
        Some(url) => common::find_podcast(log, conn, user, &url),
        None => Ok(None),
    }
}

/// Narrows down the episode actions loaded by `load_views`. Every filter
/// other than the user is optional.
///
/// `order` sorts by timestamp, then ID. `limit` is applied after ordering, so
/// it should only be set along with an `order`.
pub struct ViewFilter {
    pub episode_ids:       Option<Vec<i64>>,
    pub exclude_action:    Option<&'static str>,
    pub exclude_device_id: Option<i64>,
    pub limit:             Option<i64>,
    pub order:             Option<SortOrder>,
    pub podcast_id:        Option<i64>,
    pub since:             Option<DateTime<Utc>>,
    pub user_id:           i64,
}

impl ViewFilter {
    pub fn new(user: &model::User) -> ViewFilter {
        ViewFilter {
            episode_ids:       None,
            exclude_action:    None,
            exclude_device_id: None,
            limit:             None,
            order:             None,
            podcast_id:        None,
            since:             None,
            user_id:           user.id,
        }
    }
}

/// Loads episode actions joined with the podcast URL, episode URL and GUID,
/// and device name that make up an `EpisodeActionView`. Shared with the other
/// episode action readers.
pub fn load_views(
    log: &Logger,
    conn: &PgConnection,
    filter: &ViewFilter,
) -> Result<Vec<EpisodeActionView>> {
    let rows = time_helpers::log_timed(&log.new(o!("step" => "load_episode_action_views")), |_log| {
        let mut query = schema::episode_actions::table
            .inner_join(schema::podcasts::table)
            .inner_join(schema::episodes::table)
            .left_join(schema::devices::table)
            .filter(schema::podcasts::user_id.eq(filter.user_id))
            .select((
                schema::episode_actions::all_columns,
                schema::podcasts::url,
                schema::episodes::url,
                schema::episodes::guid,
                schema::devices::name.nullable(),
            ))
            .into_boxed();

        if let Some(ref episode_ids) = filter.episode_ids {
            query = query.filter(schema::episode_actions::episode_id.eq_any(episode_ids.clone()));
        }

        if let Some(action) = filter.exclude_action {
            query = query.filter(schema::episode_actions::action.ne(action));
        }

        // Actions that were detached from a destroyed device belong to no
        // device, so they're never an echo.
        if let Some(device_id) = filter.exclude_device_id {
            query = query.filter(
                schema::episode_actions::device_id
                    .ne(device_id)
                    .or(schema::episode_actions::device_id.is_null()),
            );
        }

        if let Some(podcast_id) = filter.podcast_id {
            query = query.filter(schema::episode_actions::podcast_id.eq(podcast_id));
        }

        if let Some(since) = filter.since {
            query = query.filter(schema::episode_actions::occurred_at.gt(since));
        }

        match filter.order {
            Some(SortOrder::Ascending) => {
                query = query.order((
                    schema::episode_actions::occurred_at.asc(),
                    schema::episode_actions::id.asc(),
                ));
            }
            Some(SortOrder::Descending) => {
                query = query.order((
                    schema::episode_actions::occurred_at.desc(),
                    schema::episode_actions::id.desc(),
                ));
            }
            None => (),
        }

        if let Some(limit) = filter.limit {
            query = query.limit(limit.max(0));
        }

        query
            .load::<model::EpisodeActionViewRow>(conn)
            .chain_err(|| "Error selecting episode actions")
    })?;

    Ok(rows.into_iter().map(EpisodeActionView::from).collect())
}

//
// Tests
//
