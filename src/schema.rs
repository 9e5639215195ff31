table! {
    devices (id) {
        id -> Int8,
        caption -> Text,
        created_at -> Timestamptz,
        device_type -> Text,
        name -> Text,
        updated_at -> Timestamptz,
        user_id -> Int8,
    }
}

table! {
    episode_actions (id) {
        id -> Int8,
        action -> Text,
        device_id -> Nullable<Int8>,
        episode_id -> Int8,
        occurred_at -> Timestamptz,
        podcast_id -> Int8,
        position -> Nullable<Int8>,
        started -> Nullable<Int8>,
        total -> Nullable<Int8>,
    }
}

table! {
    episodes (id) {
        id -> Int8,
        guid -> Nullable<Text>,
        podcast_id -> Int8,
        url -> Text,
    }
}

table! {
    podcasts (id) {
        id -> Int8,
        description -> Nullable<Text>,
        subscribed -> Bool,
        title -> Nullable<Text>,
        updated_at -> Timestamptz,
        url -> Text,
        user_id -> Int8,
        website -> Nullable<Text>,
    }
}

table! {
    settings (id) {
        id -> Int8,
        device_id -> Nullable<Int8>,
        episode_id -> Nullable<Int8>,
        key -> Text,
        podcast_id -> Nullable<Int8>,
        scope -> Text,
        user_id -> Int8,
        value -> Text,
    }
}

table! {
    users (id) {
        id -> Int8,
        created_at -> Timestamptz,
        locked -> Bool,
        password_scrypt -> Text,
        username -> Text,
    }
}

joinable!(devices -> users (user_id));
joinable!(episode_actions -> devices (device_id));
joinable!(episode_actions -> episodes (episode_id));
joinable!(episode_actions -> podcasts (podcast_id));
joinable!(episodes -> podcasts (podcast_id));
joinable!(podcasts -> users (user_id));
joinable!(settings -> devices (device_id));
joinable!(settings -> episodes (episode_id));
joinable!(settings -> podcasts (podcast_id));
joinable!(settings -> users (user_id));

allow_tables_to_appear_in_same_query!(
    devices,
    episode_actions,
    episodes,
    podcasts,
    settings,
    users,
);
