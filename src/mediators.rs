pub mod common;
pub mod device_destroyer;
pub mod device_lister;
pub mod device_registrar;
pub mod device_updater;
pub mod episode_action_adder;
pub mod episode_action_lister;
pub mod episode_favorite_lister;
pub mod episode_last_action_finder;
pub mod settings_getter;
pub mod settings_key_resolver;
pub mod settings_saver;
pub mod subscription_change_lister;
pub mod subscription_changer;
pub mod subscription_lister;
pub mod subscription_replacer;
pub mod user_creator;
pub mod user_destroyer;
