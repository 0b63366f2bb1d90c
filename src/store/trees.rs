pub const USERS: &str = "users";
pub const STUDY_EVENTS: &str = "study_events";
pub const CONFIG_VERSIONS: &str = "config_versions";
