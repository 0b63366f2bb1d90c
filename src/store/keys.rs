use crate::store::StoreError;

const KEY_SEPARATOR: char = ':';

/// Flips the sign bit so signed microsecond offsets sort correctly as
/// unsigned, zero-padded decimal strings (pre-1970 instants included).
fn ordered_micros(timestamp_micros: i64) -> u64 {
    (timestamp_micros as u64) ^ (1 << 63)
}

fn ensure_key_component(entity: &str, value: &str) -> Result<(), StoreError> {
    if value.is_empty() || value.contains(KEY_SEPARATOR) {
        return Err(StoreError::Validation(format!(
            "{entity} id must be non-empty and must not contain '{KEY_SEPARATOR}'"
        )));
    }
    Ok(())
}

pub fn user_key(user_id: &str) -> String {
    user_id.to_string()
}

pub fn user_email_index_key(email: &str) -> String {
    format!("email:{}", email.trim().to_lowercase())
}

/// `{user}:{ordered_micros:020}`. One key per (user, canonical UTC instant),
/// ascending by time within the user prefix.
pub fn event_key(user_id: &str, timestamp_micros: i64) -> Result<String, StoreError> {
    ensure_key_component("user", user_id)?;
    Ok(format!(
        "{}{}{:020}",
        user_id,
        KEY_SEPARATOR,
        ordered_micros(timestamp_micros)
    ))
}

pub fn event_prefix(user_id: &str) -> Result<String, StoreError> {
    ensure_key_component("user", user_id)?;
    Ok(format!("{user_id}{KEY_SEPARATOR}"))
}
