//! Domain models for the patient portal.

mod patient;
mod user;

pub use patient::*;
pub use user::*;

use serde::{Deserialize, Deserializer};

/// Accept server ids that arrive either as JSON strings or integers.
///
/// The backend uses UUIDs for patients and integers for users; both are kept
/// as strings on the client.
pub(crate) fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(i64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(s) => s,
        RawId::Number(n) => n.to_string(),
    })
}
