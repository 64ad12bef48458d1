//! Redemption codes printed on issued tickets.
//!
//! Format: `CGT-<ticket id, 32 hex uppercase>-<6 random alphanumerics>`.
//! The ticket id makes the code unique; the suffix makes it unguessable from
//! the id alone.

use rand::distributions::Alphanumeric;
use rand::Rng;
use uuid::Uuid;

const PREFIX: &str = "CGT";
const SUFFIX_LEN: usize = 6;

pub fn issue_code(ticket_id: Uuid) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SUFFIX_LEN)
        .map(|b| char::from(b).to_ascii_uppercase())
        .collect();
    format!("{PREFIX}-{}-{suffix}", ticket_id.simple().to_string().to_uppercase())
}

/// Extract the ticket id embedded in a well-formed code
pub fn parse_code(code: &str) -> Option<Uuid> {
    let mut parts = code.trim().split('-');
    let (prefix, id, suffix) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() || prefix != PREFIX {
        return None;
    }
    if suffix.len() != SUFFIX_LEN || !suffix.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Uuid::try_parse(id).ok()
}
