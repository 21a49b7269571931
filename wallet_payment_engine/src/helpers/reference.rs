use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use rand::{distributions::Uniform, Rng};
use regex::Regex;
use thiserror::Error;

use crate::db_types::OrderId;

const BASE36: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const SUFFIX_LEN: usize = 6;

static MANUAL_REFERENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_\-:./#]{0,63}$").expect("static regex is valid"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminReferenceKind {
    TopUp,
    /// A positive adjustment.
    Add,
    /// A negative adjustment.
    Deduct,
}

impl AdminReferenceKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            AdminReferenceKind::TopUp => "TOPUP",
            AdminReferenceKind::Add => "ADD",
            AdminReferenceKind::Deduct => "DEDUCT",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("'{0}' is not a valid reference. Use up to 64 letters, digits or the symbols _-:./#")]
pub struct ReferenceError(pub String);

fn random_suffix() -> String {
    let dist = Uniform::from(0..BASE36.len());
    rand::thread_rng().sample_iter(dist).take(SUFFIX_LEN).map(|i| BASE36[i] as char).collect()
}

/// Builds the default reference for an admin action: `{TOPUP|ADD|DEDUCT}-{YYYYMMDD}-{6 x [A-Z0-9]}`, dated in UTC.
pub fn generate_admin_reference(kind: AdminReferenceKind, now: DateTime<Utc>) -> String {
    format!("{}-{}-{}", kind.prefix(), now.format("%Y%m%d"), random_suffix())
}

/// Builds a fresh order id for a gateway top-up: `WTU-{user_id}-{yyyymmddHHMMSS}-{6 x [A-Z0-9]}`.
pub fn generate_top_up_order_id(user_id: i64, now: DateTime<Utc>) -> OrderId {
    OrderId(format!("WTU-{user_id}-{}-{}", now.format("%Y%m%d%H%M%S"), random_suffix()))
}

/// Checks an admin-supplied reference and returns it trimmed.
pub fn validate_manual_reference(reference: &str) -> Result<String, ReferenceError> {
    let trimmed = reference.trim();
    if MANUAL_REFERENCE.is_match(trimmed) {
        Ok(trimmed.to_string())
    } else {
        Err(ReferenceError(reference.to_string()))
    }
}
