use thiserror::Error;

use crate::db_types::{AuditQuery, AuditRecord, Page};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuditLogError {
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<sqlx::Error> for AuditLogError {
    fn from(e: sqlx::Error) -> Self {
        AuditLogError::DatabaseError(e.to_string())
    }
}

/// Read access to the audit log. Records are only ever written by [`crate::traits::LedgerManagement`] as part of a
/// ledger transaction, and are never modified.
#[allow(async_fn_in_trait)]
pub trait AuditLog {
    async fn fetch_audit_records(&self, query: AuditQuery) -> Result<Page<AuditRecord>, AuditLogError>;
}
