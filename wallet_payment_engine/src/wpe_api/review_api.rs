use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{Anomaly, AuditQuery, AuditRecord, Page},
    traits::{AuditLog, AuditLogError, PaymentIntentError, PaymentIntentManagement},
};

/// Read access to the audit trail and the anomaly log.
pub struct ReviewApi<B> {
    db: B,
}

impl<B> Debug for ReviewApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ReviewApi")
    }
}

impl<B> ReviewApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> ReviewApi<B>
where B: AuditLog
{
    pub async fn audit_records(&self, query: AuditQuery) -> Result<Page<AuditRecord>, AuditLogError> {
        self.db.fetch_audit_records(query.normalized()).await
    }
}

impl<B> ReviewApi<B>
where B: PaymentIntentManagement
{
    pub async fn anomalies(&self, unresolved_only: bool) -> Result<Vec<Anomaly>, PaymentIntentError> {
        self.db.fetch_anomalies(unresolved_only).await
    }

    pub async fn resolve_anomaly(&self, id: i64, admin_id: i64) -> Result<Anomaly, PaymentIntentError> {
        let anomaly = self.db.resolve_anomaly(id, admin_id).await?;
        info!("🛡️ Anomaly #{id} for order {} marked as resolved by admin #{admin_id}", anomaly.order_id);
        Ok(anomaly)
    }
}
