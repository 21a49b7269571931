use std::{
    collections::HashMap,
    fmt::Debug,
    time::{Duration, Instant},
};

use chrono::Utc;
use log::*;

use crate::{
    db_types::{
        AnomalyKind,
        IntentStatus,
        NewAnomaly,
        NewPaymentIntent,
        OrderId,
        PaymentIntent,
        PaymentProvider,
        Rupiah,
        StatusSource,
    },
    events::{AnomalyDetectedEvent, EventProducers, LedgerEntryCreatedEvent},
    helpers::{generate_top_up_order_id, RetryPolicy},
    traits::{
        AnomalyRecord,
        ChargeRequest,
        CloseResult,
        CustomerDetails,
        MappedStatus,
        PaymentGateway,
        PaymentIntentError,
        PaymentIntentManagement,
        SettleResult,
        SettlementEvent,
    },
    wpe_api::{
        errors::SettlementError,
        settlement_objects::{StatusCheck, SweepSummary, TopUpResult, TransitionOutcome},
    },
};

const ORDER_ID_ATTEMPTS: usize = 3;

/// `SettlementApi` drives payment intents from creation to their single terminal state.
///
/// Webhooks and status polls both end up in the same transition logic, and the `PENDING` guard in the backend
/// ensures that an intent credits the wallet at most once no matter how many times, or by which path, the
/// settlement is reported.
pub struct SettlementApi<B, G> {
    db: B,
    gateways: HashMap<PaymentProvider, G>,
    producers: EventProducers,
    retry: RetryPolicy,
}

impl<B, G> Debug for SettlementApi<B, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let providers = self.gateways.keys().map(|p| p.to_string()).collect::<Vec<_>>().join(", ");
        write!(f, "SettlementApi [{providers}]")
    }
}

impl<B, G> SettlementApi<B, G>
where G: PaymentGateway
{
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, gateways: HashMap::new(), producers, retry: RetryPolicy::default() }
    }

    /// Registers a gateway under the provider it reports. A second gateway for the same provider replaces the first.
    pub fn with_gateway(mut self, gateway: G) -> Self {
        self.gateways.insert(gateway.provider(), gateway);
        self
    }

    /// The retry policy used for provider status queries.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn providers(&self) -> Vec<PaymentProvider> {
        self.gateways.keys().copied().collect()
    }

    /// The header that carries `provider`'s callback signature, if it is sent in a header at all.
    pub fn signature_header(&self, provider: PaymentProvider) -> Result<Option<&'static str>, SettlementError> {
        Ok(self.gateway(provider)?.signature_header())
    }

    fn gateway(&self, provider: PaymentProvider) -> Result<&G, SettlementError> {
        self.gateways.get(&provider).ok_or(SettlementError::UnsupportedProvider(provider))
    }
}

impl<B, G> SettlementApi<B, G>
where
    B: PaymentIntentManagement,
    G: PaymentGateway,
{
    /// Starts a gateway top-up. The intent is stored as `PENDING` before the provider is called, so a webhook that
    /// arrives before this call returns always finds it. If the provider cannot create the charge, the intent is
    /// closed as `FAIL`.
    pub async fn create_top_up(
        &self,
        user_id: i64,
        amount: Rupiah,
        provider: PaymentProvider,
        method: &str,
        customer: CustomerDetails,
    ) -> Result<TopUpResult, SettlementError> {
        if !amount.is_positive() {
            return Err(SettlementError::InvalidRequest(format!("The top-up amount must be positive, not {amount}")));
        }
        let method = method.trim();
        if method.is_empty() {
            return Err(SettlementError::InvalidRequest("A payment method is required".to_string()));
        }
        let gateway = self.gateway(provider)?;
        let intent = self.insert_new_intent(user_id, amount, provider, method).await?;
        let order_id = intent.order_id.clone();
        let request = ChargeRequest { order_id: order_id.clone(), amount, method: method.to_string(), customer };
        let charge = match gateway.create_charge(&request).await {
            Ok(charge) => charge,
            Err(e) => {
                error!("🪝️ Could not create a {provider} charge for order {order_id}. {e}");
                if let Err(close_err) = self.db.close_intent(&order_id, IntentStatus::Fail).await {
                    error!("🪝️ Could not close order {order_id} after the failed charge. {close_err}");
                }
                return Err(SettlementError::GatewayUnavailable(e.to_string()));
            },
        };
        let intent = if charge.provider_reference.is_empty() {
            intent
        } else {
            self.db.attach_provider_reference(&order_id, &charge.provider_reference).await?
        };
        info!("🪝️ Top-up of {amount} for user {user_id} started as {order_id} via {provider} ({method})");
        Ok(TopUpResult { intent, charge })
    }

    async fn insert_new_intent(
        &self,
        user_id: i64,
        amount: Rupiah,
        provider: PaymentProvider,
        method: &str,
    ) -> Result<PaymentIntent, SettlementError> {
        let mut attempt = 1;
        loop {
            let order_id = generate_top_up_order_id(user_id, Utc::now());
            let new_intent = NewPaymentIntent::new(order_id, user_id, amount, provider, method);
            match self.db.insert_intent(new_intent).await {
                Ok(intent) => return Ok(intent),
                Err(PaymentIntentError::DuplicateOrderId(id)) if attempt < ORDER_ID_ATTEMPTS => {
                    warn!("🪝️ Generated order id {id} is already taken. Generating another");
                    attempt += 1;
                },
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Processes a provider callback.
    ///
    /// The signature is verified before the payload is read. Verified payloads are then parsed and applied with
    /// the same transition logic as a status poll.
    pub async fn ingest_webhook(
        &self,
        provider: PaymentProvider,
        payload: &[u8],
        signature: Option<&str>,
    ) -> Result<TransitionOutcome, SettlementError> {
        let gateway = self.gateway(provider)?;
        if !gateway.verify_webhook_signature(payload, signature) {
            warn!(
                "🪝️ SECURITY: Rejected a {provider} notification with an invalid signature. {} bytes were dropped",
                payload.len()
            );
            return Err(SettlementError::SignatureVerificationFailed(provider));
        }
        let event = gateway.parse_webhook(payload).map_err(|e| {
            warn!("🪝️ Could not parse a verified {provider} notification. {e}");
            SettlementError::MalformedPayload(e.to_string())
        })?;
        debug!("🪝️ {provider} reports {} for order {}", event.raw_status, event.order_id);
        self.apply_status(event, StatusSource::Webhook).await
    }

    /// Applies a provider's view of a payment to the matching intent.
    pub async fn apply_status(
        &self,
        event: SettlementEvent,
        source: StatusSource,
    ) -> Result<TransitionOutcome, SettlementError> {
        let intent = match self.db.fetch_intent(&event.order_id).await? {
            Some(intent) if intent.provider == event.provider => intent,
            Some(intent) => {
                warn!(
                    "🪝️ {} reported on order {}, which belongs to {}. Ignoring it",
                    event.provider, event.order_id, intent.provider
                );
                return Err(SettlementError::UnknownIntent(event.order_id));
            },
            None => {
                warn!("🪝️ {} reported {} for unknown order {}", event.provider, event.raw_status, event.order_id);
                return Err(SettlementError::UnknownIntent(event.order_id));
            },
        };
        let outcome = if intent.status.is_terminal() {
            self.reconcile_terminal(intent, &event, source).await?
        } else {
            self.transition_pending(intent, &event, source).await?
        };
        info!("🪝️ [{source}] {}", outcome.describe());
        Ok(outcome)
    }

    async fn transition_pending(
        &self,
        intent: PaymentIntent,
        event: &SettlementEvent,
        source: StatusSource,
    ) -> Result<TransitionOutcome, SettlementError> {
        let status = match &event.status {
            MappedStatus::Unknown(raw) => {
                let detail = format!("Unrecognised {} status '{raw}'. The intent stays PENDING", event.provider);
                return self.flag(intent, event, AnomalyKind::UnknownProviderStatus, source, detail).await;
            },
            MappedStatus::Known(status) => *status,
        };
        match status {
            IntentStatus::Pending => Ok(TransitionOutcome::StillPending(intent)),
            IntentStatus::Settlement => {
                if let Some(reported) = event.gross_amount.filter(|a| *a != intent.gross_amount) {
                    let detail = format!("Provider reported {reported} but the intent is for {}", intent.gross_amount);
                    return self.flag(intent, event, AnomalyKind::AmountMismatch, source, detail).await;
                }
                let audit_source = format!("{source}:{}", event.provider);
                match self.db.settle_intent(&intent.order_id, &audit_source).await? {
                    SettleResult::Settled { intent, entry } => {
                        let ev = LedgerEntryCreatedEvent::for_settlement(entry.clone(), intent.clone());
                        self.producers.publish_ledger_entry(ev).await;
                        Ok(TransitionOutcome::Settled { intent, entry })
                    },
                    SettleResult::AlreadyTerminal(current) => {
                        debug!("🪝️ Lost the settlement race for {}. Re-checking against the stored state", current.order_id);
                        self.reconcile_terminal(current, event, source).await
                    },
                }
            },
            closing => match self.db.close_intent(&intent.order_id, closing).await? {
                CloseResult::Closed(intent) => Ok(TransitionOutcome::Closed(intent)),
                CloseResult::AlreadyTerminal(current) => self.reconcile_terminal(current, event, source).await,
            },
        }
    }

    async fn reconcile_terminal(
        &self,
        intent: PaymentIntent,
        event: &SettlementEvent,
        source: StatusSource,
    ) -> Result<TransitionOutcome, SettlementError> {
        match &event.status {
            MappedStatus::Known(status) if *status == intent.status => Ok(TransitionOutcome::Duplicate(intent)),
            MappedStatus::Known(IntentStatus::Pending) => Ok(TransitionOutcome::Stale(intent)),
            MappedStatus::Unknown(raw) => {
                let detail = format!("Unrecognised {} status '{raw}' for an intent that is already {}", event.provider, intent.status);
                self.flag(intent, event, AnomalyKind::UnknownProviderStatus, source, detail).await
            },
            MappedStatus::Known(status) => {
                let detail = format!("Provider reported {status} but the intent is already {}", intent.status);
                self.flag(intent, event, AnomalyKind::ConflictingTerminalState, source, detail).await
            },
        }
    }

    async fn flag(
        &self,
        intent: PaymentIntent,
        event: &SettlementEvent,
        kind: AnomalyKind,
        source: StatusSource,
        detail: String,
    ) -> Result<TransitionOutcome, SettlementError> {
        let anomaly = NewAnomaly {
            order_id: intent.order_id.clone(),
            provider: event.provider,
            kind,
            stored_status: intent.status,
            reported_status: event.raw_status.clone(),
            detail,
            source,
        };
        let anomaly = match self.db.record_anomaly(anomaly).await? {
            AnomalyRecord::Recorded(anomaly) => {
                error!("🪝️ Anomaly #{} ({kind}) on order {}: {}", anomaly.id, anomaly.order_id, anomaly.detail);
                self.producers.publish_anomaly(AnomalyDetectedEvent::new(anomaly.clone())).await;
                anomaly
            },
            AnomalyRecord::AlreadyOpen(anomaly) => {
                debug!("🪝️ {kind} on order {} is still open as anomaly #{}", anomaly.order_id, anomaly.id);
                anomaly
            },
        };
        Ok(TransitionOutcome::Flagged { intent, anomaly })
    }

    /// Asks the provider for the current status of `order_id` and applies it.
    ///
    /// Intents that are already terminal answer from storage without calling the provider. Provider failures are
    /// retried with backoff and, if they persist, reported as [`SettlementError::GatewayUnavailable`] without
    /// touching the intent.
    pub async fn check_and_settle(&self, order_id: &OrderId) -> Result<StatusCheck, SettlementError> {
        let intent =
            self.db.fetch_intent(order_id).await?.ok_or_else(|| SettlementError::UnknownIntent(order_id.clone()))?;
        self.check_intent(intent).await
    }

    /// As [`Self::check_and_settle`], but only for an intent that belongs to `user_id`.
    pub async fn check_and_settle_for_user(
        &self,
        user_id: i64,
        order_id: &OrderId,
    ) -> Result<StatusCheck, SettlementError> {
        let intent = self
            .db
            .fetch_intent(order_id)
            .await?
            .filter(|i| i.user_id == user_id)
            .ok_or_else(|| SettlementError::UnknownIntent(order_id.clone()))?;
        self.check_intent(intent).await
    }

    async fn check_intent(&self, intent: PaymentIntent) -> Result<StatusCheck, SettlementError> {
        if intent.status.is_terminal() {
            return Ok(StatusCheck::for_status(intent.status));
        }
        let outcome = self.poll(&intent).await?;
        Ok(StatusCheck::for_status(outcome.intent().status))
    }

    async fn poll(&self, intent: &PaymentIntent) -> Result<TransitionOutcome, SettlementError> {
        let gateway = self.gateway(intent.provider)?;
        let label = format!("{} status query for {}", intent.provider, intent.order_id);
        let reference = intent.provider_reference.as_deref();
        let event = self.retry.run(&label, |_| gateway.get_status(&intent.order_id, reference)).await.map_err(|e| {
            warn!("🔁️ Could not fetch the status of {} from {}. {e}", intent.order_id, intent.provider);
            SettlementError::GatewayUnavailable(e.to_string())
        })?;
        self.apply_status(event, StatusSource::StatusPoll).await
    }

    /// Polls up to `batch_size` intents that have been `PENDING` for longer than `min_age`, spacing calls to the same
    /// provider at least `provider_spacing` apart. Individual failures are counted and do not stop the sweep.
    pub async fn sweep_pending(
        &self,
        min_age: Duration,
        batch_size: i64,
        provider_spacing: Duration,
    ) -> Result<SweepSummary, SettlementError> {
        let min_age = chrono::Duration::from_std(min_age).unwrap_or_else(|_| chrono::Duration::seconds(0));
        let stale = self.db.fetch_stale_pending(Utc::now() - min_age, batch_size).await?;
        let mut summary = SweepSummary::default();
        if stale.is_empty() {
            trace!("🔁️ No stale pending intents");
            return Ok(summary);
        }
        debug!("🔁️ Checking {} stale pending intents", stale.len());
        let mut last_call: HashMap<PaymentProvider, Instant> = HashMap::new();
        for intent in stale {
            if let Some(last) = last_call.get(&intent.provider) {
                let elapsed = last.elapsed();
                if elapsed < provider_spacing {
                    tokio::time::sleep(provider_spacing - elapsed).await;
                }
            }
            last_call.insert(intent.provider, Instant::now());
            match self.poll(&intent).await {
                Ok(outcome) => summary.record(&outcome),
                Err(e) => {
                    warn!("🔁️ Reconciliation of {} failed. {e}", intent.order_id);
                    summary.record_error();
                },
            }
        }
        Ok(summary)
    }
}
