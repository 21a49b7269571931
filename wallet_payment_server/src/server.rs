use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use gateway_tools::{build_gateways, AnyGateway};
use log::*;
use wallet_payment_engine::{
    events::{EventHandlers, EventHooks, EventProducers},
    AdjustmentApi,
    LedgerApi,
    ReviewApi,
    SettlementApi,
    SqliteDatabase,
};

use crate::{
    config::ServerConfig,
    errors::ServerError,
    middleware::IdentityMiddlewareFactory,
    reconciliation_worker::start_reconciliation_worker,
    routes::{
        health,
        AdminAdjustRoute,
        AdminAnomaliesRoute,
        AdminAuditRoute,
        AdminLedgerRoute,
        AdminRefundRoute,
        AdminTopUpRoute,
        AdminWalletRoute,
        CheckStatusRoute,
        MyLedgerRoute,
        MyWalletRoute,
        PaymentWebhookRoute,
        PurchaseDebitRoute,
        ResolveAnomalyRoute,
        TopUpRoute,
    },
};

const EVENT_BUFFER_SIZE: usize = 128;

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, config.max_connections)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?
        .with_retry_policy(config.ledger_retry_policy());
    db.migrate().await.map_err(|e| ServerError::InitializeError(format!("Database migration failed. {e}")))?;
    let gateways = build_gateways(&config.gateways).map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let handlers = EventHandlers::new(EVENT_BUFFER_SIZE, create_event_hooks());
    let producers = handlers.producers();
    handlers.start_handlers().await;
    if config.reconciliation.enabled {
        let api = settlement_api(db.clone(), &gateways, producers.clone());
        let _worker = start_reconciliation_worker(api, config.reconciliation.clone());
    }
    let srv = create_server_instance(config, db, gateways, producers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

/// Anomalies are logged at error level so that log-based alerting picks them up.
pub fn create_event_hooks() -> EventHooks {
    let mut hooks = EventHooks::default();
    hooks.on_anomaly(|ev| {
        Box::pin(async move {
            let a = ev.anomaly;
            error!(
                "🚨️ Payment anomaly #{} ({}) on order {} from {} via {}. Stored status {}, reported {}. {}",
                a.id, a.kind, a.order_id, a.provider, a.source, a.stored_status, a.reported_status, a.detail
            );
        })
    });
    hooks.on_ledger_entry(|ev| {
        Box::pin(async move {
            let e = ev.entry;
            debug!(
                "💰️ Ledger entry #{} for user {}: {} {} ({}). Balance {}",
                e.id, e.user_id, e.kind, e.amount, e.reference, e.balance_after
            );
        })
    });
    hooks
}

fn settlement_api(
    db: SqliteDatabase,
    gateways: &[AnyGateway],
    producers: EventProducers,
) -> SettlementApi<SqliteDatabase, AnyGateway> {
    gateways.iter().cloned().fold(SettlementApi::new(db, producers), |api, gw| api.with_gateway(gw))
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    gateways: Vec<AnyGateway>,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let options = config.options();
    let proxy_token = config.auth_proxy_token.clone();
    let srv = HttpServer::new(move || {
        let ledger_api = LedgerApi::new(db.clone(), producers.clone());
        let adjustment_api = AdjustmentApi::new(db.clone(), producers.clone());
        let review_api = ReviewApi::new(db.clone());
        let settlement_api = settlement_api(db.clone(), &gateways, producers.clone());
        let api_scope = web::scope("/api")
            .wrap(IdentityMiddlewareFactory::new(proxy_token.clone()))
            .service(MyWalletRoute::<SqliteDatabase>::new())
            .service(MyLedgerRoute::<SqliteDatabase>::new())
            .service(TopUpRoute::<SqliteDatabase, AnyGateway>::new())
            .service(CheckStatusRoute::<SqliteDatabase, AnyGateway>::new())
            .service(PurchaseDebitRoute::<SqliteDatabase>::new())
            .service(AdminWalletRoute::<SqliteDatabase>::new())
            .service(AdminLedgerRoute::<SqliteDatabase>::new())
            .service(AdminTopUpRoute::<SqliteDatabase>::new())
            .service(AdminAdjustRoute::<SqliteDatabase>::new())
            .service(AdminRefundRoute::<SqliteDatabase>::new())
            .service(AdminAuditRoute::<SqliteDatabase>::new())
            .service(AdminAnomaliesRoute::<SqliteDatabase>::new())
            .service(ResolveAnomalyRoute::<SqliteDatabase>::new());
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("wpg::access_log"))
            .app_data(web::Data::new(ledger_api))
            .app_data(web::Data::new(adjustment_api))
            .app_data(web::Data::new(review_api))
            .app_data(web::Data::new(settlement_api))
            .app_data(web::Data::new(options))
            .service(health)
            .service(PaymentWebhookRoute::<SqliteDatabase, AnyGateway>::new())
            .service(api_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    info!("💻️ Listening on {}:{}", config.host, config.port);
    Ok(srv)
}
