//! Request handler definitions
//!
//! Define each route and it handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests. Every storage and gateway call in here is async for that reason.
//!
//! Routes under `/api` sit behind the identity middleware, so handlers can take an [`Identity`] extractor. Routes
//! declared with `requires [...]` additionally need one of the listed roles. The provider webhooks live outside
//! `/api` and are authenticated by their signatures instead.
use std::str::FromStr;

use actix_web::{get, web, HttpRequest, HttpResponse, Responder};
use log::*;
use wallet_payment_engine::{
    db_types::{AuditQuery, LedgerQuery, PaymentProvider},
    traits::{CustomerDetails, PaymentGateway},
    AdjustmentApi,
    AdminActor,
    AuditLog,
    LedgerApi,
    LedgerManagement,
    PaymentIntentManagement,
    ReviewApi,
    SettlementApi,
    SettlementError,
};

use crate::{
    auth::{Identity, Role},
    config::ServerOptions,
    data_objects::{
        AdjustBalanceRequest,
        AnomalyParams,
        AuditParams,
        CheckStatusRequest,
        JsonResponse,
        LedgerParams,
        ManualTopUpRequest,
        PurchaseDebitRequest,
        RefundRequest,
        TopUpRequest,
    },
    errors::ServerError,
    helpers::get_remote_ip,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal requires [$($roles:ty),*]) => {
        paste::paste! { pub struct [<$name:camel Route>];}
        paste::paste! {
                impl [<$name:camel Route>] {
                #[allow(clippy::new_without_default)]
                pub fn new() -> Self { Self }
            }
        }
        paste::paste! {
            impl actix_web::dev::HttpServiceFactory for [<$name:camel Route>] {
                fn register(self, config: &mut actix_web::dev::AppService) {
                    let res = actix_web::Resource::new($path)
                        .name(stringify!($name))
                        .guard(actix_web::guard::$method())
                        .to($name)
                        .wrap($crate::middleware::AclMiddlewareFactory::new(&[$($roles),+]));
                    actix_web::dev::HttpServiceFactory::register(res, config);
                }
            }
        }
    };

    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };

    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+ where requires [$($roles:ty),*])  => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>)
                    .wrap($crate::middleware::AclMiddlewareFactory::new(&[$($roles),+]));
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

fn admin_actor(identity: &Identity, req: &HttpRequest, options: &ServerOptions) -> AdminActor {
    let ip = get_remote_ip(req, options.use_x_forwarded_for, options.use_forwarded).map(|ip| ip.to_string());
    AdminActor::new(identity.user_id, ip)
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Wallet  ----------------------------------------------------
route!(my_wallet => Get "/wallet" impl LedgerManagement where requires [Role::User]);
/// The authenticated user's balance, as `{ balanceIDR, lastUpdatedAt }`. Users who have never had a ledger entry get
/// a zero balance.
pub async fn my_wallet<B: LedgerManagement>(
    identity: Identity,
    api: web::Data<LedgerApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET wallet for user {}", identity.user_id);
    let summary = api.wallet_summary(identity.user_id).await?;
    Ok(HttpResponse::Ok().json(summary))
}

route!(my_ledger => Get "/wallet/ledger" impl LedgerManagement where requires [Role::User]);
/// A page of the authenticated user's ledger history, newest first. Supports `kind`, `search`, `page` and `perPage`
/// query parameters.
pub async fn my_ledger<B: LedgerManagement>(
    identity: Identity,
    query: web::Query<LedgerParams>,
    api: web::Data<LedgerApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let query = LedgerQuery::try_from(query.into_inner())?;
    debug!("💻️ GET ledger page {} for user {}", query.page, identity.user_id);
    let page = api.ledger_page(identity.user_id, query).await?;
    Ok(HttpResponse::Ok().json(page))
}

//----------------------------------------------   Top-ups  ----------------------------------------------------
route!(top_up => Post "/wallet/topup" impl PaymentIntentManagement, PaymentGateway where requires [Role::User]);
/// Starts a gateway top-up for the authenticated user. The response carries the intent and whatever the customer
/// needs to complete the payment (virtual account number, QR string or redirect URL).
pub async fn top_up<B, G>(
    identity: Identity,
    body: web::Json<TopUpRequest>,
    api: web::Data<SettlementApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentIntentManagement,
    G: PaymentGateway,
{
    let request = body.into_inner();
    debug!("💻️ POST top-up of {} via {} for user {}", request.amount, request.provider, identity.user_id);
    let customer = request
        .customer
        .unwrap_or_else(|| CustomerDetails { name: format!("Wallet user {}", identity.user_id), ..Default::default() });
    let result =
        api.create_top_up(identity.user_id, request.amount, request.provider, &request.method, customer).await?;
    Ok(HttpResponse::Ok().json(result))
}

route!(check_status => Post "/payments/check-status" impl PaymentIntentManagement, PaymentGateway where requires [Role::User, Role::Admin]);
/// Asks the provider for the current state of a top-up and applies it. Safe to call any number of times. Users can
/// only check their own top-ups; admins can check any.
pub async fn check_status<B, G>(
    identity: Identity,
    body: web::Json<CheckStatusRequest>,
    api: web::Data<SettlementApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentIntentManagement,
    G: PaymentGateway,
{
    let order_id = body.into_inner().order_id;
    debug!("💻️ POST check-status for {order_id} by user {}", identity.user_id);
    let result = if identity.has_role(Role::Admin) {
        api.check_and_settle(&order_id).await?
    } else {
        api.check_and_settle_for_user(identity.user_id, &order_id).await?
    };
    Ok(HttpResponse::Ok().json(result))
}

//----------------------------------------------   Purchases  ----------------------------------------------------
route!(purchase_debit => Post "/purchase/debit" impl LedgerManagement where requires [Role::Checkout]);
/// Debits a wallet for a checkout order. Called by the checkout service once it has validated the order; order-level
/// idempotency is the checkout service's responsibility.
pub async fn purchase_debit<B: LedgerManagement>(
    body: web::Json<PurchaseDebitRequest>,
    api: web::Data<LedgerApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let PurchaseDebitRequest { user_id, amount, order_id } = body.into_inner();
    debug!("💻️ POST purchase debit of {amount} for user {user_id}, order {order_id}");
    if !amount.is_positive() {
        return Err(ServerError::InvalidRequestBody(format!("The purchase amount must be positive, not {amount}")));
    }
    let entry = api.debit_for_purchase(user_id, amount, order_id).await?;
    Ok(HttpResponse::Ok().json(entry))
}

//----------------------------------------------   Admin  ----------------------------------------------------
route!(admin_wallet => Get "/admin/wallets/{user_id}" impl LedgerManagement where requires [Role::Admin]);
/// A user's wallet along with a check that the balance matches the ledger.
pub async fn admin_wallet<B: LedgerManagement>(
    path: web::Path<i64>,
    api: web::Data<LedgerApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let user_id = path.into_inner();
    debug!("💻️ GET admin wallet view for user {user_id}");
    let overview = api.wallet_overview(user_id).await?;
    Ok(HttpResponse::Ok().json(overview))
}

route!(admin_ledger => Get "/admin/wallets/{user_id}/ledger" impl LedgerManagement where requires [Role::Admin]);
pub async fn admin_ledger<B: LedgerManagement>(
    path: web::Path<i64>,
    query: web::Query<LedgerParams>,
    api: web::Data<LedgerApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let user_id = path.into_inner();
    let query = LedgerQuery::try_from(query.into_inner())?;
    debug!("💻️ GET admin ledger page {} for user {user_id}", query.page);
    let page = api.ledger_page(user_id, query).await?;
    Ok(HttpResponse::Ok().json(page))
}

route!(admin_top_up => Post "/admin/wallets/{user_id}/topup" impl LedgerManagement where requires [Role::Admin]);
/// Credits a wallet manually, e.g. for a bank transfer that was reconciled by hand. A reference of the form
/// `TOPUP-YYYYMMDD-XXXXXX` is generated when none is supplied.
pub async fn admin_top_up<B: LedgerManagement>(
    req: HttpRequest,
    identity: Identity,
    path: web::Path<i64>,
    body: web::Json<ManualTopUpRequest>,
    options: web::Data<ServerOptions>,
    api: web::Data<AdjustmentApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let user_id = path.into_inner();
    let request = body.into_inner();
    let admin = admin_actor(&identity, &req, &options);
    info!("🛡️ POST manual top-up of {} for user {user_id} by admin #{}", request.amount, admin.admin_id);
    let entry =
        api.manual_top_up(&admin, user_id, request.amount, &request.description, request.reference.as_deref()).await?;
    Ok(HttpResponse::Ok().json(entry))
}

route!(admin_adjust => Post "/admin/wallets/{user_id}/adjust" impl LedgerManagement where requires [Role::Admin]);
/// Applies a signed balance adjustment. Deductions that would overdraw the wallet are refused with 422 and the
/// would-be balance.
pub async fn admin_adjust<B: LedgerManagement>(
    req: HttpRequest,
    identity: Identity,
    path: web::Path<i64>,
    body: web::Json<AdjustBalanceRequest>,
    options: web::Data<ServerOptions>,
    api: web::Data<AdjustmentApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let user_id = path.into_inner();
    let request = body.into_inner();
    let admin = admin_actor(&identity, &req, &options);
    info!("🛡️ POST balance adjustment of {} for user {user_id} by admin #{}", request.amount, admin.admin_id);
    let entry =
        api.adjust_balance(&admin, user_id, request.amount, &request.reason, request.reference.as_deref()).await?;
    Ok(HttpResponse::Ok().json(entry))
}

route!(admin_refund => Post "/admin/wallets/{user_id}/refund" impl LedgerManagement where requires [Role::Admin]);
pub async fn admin_refund<B: LedgerManagement>(
    req: HttpRequest,
    identity: Identity,
    path: web::Path<i64>,
    body: web::Json<RefundRequest>,
    options: web::Data<ServerOptions>,
    api: web::Data<LedgerApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let user_id = path.into_inner();
    let RefundRequest { amount, order_id, reason } = body.into_inner();
    if reason.trim().is_empty() {
        return Err(ServerError::InvalidRequestBody("A reason is required for every refund".to_string()));
    }
    if !amount.is_positive() {
        return Err(ServerError::InvalidRequestBody(format!("Refund amounts must be positive, not {amount}")));
    }
    let admin = admin_actor(&identity, &req, &options);
    info!("🛡️ POST refund of {amount} for user {user_id}, order {order_id} by admin #{}", admin.admin_id);
    let entry = api.refund_purchase(admin.admin_id, admin.ip_address, user_id, amount, order_id, &reason).await?;
    Ok(HttpResponse::Ok().json(entry))
}

route!(admin_audit => Get "/admin/audit" impl AuditLog where requires [Role::Admin]);
/// Searches the audit trail by target user (`userId`) and acting admin (`actorId`).
pub async fn admin_audit<B: AuditLog>(
    query: web::Query<AuditParams>,
    api: web::Data<ReviewApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let query = AuditQuery::from(query.into_inner());
    debug!("💻️ GET audit records {query:?}");
    let page = api.audit_records(query).await?;
    Ok(HttpResponse::Ok().json(page))
}

route!(admin_anomalies => Get "/admin/anomalies" impl PaymentIntentManagement where requires [Role::Admin]);
/// Provider reports that were acknowledged but not applied. Pass `unresolved=true` to hide resolved ones.
pub async fn admin_anomalies<B: PaymentIntentManagement>(
    query: web::Query<AnomalyParams>,
    api: web::Data<ReviewApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let unresolved_only = query.unresolved.unwrap_or(false);
    debug!("💻️ GET anomalies (unresolved only: {unresolved_only})");
    let anomalies = api.anomalies(unresolved_only).await?;
    Ok(HttpResponse::Ok().json(anomalies))
}

route!(resolve_anomaly => Post "/admin/anomalies/{id}/resolve" impl PaymentIntentManagement where requires [Role::Admin]);
pub async fn resolve_anomaly<B: PaymentIntentManagement>(
    identity: Identity,
    path: web::Path<i64>,
    api: web::Data<ReviewApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    info!("🛡️ POST resolve anomaly #{id} by admin #{}", identity.user_id);
    let anomaly = api.resolve_anomaly(id, identity.user_id).await?;
    Ok(HttpResponse::Ok().json(anomaly))
}

//----------------------------------------------   Webhooks  ----------------------------------------------------
route!(payment_webhook => Post "/webhook/{provider}" impl PaymentIntentManagement, PaymentGateway);
/// Receives a provider callback.
///
/// * 200 once the notification was verified and handled, including duplicates, flagged reports and notifications
///   for unknown orders (the latter with `success: false`). Providers stop redelivering on 200.
/// * 401 if the signature does not verify. Nothing is read from the payload.
/// * 400 for unknown providers and malformed payloads.
/// * 500 if storage failed, so that the provider delivers the notification again.
pub async fn payment_webhook<B, G>(
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Bytes,
    api: web::Data<SettlementApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentIntentManagement,
    G: PaymentGateway,
{
    let provider_name = path.into_inner();
    let provider = PaymentProvider::from_str(&provider_name).map_err(|e| {
        debug!("🪝️ Webhook received for unknown provider {provider_name}");
        ServerError::InvalidRequestPath(e.to_string())
    })?;
    trace!("🪝️ Received {provider} webhook ({} bytes)", body.len());
    let signature = match api.signature_header(provider)? {
        Some(header) => req.headers().get(header).and_then(|v| v.to_str().ok()),
        None => None,
    };
    match api.ingest_webhook(provider, body.as_ref(), signature).await {
        Ok(outcome) => {
            info!("🪝️ {provider} webhook handled. {}", outcome.describe());
            Ok(HttpResponse::Ok().json(JsonResponse::success(outcome.describe())))
        },
        Err(SettlementError::UnknownIntent(order_id)) => {
            warn!("🪝️ {provider} webhook for unknown order {order_id}. Acknowledged without changes");
            Ok(HttpResponse::Ok().json(JsonResponse::failure(format!("Unknown order {order_id}"))))
        },
        Err(SettlementError::Intent(e)) => {
            error!("🪝️ Could not store the result of a {provider} webhook. {e}");
            Err(ServerError::BackendError(e.to_string()))
        },
        Err(e) => Err(e.into()),
    }
}
