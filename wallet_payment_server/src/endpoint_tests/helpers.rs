use actix_web::{
    body::MessageBody,
    http::StatusCode,
    test,
    test::TestRequest,
    web,
    web::ServiceConfig,
    App,
    HttpResponse,
};
use log::debug;
use wpg_common::Secret;

use crate::{
    auth::{PROXY_TOKEN_HEADER, ROLES_HEADER, USER_ID_HEADER},
    config::ServerOptions,
    middleware::IdentityMiddlewareFactory,
};

pub const PROXY_TOKEN: &str = "test-proxy-token";

/// Adds the headers the authentication proxy would set for the given user.
pub fn as_user(req: TestRequest, user_id: i64, roles: &str) -> TestRequest {
    req.insert_header((PROXY_TOKEN_HEADER, PROXY_TOKEN))
        .insert_header((USER_ID_HEADER, user_id.to_string()))
        .insert_header((ROLES_HEADER, roles))
}

/// Calls a route mounted under `/api`, behind the identity middleware.
pub async fn api_request(req: TestRequest, configure: impl FnOnce(&mut ServiceConfig)) -> (StatusCode, String) {
    let app = App::new().app_data(web::Data::new(ServerOptions::default())).service(
        web::scope("/api")
            .wrap(IdentityMiddlewareFactory::new(Some(Secret::new(PROXY_TOKEN.to_string()))))
            .configure(configure),
    );
    let service = test::init_service(app).await;
    debug!("Making request to /api");
    let res = match test::try_call_service(&service, req.to_request()).await {
        Ok(res) => res.into_parts().1.map_into_boxed_body(),
        // Middleware rejections surface as errors here. The HTTP dispatcher would render them the same way.
        Err(e) => e.error_response().map_into_boxed_body(),
    };
    status_and_body(res)
}

/// Calls a route mounted at the top level, without identity checks.
pub async fn public_request(req: TestRequest, configure: impl FnOnce(&mut ServiceConfig)) -> (StatusCode, String) {
    let app = App::new().configure(configure);
    let service = test::init_service(app).await;
    let res = match test::try_call_service(&service, req.to_request()).await {
        Ok(res) => res.into_parts().1.map_into_boxed_body(),
        // Middleware rejections surface as errors here. The HTTP dispatcher would render them the same way.
        Err(e) => e.error_response().map_into_boxed_body(),
    };
    status_and_body(res)
}

fn status_and_body(res: HttpResponse) -> (StatusCode, String) {
    let status = res.status();
    let body = String::from_utf8_lossy(&res.into_body().try_into_bytes().unwrap()).into_owned();
    (status, body)
}
