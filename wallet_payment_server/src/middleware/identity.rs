//! Identity middleware for the `/api` scope.
//!
//! Checks the proxy token (when one is configured), parses the identity headers and stores the resulting
//! [`Identity`] in the request extensions. Requests without a valid identity are answered with 401 and never reach
//! a handler.
use std::{
    future::{ready, Ready},
    rc::Rc,
};

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error,
    HttpMessage,
};
use futures::future::LocalBoxFuture;
use log::*;
use wpg_common::Secret;

use crate::{
    auth::{Identity, PROXY_TOKEN_HEADER},
    errors::{AuthError, ServerError},
};

pub struct IdentityMiddlewareFactory {
    proxy_token: Option<Secret<String>>,
}

impl IdentityMiddlewareFactory {
    pub fn new(proxy_token: Option<Secret<String>>) -> Self {
        IdentityMiddlewareFactory { proxy_token }
    }
}

impl<S, B> Transform<S, ServiceRequest> for IdentityMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = IdentityMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(IdentityMiddlewareService { proxy_token: self.proxy_token.clone(), service: Rc::new(service) }))
    }
}

pub struct IdentityMiddlewareService<S> {
    proxy_token: Option<Secret<String>>,
    service: Rc<S>,
}

impl<S> IdentityMiddlewareService<S> {
    fn authenticate(&self, req: &ServiceRequest) -> Result<Identity, AuthError> {
        if let Some(expected) = &self.proxy_token {
            let supplied = req.headers().get(PROXY_TOKEN_HEADER).and_then(|v| v.to_str().ok()).unwrap_or_default();
            if !expected.matches(supplied) {
                warn!("🛡️ Request to {} did not carry a valid proxy token. Denying access.", req.path());
                return Err(AuthError::UntrustedProxy);
            }
        }
        Identity::from_headers(req.headers())
    }
}

impl<S, B> Service<ServiceRequest> for IdentityMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let identity = self.authenticate(&req);
        let service = Rc::clone(&self.service);
        Box::pin(async move {
            let identity = identity.map_err(|e| {
                debug!("🛡️ Rejecting request to {}. {e}", req.path());
                ServerError::AuthenticationError(e)
            })?;
            trace!("🛡️ Request from user {} with roles {:?}", identity.user_id, identity.roles);
            req.extensions_mut().insert(identity);
            service.call(req).await
        })
    }
}
