//! Access control list middleware.
//! This middleware can be placed on any route or service inside the identity-checked scope.
//!
//! It checks the [`Identity`] that the identity middleware stored in the request extensions against the roles
//! required by the route. A caller needs at least one of the listed roles. Otherwise a 403 Forbidden response is
//! returned.
use std::{future::Future, pin::Pin, rc::Rc};

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error,
    HttpMessage,
};
use futures::future::{ok, Ready};
use log::*;

use crate::{
    auth::{Identity, Role},
    errors::{AuthError, ServerError},
};

pub struct AclMiddlewareFactory {
    required_roles: Vec<Role>,
}

impl AclMiddlewareFactory {
    pub fn new(required_roles: &[Role]) -> Self {
        AclMiddlewareFactory { required_roles: required_roles.to_vec() }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AclMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = AclMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(AclMiddlewareService { required_roles: self.required_roles.clone(), service: Rc::new(service) })
    }
}

pub struct AclMiddlewareService<S> {
    required_roles: Vec<Role>,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for AclMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let required_roles = self.required_roles.clone();
        Box::pin(async move {
            let identity = req.extensions().get::<Identity>().cloned().ok_or_else(|| {
                warn!("🛡️ No identity found in request extensions");
                ServerError::AuthenticationError(AuthError::MissingIdentity)
            })?;
            if required_roles.iter().any(|role| identity.has_role(*role)) {
                service.call(req).await
            } else {
                let required = required_roles.iter().map(|r| r.to_string()).collect::<Vec<_>>().join(" or ");
                debug!("🛡️ User {} lacks the {required} role for {}", identity.user_id, req.path());
                Err(ServerError::AuthenticationError(AuthError::InsufficientPermissions(format!(
                    "This endpoint requires the {required} role"
                )))
                .into())
            }
        })
    }
}
