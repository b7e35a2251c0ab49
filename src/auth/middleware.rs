use std::rc::Rc;

use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    web, Error, HttpMessage, ResponseError,
};
use futures::future::{ready, LocalBoxFuture, Ready};

use crate::auth::extractors::Identity;
use crate::auth::token::TokenKeys;
use crate::error::AppError;
use crate::store::CredentialStore;

/// Paths inside the protected scope that are reachable without a token.
const PUBLIC_PATHS: &[&str] = &["/api/signup/", "/api/token/"];

/// Rejects requests before any handler runs unless they carry a valid bearer
/// token for an account that still exists.
///
/// On success the caller's [`Identity`] is stored in the request extensions.
pub struct AuthMiddleware;

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = AuthMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthMiddlewareService {
            service: Rc::new(service),
        }))
    }
}

pub struct AuthMiddlewareService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        if PUBLIC_PATHS.contains(&req.path()) {
            let fut = self.service.call(req);
            return Box::pin(async move { fut.await.map(ServiceResponse::map_into_left_body) });
        }

        let service = Rc::clone(&self.service);
        Box::pin(async move {
            match authenticate(&req).await {
                Ok(identity) => {
                    req.extensions_mut().insert(identity);
                    service
                        .call(req)
                        .await
                        .map(ServiceResponse::map_into_left_body)
                }
                Err(app_err) => {
                    log::warn!("Rejected {} {}: {}", req.method(), req.path(), app_err);
                    Ok(req
                        .into_response(app_err.error_response())
                        .map_into_right_body())
                }
            }
        })
    }
}

async fn authenticate(req: &ServiceRequest) -> Result<Identity, AppError> {
    let token = req
        .headers()
        .get("Authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::Unauthorized("Missing token".into()))?;

    let keys = req
        .app_data::<web::Data<TokenKeys>>()
        .ok_or_else(|| AppError::InternalServerError("Token keys are not configured".into()))?;
    let claims = keys.verify(token)?;

    let credentials = req
        .app_data::<web::Data<CredentialStore>>()
        .ok_or_else(|| AppError::InternalServerError("Credential store is not configured".into()))?;
    if !credentials.account_exists(claims.sub).await? {
        return Err(AppError::Unauthorized("User account no longer exists".into()));
    }

    Ok(Identity::new(claims.sub))
}
