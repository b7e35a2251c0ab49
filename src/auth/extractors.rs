use actix_web::dev::Payload;
use actix_web::{Error as ActixError, FromRequest, HttpMessage, HttpRequest};
use std::future::{ready, Ready};

use crate::error::AppError;

/// The authenticated caller.
///
/// Every repository and credential operation takes one explicitly. In request
/// handlers it is extracted from the request extensions, where `AuthMiddleware`
/// put it after verifying the bearer token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Identity {
    user_id: i64,
}

impl Identity {
    pub fn new(user_id: i64) -> Self {
        Self { user_id }
    }

    pub fn user_id(&self) -> i64 {
        self.user_id
    }
}

impl FromRequest for Identity {
    type Error = ActixError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        match req.extensions().get::<Identity>().copied() {
            Some(identity) => ready(Ok(identity)),
            None => {
                let err = AppError::Unauthorized("Authentication credentials were not provided".into());
                ready(Err(err.into()))
            }
        }
    }
}
