use actix_multipart::Multipart;
use actix_web::{delete, get, post, put, web, Either, HttpResponse, Responder};
use serde_json::json;
use validator::Validate;

use crate::{
    auth::{Identity, TokenKeys, TokenResponse},
    error::AppError,
    models::{AccountDeletion, PasswordChange, ProfileChanges, SignupInput, TokenRequest},
    routes::forms,
    store::CredentialStore,
};

/// Creates an account.
///
/// Accepts JSON or `multipart/form-data`; the multipart form may carry a
/// `profile_picture` file part.
///
/// ## Responses:
/// - `201 Created`: the new user's profile.
/// - `400 Bad Request`: per-field errors, including an already taken username or email.
#[post("/signup/")]
pub async fn signup(
    credentials: web::Data<CredentialStore>,
    body: Either<web::Json<SignupInput>, Multipart>,
) -> Result<impl Responder, AppError> {
    let (input, picture) = match body {
        Either::Left(json) => (json.into_inner(), None),
        Either::Right(payload) => {
            let mut form = forms::read_form(payload).await?;
            let input = SignupInput::from_fields(&form.fields);
            (input, form.take_file("profile_picture"))
        }
    };

    let user = credentials.register(input, picture).await?;
    Ok(HttpResponse::Created().json(credentials.profile_view(&user)))
}

/// Exchanges username and password for a bearer token.
#[post("/token/")]
pub async fn token(
    credentials: web::Data<CredentialStore>,
    keys: web::Data<TokenKeys>,
    body: web::Json<TokenRequest>,
) -> Result<impl Responder, AppError> {
    body.validate()?;
    let request = body.into_inner();
    let identity = credentials
        .authenticate(
            request.username.as_deref().unwrap_or_default(),
            request.password.as_deref().unwrap_or_default(),
        )
        .await?;

    Ok(HttpResponse::Ok().json(TokenResponse {
        access: keys.generate(identity.user_id())?,
        user_id: identity.user_id(),
    }))
}

#[get("/profile/")]
pub async fn profile(
    credentials: web::Data<CredentialStore>,
    identity: Identity,
) -> Result<impl Responder, AppError> {
    let user = credentials.profile(&identity).await?;
    Ok(HttpResponse::Ok().json(credentials.profile_view(&user)))
}

/// Partial profile update.
///
/// `delete_picture=true` clears the picture; a multipart `profile_picture` part
/// replaces it.
#[put("/profile/")]
pub async fn update_profile(
    credentials: web::Data<CredentialStore>,
    identity: Identity,
    body: Either<web::Json<ProfileChanges>, Multipart>,
) -> Result<impl Responder, AppError> {
    let changes = match body {
        Either::Left(json) => json.into_inner(),
        Either::Right(payload) => {
            let mut form = forms::read_form(payload).await?;
            let picture = form.take_file("profile_picture");
            ProfileChanges::from_fields(&form.fields, picture)
        }
    };

    let user = credentials.update_profile(&identity, changes).await?;
    Ok(HttpResponse::Ok().json(credentials.profile_view(&user)))
}

#[post("/change_password/")]
pub async fn change_password(
    credentials: web::Data<CredentialStore>,
    identity: Identity,
    body: web::Json<PasswordChange>,
) -> Result<impl Responder, AppError> {
    credentials
        .change_password(&identity, body.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(json!({ "detail": "Password updated successfully." })))
}

/// Deletes the caller's account and everything they own.
///
/// The body must repeat the caller's username.
#[delete("/delete_account/")]
pub async fn delete_account(
    credentials: web::Data<CredentialStore>,
    identity: Identity,
    body: web::Json<AccountDeletion>,
) -> Result<impl Responder, AppError> {
    body.validate()?;
    let confirmed = body.into_inner().username.unwrap_or_default();
    credentials.delete_account(&identity, &confirmed).await?;
    Ok(HttpResponse::Ok().json(json!({ "detail": "Account deleted successfully." })))
}
