// storefront/src/web/identity.rs

use crate::errors::AppError;
use actix_web::{dev::Payload, FromRequest, HttpRequest};
use futures_util::future::{ready, Ready};
use tracing::warn;
use uuid::Uuid;

pub const USER_ID_HEADER: &str = "X-User-Id";
pub const USER_EMAIL_HEADER: &str = "X-User-Email";
pub const USER_EMAIL_VERIFIED_HEADER: &str = "X-User-Email-Verified";

/// Identity asserted by the upstream identity provider through request headers.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
  pub user_id: Uuid,
  pub email: Option<String>,
  pub email_verified: bool,
}

fn header<'r>(req: &'r HttpRequest, name: &str) -> Option<&'r str> {
  req
    .headers()
    .get(name)
    .and_then(|v| v.to_str().ok())
    .map(str::trim)
    .filter(|v| !v.is_empty())
}

impl AuthenticatedUser {
  fn from_headers(req: &HttpRequest) -> Result<Self, AppError> {
    let user_id = header(req, USER_ID_HEADER)
      .and_then(|raw| Uuid::parse_str(raw).ok())
      .filter(|id| !id.is_nil())
      .ok_or_else(|| {
        warn!("Missing or invalid {} header.", USER_ID_HEADER);
        AppError::Auth("User authentication required.".to_string())
      })?;
    let email_verified = header(req, USER_EMAIL_VERIFIED_HEADER)
      .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
      .unwrap_or(false);
    Ok(Self {
      user_id,
      email: header(req, USER_EMAIL_HEADER).map(str::to_string),
      email_verified,
    })
  }
}

impl FromRequest for AuthenticatedUser {
  type Error = AppError;
  type Future = Ready<Result<Self, Self::Error>>;

  fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
    ready(Self::from_headers(req))
  }
}
