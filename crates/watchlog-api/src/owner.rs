//! Owner extractor.
//!
//! Authentication happens in front of this service; the authenticated user
//! id arrives in the `X-Owner-Id` header.

use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::error::ApiError;

pub const OWNER_HEADER: &str = "x-owner-id";

/// The user a request acts for.
#[derive(Debug, Clone, Copy)]
pub struct Owner(pub Uuid);

impl<St> FromRequestParts<St> for Owner
where
  St: Send + Sync,
{
  type Rejection = ApiError;

  async fn from_request_parts(parts: &mut Parts, _: &St) -> Result<Self, Self::Rejection> {
    let value = parts
      .headers
      .get(OWNER_HEADER)
      .and_then(|v| v.to_str().ok())
      .ok_or_else(|| ApiError::Unauthorized(format!("{OWNER_HEADER} header is required")))?;

    let owner = Uuid::parse_str(value.trim())
      .map_err(|e| ApiError::Unauthorized(format!("{OWNER_HEADER}: {e}")))?;
    Ok(Owner(owner))
  }
}

#[cfg(test)]
mod tests {
  use axum::{body::Body, http::Request};

  use super::*;

  async fn extract(req: Request<Body>) -> Result<Owner, ApiError> {
    let (mut parts, _) = req.into_parts();
    Owner::from_request_parts(&mut parts, &()).await
  }

  #[tokio::test]
  async fn valid_header() {
    let id = Uuid::new_v4();
    let req = Request::builder()
      .header(OWNER_HEADER, id.to_string())
      .body(Body::empty())
      .unwrap();
    assert_eq!(extract(req).await.unwrap().0, id);
  }

  #[tokio::test]
  async fn missing_header() {
    let req = Request::builder().body(Body::empty()).unwrap();
    assert!(matches!(extract(req).await, Err(ApiError::Unauthorized(_))));
  }

  #[tokio::test]
  async fn malformed_header() {
    let req = Request::builder()
      .header(OWNER_HEADER, "not-a-uuid")
      .body(Body::empty())
      .unwrap();
    assert!(matches!(extract(req).await, Err(ApiError::Unauthorized(_))));
  }
}
