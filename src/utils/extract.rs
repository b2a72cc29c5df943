use crate::error::AppError;
use axum::{
    async_trait,
    body::HttpBody,
    extract::{
        rejection::{JsonRejection, QueryRejection},
        FromRequest, FromRequestParts, Query,
    },
    http::{request::Parts, Request},
    BoxError, Json,
};
use serde::de::DeserializeOwned;
use tracing::debug;

/// `Json` whose rejection is reported as `INVALID_INPUT` in the standard
/// failure envelope instead of axum's plain-text 4xx.
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<T, S, B> FromRequest<S, B> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
    B: HttpBody + Send + 'static,
    B::Data: Send,
    B::Error: Into<BoxError>,
{
    type Rejection = AppError;

    async fn from_request(req: Request<B>, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection: JsonRejection| {
                debug!("Rejected JSON body: {}", rejection.body_text());
                AppError::InvalidInput(rejection.body_text())
            })?;
        Ok(Self(value))
    }
}

/// `Query` with the same rejection mapping as `JsonBody`.
pub struct QueryParams<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for QueryParams<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection: QueryRejection| {
                debug!("Rejected query string: {}", rejection.body_text());
                AppError::InvalidInput(rejection.body_text())
            })?;
        Ok(Self(value))
    }
}
