use axum::{
    extract::Request,
    http::HeaderValue,
    response::Response,
};
use std::time::Instant;
use tower::Layer;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

tokio::task_local! {
    static REQUEST_ID: String;
}

/// Id of the request being served on this task, or a fresh one outside of
/// the logging layer.
pub fn current_request_id() -> String {
    REQUEST_ID
        .try_with(String::clone)
        .unwrap_or_else(|_| Uuid::new_v4().to_string())
}

#[derive(Clone, Default)]
pub struct LoggingLayer;

impl LoggingLayer {
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for LoggingLayer {
    type Service = LoggingMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        LoggingMiddleware { inner }
    }
}

#[derive(Clone)]
pub struct LoggingMiddleware<S> {
    inner: S,
}

impl<S> tower::Service<Request> for LoggingMiddleware<S>
where
    S: tower::Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>
    >;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        let request_id = Uuid::new_v4().to_string();
        let span = info_span!("request", request_id = %request_id);

        Box::pin(
            REQUEST_ID.scope(request_id.clone(), async move {
                let start = Instant::now();
                let method = req.method().clone();
                let uri = req.uri().clone();

                let mut response = inner.call(req).await?;

                let duration = start.elapsed();
                let status = response.status();

                info!(
                    method = %method,
                    uri = %uri,
                    status = %status,
                    duration_ms = duration.as_millis(),
                    "Request completed"
                );

                if let Ok(value) = HeaderValue::from_str(&request_id) {
                    response.headers_mut().insert(REQUEST_ID_HEADER, value);
                }
                Ok(response)
            })
            .instrument(span),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, routing::get, Router};
    use tower::ServiceExt;

    #[tokio::test]
    async fn tags_responses_with_the_request_id() {
        let app = Router::new()
            .route("/", get(|| async { current_request_id() }))
            .layer(LoggingLayer::new());

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let header = response.headers()[REQUEST_ID_HEADER]
            .to_str()
            .unwrap()
            .to_string();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(header, String::from_utf8(body.to_vec()).unwrap());
    }
}
