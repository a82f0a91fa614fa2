use crate::state::AppState;
use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::Method,
    web, Error,
};
use futures_util::future::LocalBoxFuture;
use std::{
    future::{ready, Ready},
    time::Instant,
};

/// Bucket shared by every request that matched no route.
pub const UNMATCHED_ENDPOINT: &str = "<unmatched>";

/// Counts requests, failures and latency per `METHOD route-pattern` into [`AppState`].
pub struct MetricsMiddleware;

const STANDARD_METHODS: [&str; 9] = [
    "GET", "POST", "PUT", "DELETE", "PATCH", "HEAD", "OPTIONS", "CONNECT", "TRACE",
];

/// Standard methods keep their name; extension methods share one label.
fn method_label(method: &Method) -> &'static str {
    STANDARD_METHODS
        .iter()
        .copied()
        .find(|standard| *standard == method.as_str())
        .unwrap_or("OTHER")
}

impl<S, B> Transform<S, ServiceRequest> for MetricsMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = MetricsMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(MetricsMiddlewareService { service }))
    }
}

pub struct MetricsMiddlewareService<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for MetricsMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let start_time = Instant::now();
        let method = method_label(req.method());
        let state = req.app_data::<web::Data<AppState>>().cloned();

        let fut = self.service.call(req);

        Box::pin(async move {
            let result = fut.await;
            let duration_ms = start_time.elapsed().as_millis() as u64;

            let (is_error, pattern) = match &result {
                Ok(response) => (
                    response.status().is_client_error() || response.status().is_server_error(),
                    response.request().match_pattern(),
                ),
                Err(_) => (true, None),
            };
            let endpoint = match pattern {
                Some(pattern) => format!("{} {}", method, pattern),
                None => UNMATCHED_ENDPOINT.to_string(),
            };

            if let Some(state) = state {
                state.record_request(&endpoint, duration_ms, is_error);
            }

            result
        })
    }
}
