use axum::{
    extract::{ConnectInfo, State},
    http::{Method, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
    Router,
};
use std::net::SocketAddr;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod admin;
pub mod auth;
pub mod bookings;
pub mod error;
pub mod merchant;
pub mod middleware;
pub mod payments;
pub mod properties;
pub mod state;

pub use state::AppState;

pub fn app(state: AppState) -> Router {
    // CORS Middleware
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
            axum::http::header::USER_AGENT,
        ]);

    let admin_routes = Router::new()
        .route("/v1/admin/users", get(admin::user_directory))
        .route("/v1/admin/analytics", get(admin::analytics))
        .route("/v1/admin/bookings", get(admin::all_bookings))
        .route("/v1/admin/payments", get(admin::all_payments))
        .route("/v1/admin/payments/stats", get(admin::payment_stats))
        .route("/v1/admin/payments/{id}/refund", post(admin::process_refund))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::admin_auth_middleware,
        ));

    let merchant_routes = Router::new()
        .route("/v1/merchant/properties", get(merchant::properties))
        .route("/v1/merchant/bookings", get(merchant::bookings))
        .route("/v1/merchant/stats", get(merchant::stats))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::merchant_auth_middleware,
        ));

    // Mixed public/authenticated surface. The middleware only attaches the
    // caller identity; handlers that need one enforce it.
    let api_routes = Router::new()
        .route("/v1/auth/register", post(auth::register))
        .route("/v1/auth/login", post(auth::login))
        .route(
            "/v1/auth/profile",
            get(auth::profile).put(auth::update_profile),
        )
        .route(
            "/v1/properties",
            get(properties::list).post(properties::create),
        )
        .route("/v1/properties/featured", get(properties::featured))
        .route(
            "/v1/properties/{id}",
            get(properties::get_one)
                .put(properties::update)
                .delete(properties::remove),
        )
        .route("/v1/properties/{id}/approve", post(properties::approve))
        .route("/v1/properties/{id}/reject", post(properties::reject))
        .route(
            "/v1/bookings/check-availability",
            get(bookings::check_availability),
        )
        .route("/v1/bookings", get(bookings::list).post(bookings::create))
        .route("/v1/bookings/{id}", get(bookings::get_one))
        .route("/v1/bookings/{id}/status", put(bookings::update_status))
        .route("/v1/bookings/{id}/cancel", post(bookings::cancel))
        .route("/v1/bookings/{id}/pay", post(payments::pay_booking))
        .route("/v1/payments/methods", get(payments::payment_methods))
        .route("/v1/payments", get(payments::list_mine))
        .route("/v1/payments/{id}", get(payments::get_one))
        .route("/v1/payments/{id}/refund", post(payments::request_refund))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::attach_user_middleware,
        ));

    Router::new()
        .merge(api_routes)
        .merge(admin_routes)
        .merge(merchant_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .with_state(state)
}

async fn rate_limit_middleware(
    State(state): State<AppState>,
    req: axum::extract::Request,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let Some(redis) = state.redis.clone() else {
        return next.run(req).await;
    };

    let ip = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let key = format!("ratelimit:{}", ip);

    match redis.check_rate_limit(&key, 100, 60).await {
        Ok(true) => next.run(req).await,
        Ok(false) => {
            (StatusCode::TOO_MANY_REQUESTS, "Rate limit exceeded").into_response()
        }
        Err(_) => next.run(req).await, // Fail open
    }
}
