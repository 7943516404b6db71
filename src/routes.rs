use axum::{Router, middleware};
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::{
    AppState,
    handler::{
        articles::articles_handler,
        auth::auth_handler,
        categories::categories_handler,
        comments::comments_handler,
        media::media_handler,
        notifications::notifications_handler,
        tags::tags_handler,
        users::{admin_users_handler, users_handler},
    },
    middleware::{auth, rate_limit},
};

pub fn create_router(app_state: AppState) -> Router {
    let api_route = Router::new()
        .nest("/auth", auth_handler(app_state.clone()))
        .nest("/users", users_handler(app_state.clone()))
        .nest("/admin/users", admin_users_handler(app_state.clone()))
        .nest("/articles", articles_handler(app_state.clone()))
        .nest("/comments", comments_handler(app_state.clone()))
        .nest("/categories", categories_handler(app_state.clone()))
        .nest("/tags", tags_handler(app_state.clone()))
        .nest(
            "/notifications",
            notifications_handler()
                .layer(middleware::from_fn_with_state(app_state.clone(), auth)),
        )
        .nest(
            "/media",
            media_handler(app_state.clone())
                .layer(middleware::from_fn_with_state(app_state.clone(), auth)),
        )
        // Added last so the rate limit runs before any route middleware
        .layer(middleware::from_fn_with_state(app_state.clone(), rate_limit))
        .layer(TraceLayer::new_for_http());

    Router::new()
        .nest("/api", api_route)
        .nest_service("/uploads", ServeDir::new(&app_state.env.upload_dir))
        // ClientIp extractors (login, rate limit) read the source from here
        .layer(app_state.ip_extraction.clone().into_extension())
        .with_state(app_state)
}
