//! Prometheus metrics for yatube-service.
//!
//! Collectors live in the default registry and are served at `/metrics`.

use actix_web::HttpResponse;
use lazy_static::lazy_static;
use prometheus::{register_int_counter, register_int_counter_vec, IntCounter, IntCounterVec};
use prometheus::{Encoder, TextEncoder};

lazy_static! {
    /// Page cache events (hit/miss/error).
    pub static ref PAGE_CACHE_EVENTS: IntCounterVec = register_int_counter_vec!(
        "yatube_page_cache_events_total",
        "Page cache lookups segmented by outcome",
        &["event"]
    )
    .expect("failed to register yatube_page_cache_events_total");

    pub static ref POSTS_CREATED_TOTAL: IntCounter = register_int_counter!(
        "yatube_posts_created_total",
        "Posts created through the create form"
    )
    .expect("failed to register yatube_posts_created_total");

    pub static ref POSTS_EDITED_TOTAL: IntCounter = register_int_counter!(
        "yatube_posts_edited_total",
        "Posts changed through the edit form"
    )
    .expect("failed to register yatube_posts_edited_total");

    pub static ref COMMENTS_CREATED_TOTAL: IntCounter = register_int_counter!(
        "yatube_comments_created_total",
        "Comments added to posts"
    )
    .expect("failed to register yatube_comments_created_total");

    /// Follow graph changes (follow/unfollow).
    pub static ref FOLLOW_CHANGES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "yatube_follow_changes_total",
        "Follow edges created or removed",
        &["action"]
    )
    .expect("failed to register yatube_follow_changes_total");
}

/// Actix handler that renders Prometheus metrics in text format.
pub async fn serve_metrics() -> HttpResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        return HttpResponse::InternalServerError().body(err.to_string());
    }

    HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(buffer)
}
