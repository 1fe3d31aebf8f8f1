//! Pool collectors exported on `/metrics`.
//!
//! Every series carries a `service` label so the web process and `manage`
//! can share one dashboard.

use prometheus::{
    register_histogram_vec, register_int_counter_vec, register_int_gauge_vec, HistogramVec,
    IntCounterVec, IntGaugeVec,
};
use sqlx::{pool::PoolConnection, PgPool, Postgres};
use std::time::Instant;

lazy_static::lazy_static! {
    static ref POOL_CONNECTIONS: IntGaugeVec = register_int_gauge_vec!(
        "yatube_db_pool_connections",
        "Connections held by the pool, split into idle, in_use and limit",
        &["service", "state"]
    ).expect("Prometheus metrics registration should succeed at startup");

    static ref POOL_ACQUIRE_SECONDS: HistogramVec = register_histogram_vec!(
        "yatube_db_pool_acquire_seconds",
        "Wait time for a pooled connection",
        &["service"],
        vec![0.001, 0.005, 0.025, 0.1, 0.5, 2.5, 10.0]
    ).expect("Prometheus metrics registration should succeed at startup");

    static ref POOL_ACQUIRE_FAILURES: IntCounterVec = register_int_counter_vec!(
        "yatube_db_pool_acquire_failures_total",
        "Failed attempts to take a connection from the pool",
        &["service", "reason"]
    ).expect("Prometheus metrics registration should succeed at startup");
}

/// Why `acquire` gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AcquireFailure {
    Timeout,
    Closed,
    Other,
}

impl AcquireFailure {
    pub(crate) fn classify(err: &sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut => Self::Timeout,
            sqlx::Error::PoolClosed => Self::Closed,
            _ => Self::Other,
        }
    }

    pub(crate) fn as_label(self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Closed => "closed",
            Self::Other => "other",
        }
    }

    fn record(self, service: &str) {
        POOL_ACQUIRE_FAILURES
            .with_label_values(&[service, self.as_label()])
            .inc();
    }
}

/// Point-in-time view of pool occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PoolSnapshot {
    pub size: u32,
    pub idle: u32,
    pub limit: u32,
}

impl PoolSnapshot {
    pub(crate) fn of(pool: &PgPool) -> Self {
        Self {
            size: pool.size(),
            idle: pool.num_idle() as u32,
            limit: pool.options().get_max_connections(),
        }
    }

    pub(crate) fn in_use(&self) -> u32 {
        self.size.saturating_sub(self.idle)
    }

    /// Publish the snapshot under `service`.
    pub(crate) fn publish(&self, service: &str) {
        for (state, value) in [
            ("idle", self.idle),
            ("in_use", self.in_use()),
            ("limit", self.limit),
        ] {
            POOL_CONNECTIONS
                .with_label_values(&[service, state])
                .set(i64::from(value));
        }
    }
}

/// Take a connection from `pool`, timing the wait and counting failures.
pub async fn acquire_with_metrics(
    pool: &PgPool,
    service: &str,
) -> Result<PoolConnection<Postgres>, sqlx::Error> {
    let started = Instant::now();
    let result = pool.acquire().await;

    POOL_ACQUIRE_SECONDS
        .with_label_values(&[service])
        .observe(started.elapsed().as_secs_f64());

    if let Err(err) = &result {
        AcquireFailure::classify(err).record(service);
    }

    result
}
