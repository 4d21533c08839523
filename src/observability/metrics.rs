use once_cell::sync::Lazy;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, register_int_gauge, HistogramVec,
    IntCounterVec, IntGauge, TextEncoder,
};

// Metrics registry
static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"]
    )
    .unwrap()
});

static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "http_request_duration_seconds",
        "HTTP request latency in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.010, 0.050, 0.100, 0.500, 1.0, 5.0]
    )
    .unwrap()
});

static LOGIN_ATTEMPTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "login_attempts_total",
        "Total number of login attempts",
        &["outcome"]
    )
    .unwrap()
});

static INCIDENTS_CREATED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "incidents_created_total",
        "Total number of incidents reported",
        &["priority"]
    )
    .unwrap()
});

static INCIDENT_STATUS_CHANGES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "incident_status_changes_total",
        "Total number of incident status updates",
        &["status"]
    )
    .unwrap()
});

static OTP_EVENTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "password_reset_codes_total",
        "Password reset codes issued and redeemed",
        &["event"]
    )
    .unwrap()
});

static NOTIFICATIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "notifications_total",
        "Outbound email notifications by outcome",
        &["outcome"]
    )
    .unwrap()
});

static NOTIFICATION_QUEUE_DEPTH: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "notification_queue_depth",
        "Notifications waiting for delivery"
    )
    .unwrap()
});

pub struct MetricsRecorder;

impl MetricsRecorder {
    pub fn record_http_request(method: &str, path: &str, status: u16) {
        HTTP_REQUESTS_TOTAL
            .with_label_values(&[method, path, &status.to_string()])
            .inc();
    }

    pub fn record_http_duration(method: &str, path: &str, duration: f64) {
        HTTP_REQUEST_DURATION
            .with_label_values(&[method, path])
            .observe(duration);
    }

    pub fn record_login(outcome: &str) {
        LOGIN_ATTEMPTS_TOTAL.with_label_values(&[outcome]).inc();
    }

    pub fn record_incident_created(priority: &str) {
        INCIDENTS_CREATED_TOTAL.with_label_values(&[priority]).inc();
    }

    pub fn record_status_change(status: &str) {
        INCIDENT_STATUS_CHANGES_TOTAL
            .with_label_values(&[status])
            .inc();
    }

    /// `event` is `issued` or `redeemed`
    pub fn record_otp(event: &str) {
        OTP_EVENTS_TOTAL.with_label_values(&[event]).inc();
    }

    /// `outcome` is `delivered`, `failed`, `retried` or `dropped`
    pub fn record_notification(outcome: &str) {
        NOTIFICATIONS_TOTAL.with_label_values(&[outcome]).inc();
    }

    pub fn set_notification_queue_depth(depth: i64) {
        NOTIFICATION_QUEUE_DEPTH.set(depth);
    }

    /// Export all metrics in Prometheus format
    pub fn export() -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = prometheus::gather();
        encoder.encode_to_string(&metric_families)
    }
}
