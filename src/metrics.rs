use prometheus::{
    register_histogram_vec, register_int_counter_vec, register_int_gauge, HistogramVec,
    IntCounterVec, IntGauge,
};

lazy_static::lazy_static! {
    pub static ref QUERIES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "quiver_queries_total", "Total queries", &["collection"]
    ).unwrap();
    pub static ref QUERY_DURATION: HistogramVec = register_histogram_vec!(
        "quiver_query_duration_seconds", "Query duration", &["collection"],
        vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
    ).unwrap();
    pub static ref QUERY_ERRORS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "quiver_query_errors_total", "Failed queries by error kind", &["kind"]
    ).unwrap();
    pub static ref ACTIVE_QUERIES: IntGauge = register_int_gauge!(
        "quiver_active_queries", "Number of in-flight queries"
    ).unwrap();
    pub static ref VECTORS_SCANNED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "quiver_vectors_scanned_total", "Vectors compared against a query vector",
        &["index_type"]
    ).unwrap();
    pub static ref PREFILTER_SKIPPED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "quiver_prefilter_skipped_total", "Vectors skipped by the scalar pre-filter",
        &["index_type"]
    ).unwrap();
    pub static ref INDEX_BUILD_DURATION: HistogramVec = register_histogram_vec!(
        "quiver_index_build_duration_seconds", "Index build duration",
        &["collection", "index_type"],
        vec![0.001, 0.01, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 120.0]
    ).unwrap();
}

/// RAII guard that decrements an IntGauge on drop.
pub struct GaugeGuard<'a>(pub &'a IntGauge);

impl Drop for GaugeGuard<'_> {
    fn drop(&mut self) {
        self.0.dec();
    }
}

pub fn init() {
    lazy_static::initialize(&QUERIES_TOTAL);
    lazy_static::initialize(&QUERY_DURATION);
    lazy_static::initialize(&QUERY_ERRORS_TOTAL);
    lazy_static::initialize(&ACTIVE_QUERIES);
    lazy_static::initialize(&VECTORS_SCANNED_TOTAL);
    lazy_static::initialize(&PREFILTER_SKIPPED_TOTAL);
    lazy_static::initialize(&INDEX_BUILD_DURATION);
}
