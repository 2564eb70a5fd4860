use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, HistogramVec,
    IntCounter, IntCounterVec,
};

lazy_static::lazy_static! {
    pub static ref STORE_OPERATION_DURATION: HistogramVec = register_histogram_vec!(
        "vectorlake_store_operation_duration_seconds", "Blob store operation latency",
        &["operation"],
        vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    ).unwrap();
    pub static ref STORE_ERRORS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "vectorlake_store_errors_total", "Blob store operation errors", &["operation"]
    ).unwrap();
    pub static ref DISK_CACHE_TOTAL: IntCounterVec = register_int_counter_vec!(
        "vectorlake_disk_cache_total", "Local artifact cache lookups", &["result"]
    ).unwrap();
    pub static ref DATASET_LOADS_TOTAL: IntCounter = register_int_counter!(
        "vectorlake_dataset_loads_total", "Raw dataset fetch-and-decode operations"
    ).unwrap();
    pub static ref INDEX_LOADS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "vectorlake_index_loads_total", "Index artifacts made resident",
        &["variant", "source"]
    ).unwrap();
    pub static ref INDEX_BUILD_DURATION: HistogramVec = register_histogram_vec!(
        "vectorlake_index_build_duration_seconds", "Index build duration",
        &["variant"],
        vec![0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0]
    ).unwrap();
    pub static ref SEARCH_DURATION: HistogramVec = register_histogram_vec!(
        "vectorlake_search_duration_seconds", "Search duration",
        &["variant"],
        vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]
    ).unwrap();
}

pub fn init() {
    lazy_static::initialize(&STORE_OPERATION_DURATION);
    lazy_static::initialize(&STORE_ERRORS_TOTAL);
    lazy_static::initialize(&DISK_CACHE_TOTAL);
    lazy_static::initialize(&DATASET_LOADS_TOTAL);
    lazy_static::initialize(&INDEX_LOADS_TOTAL);
    lazy_static::initialize(&INDEX_BUILD_DURATION);
    lazy_static::initialize(&SEARCH_DURATION);
}
