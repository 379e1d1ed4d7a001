use std::sync::LazyLock;

use prometheus::*;

static METRIC_TEACH_COUNT: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!("im_teach_count", "count of teach operations", &["result"]).unwrap()
});

static METRIC_CLASSIFY_COUNT: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!("im_classify_count", "count of classify operations", &["result"])
        .unwrap()
});

static METRIC_CLASSIFY_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    register_histogram!("im_classify_duration", "duration of the classify call in seconds")
        .unwrap()
});

/// 增加教学计数，result 为 ok / background / error
pub fn inc_teach(result: &str) {
    METRIC_TEACH_COUNT.with_label_values(&[result]).inc();
}

/// 增加识别计数，result 为 ok / error
pub fn inc_classify(result: &str) {
    METRIC_CLASSIFY_COUNT.with_label_values(&[result]).inc();
}

pub fn observe_classify_duration(seconds: f64) {
    METRIC_CLASSIFY_DURATION.observe(seconds);
}
