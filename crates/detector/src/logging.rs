use crate::config::DetectorConfig;

pub fn setup_logging(config: &DetectorConfig) {
    common::setup_logging(&config.log_level, config.environment);
}
