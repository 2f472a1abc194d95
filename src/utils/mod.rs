pub mod check_logger;
pub mod log_utils;
pub mod podman_utils;
