pub mod esc_client;
pub mod k8s_driver;
