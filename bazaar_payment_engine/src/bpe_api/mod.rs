pub mod checkout_api;
pub mod download_api;
pub mod errors;
pub mod order_flow_api;
pub mod reconciler_api;
