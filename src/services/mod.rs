pub mod backend_client;
pub mod export_service;
pub mod progress_reducer;
pub mod results_service;
pub mod tree_walker;
