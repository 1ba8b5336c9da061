pub mod rest;
pub mod state;

// Re-export the router and handlers to make them easily accessible to the
// binary that builds the web server, and to the HTTP test suite.
pub use rest::{api_router, create_record_handler, user_summary_handler};
