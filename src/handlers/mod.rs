mod health;
mod index;
mod ip;
mod limited;
mod metrics;

pub use health::health_handler;
pub use index::{index_handler, not_found_handler};
pub use ip::ip_handler;
pub use limited::limited_handler;
pub use metrics::metrics_handler;
