pub mod ask;
pub mod billing;
pub mod health;
pub mod history;
pub mod profile;

pub use ask::create_ask_routes;
pub use billing::{create_billing_routes, create_billing_webhook_routes};
pub use health::create_health_routes;
pub use history::create_history_routes;
pub use profile::create_profile_routes;
