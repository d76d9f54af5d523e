pub mod profiles;
pub mod query_history;

pub use profiles::Entity as Profiles;
pub use query_history::Entity as QueryHistory;

// Type aliases
pub type ProfileRecord = profiles::Model;
pub type QueryRecord = query_history::Model;
