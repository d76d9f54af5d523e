pub mod history;
pub mod profiles;

pub use history::HistoryDao;
pub use profiles::ProfilesDao;
