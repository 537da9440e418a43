pub mod book;
pub mod governor;
pub mod models;


pub use book::GovernorBook;
pub use governor::DailyRiskGovernor;
pub use models::{GovernorCheck, GovernorLimits, GovernorState};
