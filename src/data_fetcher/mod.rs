pub mod api;
pub mod models;
pub mod processors;

pub use api::StatsApi;
pub use models::{GameRecord, GameResult, PlayerStatRecord, TableRecord};
