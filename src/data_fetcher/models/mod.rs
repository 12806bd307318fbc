pub mod records;
pub mod result_set;

pub use records::{GameRecord, GameResult, PlayerStatRecord, TableRecord};
pub use result_set::{ResultSet, Row, StatsResponse};
