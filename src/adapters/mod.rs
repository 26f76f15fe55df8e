pub mod postgres;

pub use postgres::{GameResultUpdate, PendingGame, PickScore, PostgresStore};
