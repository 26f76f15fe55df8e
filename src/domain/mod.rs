pub mod account;
pub mod competition;
pub mod game;
pub mod participant;
pub mod pick;
pub mod result;

pub use account::*;
pub use competition::*;
pub use game::*;
pub use participant::*;
pub use pick::*;
pub use result::*;
