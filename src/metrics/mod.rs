pub mod collector;
pub mod info;
pub mod rate;

pub use collector::*;
pub use info::parse_info;
pub use rate::RateState;
