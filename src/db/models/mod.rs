//! Database models, one file per table.

pub mod checkin;
pub mod end_time;
pub mod profile;

pub use self::checkin::*;
pub use self::end_time::*;
pub use self::profile::*;
