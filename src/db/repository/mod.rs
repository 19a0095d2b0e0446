pub mod checkin;
pub mod end_time;
pub mod profile;

pub use checkin::CheckinRepository;
pub use end_time::EndTimeRepository;
pub use profile::ProfileRepository;
