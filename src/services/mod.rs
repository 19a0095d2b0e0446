pub mod auth;
pub mod checkins;
pub mod countdown;
pub mod init;
pub mod twitch;
