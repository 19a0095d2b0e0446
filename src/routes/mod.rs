pub mod auth;
pub mod checkins;
pub mod health;
pub mod overlay;
