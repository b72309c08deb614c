pub mod admin;
pub mod auth;
pub mod dashboard;
pub mod health;
pub mod jobs;
