pub mod admin;
pub mod announcements;
pub mod auth;
pub mod candidates;
pub mod chat;
pub mod core;
pub mod counts;
pub mod exams;
pub mod fees;
pub mod instructors;
pub mod reports;
pub mod schedule;
pub mod watch;
