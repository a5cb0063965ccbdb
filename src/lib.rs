pub mod api;
pub mod core;
pub mod notification;
pub mod scanner;
