pub mod app;
pub mod chat;
pub mod login;
pub mod notice;
pub mod root;
pub mod services;
pub mod settings;
