//! Request / response bodies of the public and admin APIs.

pub mod chat;
pub mod content;
pub mod settings;
