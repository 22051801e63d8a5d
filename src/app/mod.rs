pub mod auth;
pub mod feed;
pub mod posts;
pub mod social;
pub mod users;
