mod database {
    pub mod actions;
    pub mod error;
    pub mod filters;
    pub mod form;
    pub mod media;
    pub mod pagination;
    pub mod schema;
}
mod authentication {
    pub mod cryptography;
    pub mod jwt;
    pub mod middleware;
    pub mod permissions;
}
pub mod config;
mod constants;
pub mod routes {
    pub mod api;
    pub mod auth;
    pub mod ingredients;
    pub mod recipes;
    pub mod tags;
    pub mod users;
}
pub mod state;

mod cache {
    pub mod cache;
}

pub use authentication::*;
pub use cache::cache::*;
pub use constants::*;
pub use database::*;
pub use routes::api::routes;

pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
