pub mod api;
pub mod appresult;
pub mod config;
pub mod credentials;
pub mod db;
pub mod model;
pub mod random;
pub mod session;
pub mod storage;
pub mod store;
pub mod sync;

use axum::extract::FromRef;

pub use appresult::{AppError, AppResult};

#[derive(Clone, FromRef)]
pub struct AppState {
    pub sync: sync::Synchronizer,
}
