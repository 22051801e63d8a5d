pub mod app;
pub mod config;
pub mod domain;
pub mod http;
pub mod infra;

use crate::app::auth::AuthService;
use crate::infra::{db::Db, mailer::ErrorMailer};

#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub mailer: Option<ErrorMailer>,
    pub session_key: [u8; 32],
    pub session_ttl_hours: u64,
    pub remember_ttl_days: u64,
}

impl AppState {
    pub fn auth_service(&self) -> AuthService {
        AuthService::new(
            self.db.clone(),
            self.session_key,
            self.session_ttl_hours,
            self.remember_ttl_days,
        )
    }
}
