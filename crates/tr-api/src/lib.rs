//! Typed endpoints of the Treino gym-management API
//!
//! [`TreinoApi`] wraps an [`AuthenticatingHttpClient`] and exposes the
//! sign-in flow plus the student, training sheet, exercise, anamnesis and
//! assessment resources. Token refresh is handled by the client underneath;
//! every method here is a single request from the caller's point of view.

mod anamnesis;
mod assessments;
mod auth;
pub mod models;
mod students;
mod training_sheets;

use tr_auth::AuthenticatingHttpClient;

pub use auth::SessionMonitor;
pub use models::*;
pub use tr_auth::{ClientError, Result};

/// Entry point for all API resources
#[derive(Debug, Clone)]
pub struct TreinoApi {
    client: AuthenticatingHttpClient,
}

impl TreinoApi {
    pub fn new(client: AuthenticatingHttpClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &AuthenticatingHttpClient {
        &self.client
    }
}
