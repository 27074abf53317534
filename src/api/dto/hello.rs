/*
 * Responsibility
 * - GET /api/hello の response DTO
 */
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::services::hello::Greeting;

#[derive(Debug, Serialize)]
pub struct HelloResponse {
    pub message: String,
    pub user: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
}

impl From<Greeting> for HelloResponse {
    fn from(g: Greeting) -> Self {
        Self {
            message: g.message,
            user: g.user,
            timestamp: g.timestamp,
            version: g.version,
        }
    }
}
