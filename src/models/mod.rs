//! Entity models and the DTOs of the HTTP API.

pub mod entities;
pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use entities::{Entity, Student, Teacher};
pub use requests::EntityRequest;
pub use responses::{HealthResponse, StatsResponse, StatusResponse};
