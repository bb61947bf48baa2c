//! API Module
//!
//! HTTP handlers and routing for the entity REST API.
//!
//! # Endpoints
//! - `GET /api/{student,teacher}` - List documents, served through the query cache
//! - `GET /api/{student,teacher}/:id` - Fetch one document, served through the query cache
//! - `POST /api/{student,teacher}` - Create a document, invalidating the collection
//! - `PATCH /api/{student,teacher}/:id` - Update a document, invalidating the collection
//! - `DELETE /api/{student,teacher}/:id` - Delete a document, invalidating the collection
//! - `GET /stats` - Query cache statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
