// src/application/mod.rs
//
// Application Layer
//
// ARCHITECTURE:
// - This layer sits ABOVE repositories and services
// - It provides the boundary between hosts (webhooks, schedulers, admin
//   tools) and the services
// - It translates service errors into host-facing responses

pub mod engine;
pub mod error_handling;

pub use engine::ReconcileEngine;
pub use error_handling::{
    status_of, ErrorResponse, ErrorType, HasOperationStatus, OperationStatus, ToErrorResponse,
};
