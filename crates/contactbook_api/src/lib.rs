//! Delivery layer for the contact book core.
//!
//! Handlers are transport-neutral: each returns a status code and a JSON body
//! so an HTTP server or the CLI can forward them unchanged.

pub mod api;
pub mod dto;

pub use api::{status_for, Api, ApiConfig, ApiResponse};
pub use dto::{
    ContactRequest, ContactResponse, CountResponse, ErrorResponse, GroupRequest, GroupResponse,
    IdsResponse, ListParams, ListResponse,
};
