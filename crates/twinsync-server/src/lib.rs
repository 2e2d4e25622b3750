//! `twinsync-server` – the JSON HTTP API.
//!
//! An [`axum`] router (default port `8099`) over the spot store and check
//! pipeline.  JSON in and out, errors as `{"detail": "..."}`; bodies are
//! capped at [`MAX_BODY_BYTES`] and must arrive within
//! [`DEFAULT_BODY_TIMEOUT`].
//!
//! # Endpoints
//!
//! | method | path | result |
//! |---|---|---|
//! | GET | `/api/spots` | every spot with last check and memory |
//! | POST | `/api/spots` | create a spot |
//! | GET / PUT / DELETE | `/api/spots/{id}` | spot with 50 latest checks / partial update / delete |
//! | POST | `/api/spots/{id}/check` | run a check now |
//! | POST | `/api/spots/{id}/reset` | drop the spot's history |
//! | POST | `/api/spots/{id}/snooze` | `{"hours": n}` |
//! | POST | `/api/spots/{id}/unsnooze` | clear snooze |
//! | POST | `/api/check-all` | check every non-snoozed spot |
//! | GET | `/api/cameras` | Home Assistant camera entities |
//! | GET | `/api/spot-types` | spot types and their templates |
//! | GET | `/api/voices` | feedback personalities |
//! | GET | `/api/settings` | which credentials are configured |

pub mod routes;
pub mod server;

pub use routes::{
    ApiState, DEFAULT_BODY_TIMEOUT, MAX_BODY_BYTES, ServiceStatus, router, router_with_body_timeout,
};
pub use server::{ApiServer, DEFAULT_PORT, ServerError};
