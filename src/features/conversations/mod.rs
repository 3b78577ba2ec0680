//! Conversation threads and the chat turn pipeline.
//!
//! ## Endpoints
//!
//! | Method | Endpoint | Description |
//! |--------|----------|-------------|
//! | POST | `/api/threads` | Create a thread |
//! | GET | `/api/threads` | List the caller's threads |
//! | GET | `/api/threads/{id}` | Get a thread with messages |
//! | PUT | `/api/threads/{id}/rename` | Rename a thread |
//! | DELETE | `/api/threads/{id}` | Delete a thread |
//! | POST | `/api/chat` | Run one chat turn |
//!
//! All endpoints identify the caller by the `x-user-uuid` header.

pub mod dtos;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod stores;

pub use services::ConversationService;
pub use stores::{FileThreadStore, PostgresThreadStore, ThreadStore};
