//! HTTP API for the agent.
//!
//! ## Endpoints
//!
//! - `GET /api/health` - Health check
//! - `GET /api/card` - Agent capability card
//! - `GET /.well-known/agent.json` - Agent capability card (discovery alias)
//! - `POST /api/tasks` - Submit a task (or follow-up input), then poll
//! - `POST /api/tasks/subscribe` - Submit a task and stream its events via SSE
//! - `GET /api/tasks` - List tasks
//! - `GET /api/tasks/{id}` - Get task snapshot
//! - `POST /api/tasks/{id}/cancel` - Request cancellation
//! - `GET /api/tasks/{id}/stream` - Attach/re-attach to the task's event stream
//! - `PUT /api/tasks/{id}/notifications` - Register a terminal-event callback
//! - `GET /api/tasks/{id}/notifications` - Read back the registered callback

mod routes;
pub mod types;

pub use routes::serve;
pub use types::*;
