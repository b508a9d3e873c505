//! HTTP API handlers for inkwell-story
//!
//! JSON over HTTP plus one SSE stream. The user id travels in the path;
//! authentication happens in front of this service.

pub mod comics;
pub mod health;
pub mod progress;
pub mod sse;
pub mod stories;

pub use comics::comic_routes;
pub use health::health_routes;
pub use progress::user_routes;
pub use sse::event_stream;
pub use stories::story_routes;
