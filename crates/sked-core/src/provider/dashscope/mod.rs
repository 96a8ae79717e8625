//! DashScope app-completion streaming provider.

mod api;
mod sse;
mod stream;

pub use api::{AssistantClient, DEFAULT_BASE_URL, DashScopeConfig};
pub use sse::{DecodedFrame, FrameDecoder};
pub use stream::{StreamReducer, StreamUpdate};
