//! Murmur - an autonomous persona agent for X
//!
//! Keeps an OAuth2 session alive, reads the home timeline, asks a language
//! model which posts deserve a reply, posts the replies, and tracks how the
//! agent's own posts perform. Scheduling is left to the embedding process.

pub mod agent;
pub mod auth;
pub mod community;
pub mod config;
pub mod db;
pub mod engagement;
pub mod error;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod platforms;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use agent::{Agent, Stores};
pub use auth::{CredentialProvider, OAuthSessionManager, SessionState};
pub use config::{Config, Persona};
pub use db::Database;
pub use error::{MurmurError, Result};
pub use pipeline::{DecisionPipeline, PassOutcome};
pub use platforms::{Platform, PlatformClient};
pub use types::{Decision, EngagementSnapshot, Post, PostRecord, Reply, TokenRecord, Verdict};
