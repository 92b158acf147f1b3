//! Shared pieces of the pcache tool, exposed for integration tests

pub mod fixture;
pub mod session;

pub use fixture::{Fixture, FixtureNode};
pub use session::Session;
