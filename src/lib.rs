//! Message refinement: turns service-message envelopes into rich messages.

pub mod config;
pub mod context;
pub mod error;
pub mod pipeline;
