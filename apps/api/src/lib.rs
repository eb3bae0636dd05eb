//! Résumé-to-applications pipeline: parse a résumé, search job listings,
//! score fit and draft cover letters, streaming progress to the client.

pub mod config;
pub mod errors;
pub mod extract;
pub mod generation;
pub mod llm_client;
pub mod models;
pub mod pipeline;
pub mod retry;
pub mod routes;
pub mod search;
pub mod state;
pub mod stream;
