//! The model-call layer.
//!
//! ## Data Flow
//!
//! ```text
//! stage templates + PDF ──▶ model::generate ──▶ GenerativeModel ──▶ JSON value
//!                            (policies)          (gemini / stub)
//! ```
//!
//! 1. [`model`]  — provider-neutral request/response types, the fixed
//!    generation and safety policies, and the [`model::GenerativeModel`] seam
//! 2. [`gemini`] — REST client for Gemini (API key) and Vertex AI (project)

pub mod gemini;
pub mod model;
