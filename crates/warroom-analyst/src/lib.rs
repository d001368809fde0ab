//! Strategy synthesis: turns detected price changes into a structured market
//! analysis using an OpenAI-compatible inference service.

pub mod client;
pub mod error;
pub mod groq;
pub mod prompt;
mod retry;
pub mod schema;
pub mod synthesizer;

pub use client::{ChatMessage, InferenceClient, Role};
pub use error::{InferenceError, SchemaError};
pub use groq::{GroqClient, InferenceSettings};
pub use schema::{extract_json_object, parse_analysis, ParsedAnalysis, RawAnalysis};
pub use synthesizer::{Synthesizer, SynthesizerSettings};
