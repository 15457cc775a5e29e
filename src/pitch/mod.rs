//! Pitch generation: persona handling and LLM-drafted replies.

pub mod generator;
pub mod persona;

pub use generator::{GeneratorConfig, PitchGenerator, truncate_text};
pub use persona::{Persona, PersonaDraft};
