pub mod gate;
pub mod interceptor;

pub use gate::{GateDecision, LanguageGate, PassReason};
pub use interceptor::{translate_responses, TranslationLayer, MAX_BODY_BYTES};
