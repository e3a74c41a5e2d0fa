//! Internal control-flow signals (spec §3, §4.5), never surfaced to user
//! `try`/`except` except via `RuntimeError::Raised`.

use crate::interp::value::Value;

pub enum Signal<'a> {
    Return(Value<'a>),
    Break,
    Continue,
    /// Only legal when caught by the `llm_fallback` retry wrapper (§4.6).
    Retry,
    /// Raised by the LLM executor's decision-scene matcher; caught only by
    /// the enclosing `If`/`While`/`For` fallback wrapper, never by user
    /// `try`/`except` (§4.6).
    Uncertainty(String),
    Raised(Value<'a>),
}
