//! LLM executor and retry state machine (spec §4.6).
//!
//! This module holds the parts of the executor that are pure data
//! transformations: prompt assembly, response coercion, and decision-scene
//! matching. The orchestration that ties these to scope lookups, the
//! provider, and the `llm_fallback` control flow lives in `Interpreter`
//! (§4.5/§4.6 name this split "Evaluator ... dispatches LLM calls through
//! the LLM executor").

use std::collections::HashMap;

use crate::ast::expr::Scene;
use crate::diagnostics::Code;
use crate::interp::value::Value;
use crate::interp::RuntimeError;
use crate::provider::{CallKind, LastCallInfo};
use crate::token::Span;

/// Bounded retry count per construct (§4.6: "default 5").
pub const DEFAULT_RETRY_LIMIT: u32 = 5;

/// Target runtime type a coerced LLM response should take, mirroring the
/// declared type of the assignment / parameter / function return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoerceTarget {
    Str,
    Int,
    Float,
    Bool,
    List,
    Dict,
}

/// Result of matching a raw response against the decision map for a
/// `BRANCH`/`LOOP` scene.
#[derive(Debug, Clone, PartialEq)]
pub enum DecisionOutcome {
    Decided(char),
    Uncertain(String),
}

fn default_decision_map() -> HashMap<String, char> {
    let mut map = HashMap::new();
    for word in ["1", "true", "yes", "ok"] {
        map.insert(word.to_string(), '1');
    }
    for word in ["0", "false", "no", "fail"] {
        map.insert(word.to_string(), '0');
    }
    map
}

fn default_system_prompt(scene: Scene) -> &'static str {
    match scene {
        Scene::General => "Answer the following request concisely.",
        Scene::Branch => "Answer with exactly one word: yes or no.",
        Scene::Loop => "Answer with exactly one word: yes or no, to decide whether to continue.",
    }
}

/// Owns the mutable executor-local state: the decision map (replaceable,
/// per the "replace, not extend" decision recorded for an ambiguous
/// override behavior in the source), the single-slot retry-hint mailbox,
/// and the most recent provider exchange.
pub struct LlmExecutor {
    decision_map: HashMap<String, char>,
    retry_hint: Option<String>,
    last_call: Option<LastCallInfo>,
}

impl Default for LlmExecutor {
    fn default() -> Self {
        LlmExecutor {
            decision_map: default_decision_map(),
            retry_hint: None,
            last_call: None,
        }
    }
}

impl LlmExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the decision map wholesale (not merged).
    pub fn set_decision_map(&mut self, map: HashMap<String, char>) {
        self.decision_map = map;
    }

    pub fn set_retry_hint(&mut self, hint: String) {
        self.retry_hint = Some(hint);
    }

    /// Consumed by the very next provider call, then cleared.
    pub fn take_retry_hint(&mut self) -> Option<String> {
        self.retry_hint.take()
    }

    pub fn record(&mut self, info: LastCallInfo) {
        self.last_call = Some(info);
    }

    pub fn last_call_info(&self) -> Option<&LastCallInfo> {
        self.last_call.as_ref()
    }

    /// Builds the system prompt for a behavior-expression call: base
    /// template, then bullet-line intents, then an optional declared-type
    /// constraint, then an optional retry notice (§4.6 steps 2-5).
    pub fn build_behavior_system_prompt(
        &self,
        scene: Scene,
        scene_template: Option<&str>,
        intents: &[String],
        local_intent: Option<&str>,
        declared_type_note: Option<&str>,
    ) -> String {
        let mut prompt = scene_template.unwrap_or_else(|| default_system_prompt(scene)).to_string();
        for intent in intents {
            prompt.push_str(&format!("\n- {}", intent));
        }
        if let Some(local) = local_intent {
            prompt.push_str(&format!("\n- {}", local));
        }
        if let Some(note) = declared_type_note {
            prompt.push_str(&format!("\nThe expected return type is {}.", note));
        }
        if let Some(hint) = &self.retry_hint {
            prompt.push_str(&format!("\n{}", retry_notice(hint)));
        }
        prompt
    }

    /// Builds the system prompt for a named LLM function: the body-derived
    /// template text, then intents, then an optional type-coercion
    /// instruction for a non-string declared return type (§4.6, second
    /// paragraph).
    pub fn build_function_system_prompt(
        &self,
        template_sys: &str,
        intents: &[String],
        return_coercion: Option<CoerceTarget>,
    ) -> String {
        let mut prompt = template_sys.to_string();
        for intent in intents {
            prompt.push_str(&format!("\n- {}", intent));
        }
        if let Some(target) = return_coercion {
            if target != CoerceTarget::Str {
                prompt.push_str(&format!("\n{}", type_coercion_instruction(target)));
            }
        }
        if let Some(hint) = &self.retry_hint {
            prompt.push_str(&format!("\n{}", retry_notice(hint)));
        }
        prompt
    }

    /// Records the exchange and clears the retry hint on success (§4.6
    /// step 5: "clear the hint on success").
    pub fn note_successful_call(&mut self, system: String, user: String, response: String, name: String, kind: CallKind) {
        self.retry_hint = None;
        self.record(LastCallInfo {
            system,
            user,
            response,
            name,
            kind,
        });
    }

    /// Matches a response against the decision map for a `BRANCH`/`LOOP`
    /// scene (§4.6, "Decision scenes").
    pub fn resolve_decision(&self, response: &str) -> DecisionOutcome {
        let normalized = response.trim().to_lowercase();
        match self.decision_map.get(normalized.as_str()) {
            Some(ch) => DecisionOutcome::Decided(*ch),
            None => DecisionOutcome::Uncertain(response.to_string()),
        }
    }
}

fn retry_notice(hint: &str) -> String {
    format!("The previous attempt was unclear. {}", hint)
}

fn type_coercion_instruction(target: CoerceTarget) -> String {
    match target {
        CoerceTarget::Str => String::new(),
        CoerceTarget::Int => "Respond with a single integer and nothing else.".to_string(),
        CoerceTarget::Float => "Respond with a single floating-point number and nothing else.".to_string(),
        CoerceTarget::Bool => "Respond with true or false and nothing else.".to_string(),
        CoerceTarget::List => "Respond with a single JSON array and nothing else.".to_string(),
        CoerceTarget::Dict => "Respond with a single JSON object and nothing else.".to_string(),
    }
}

/// Coerces a raw provider response into a runtime value per the rules
/// enumerated in §4.6. `'a` is unconstrained here since coercion never
/// produces a `Function`/`Class`/`Instance` value.
pub fn coerce_response<'a>(response: &str, target: CoerceTarget, span: Span) -> Result<Value<'a>, RuntimeError> {
    let llm_error = |message: String| RuntimeError {
        code: Code::RUN_LLM_ERROR,
        message,
        span,
    };
    match target {
        CoerceTarget::Str => Ok(Value::Str(std::rc::Rc::new(response.to_string()))),
        CoerceTarget::Int => first_int_substring(response)
            .map(Value::Int)
            .ok_or_else(|| llm_error(format!("could not parse an integer from response: {:?}", response))),
        CoerceTarget::Float => first_float_substring(response)
            .map(Value::Float)
            .ok_or_else(|| llm_error(format!("could not parse a float from response: {:?}", response))),
        CoerceTarget::Bool => Ok(Value::Bool(coerce_bool(response))),
        CoerceTarget::List => {
            let slice = first_balanced(response, '[', ']')
                .ok_or_else(|| llm_error("no balanced [...] substring in response".to_string()))?;
            let json: serde_json::Value = serde_json::from_str(strip_code_fence(slice))
                .map_err(|e| llm_error(format!("invalid JSON list: {}", e)))?;
            json_to_value(&json).ok_or_else(|| llm_error("JSON value was not a list".to_string()))
        }
        CoerceTarget::Dict => {
            let slice = first_balanced(response, '{', '}')
                .ok_or_else(|| llm_error("no balanced {...} substring in response".to_string()))?;
            let json: serde_json::Value = serde_json::from_str(strip_code_fence(slice))
                .map_err(|e| llm_error(format!("invalid JSON object: {}", e)))?;
            json_to_value(&json).ok_or_else(|| llm_error("JSON value was not an object".to_string()))
        }
    }
}

fn coerce_bool(response: &str) -> bool {
    let normalized = response.trim().to_lowercase();
    if ["true", "1", "yes", "ok"].contains(&normalized.as_str()) {
        return true;
    }
    if ["false", "0", "no", "fail"].contains(&normalized.as_str()) {
        return false;
    }
    !normalized.is_empty()
}

fn first_int_substring(s: &str) -> Option<i64> {
    let bytes: Vec<char> = s.chars().collect();
    let mut i = 0;
    while i < bytes.len() {
        let start_neg = bytes[i] == '-' && i + 1 < bytes.len() && bytes[i + 1].is_ascii_digit();
        if bytes[i].is_ascii_digit() || start_neg {
            let start = i;
            if start_neg {
                i += 1;
            }
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            let candidate: String = bytes[start..i].iter().collect();
            if let Ok(n) = candidate.parse::<i64>() {
                return Some(n);
            }
        } else {
            i += 1;
        }
    }
    None
}

fn first_float_substring(s: &str) -> Option<f64> {
    let bytes: Vec<char> = s.chars().collect();
    let mut i = 0;
    while i < bytes.len() {
        let start_neg = bytes[i] == '-' && i + 1 < bytes.len() && (bytes[i + 1].is_ascii_digit() || bytes[i + 1] == '.');
        if bytes[i].is_ascii_digit() || bytes[i] == '.' || start_neg {
            let start = i;
            if start_neg {
                i += 1;
            }
            let mut seen_dot = false;
            while i < bytes.len() && (bytes[i].is_ascii_digit() || (bytes[i] == '.' && !seen_dot)) {
                if bytes[i] == '.' {
                    seen_dot = true;
                }
                i += 1;
            }
            let candidate: String = bytes[start..i].iter().collect();
            if let Ok(n) = candidate.parse::<f64>() {
                return Some(n);
            }
        } else {
            i += 1;
        }
    }
    None
}

fn strip_code_fence(s: &str) -> &str {
    s.trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

fn first_balanced(s: &str, open: char, close: char) -> Option<&str> {
    let bytes: Vec<(usize, char)> = s.char_indices().collect();
    let start_idx = bytes.iter().position(|(_, c)| *c == open)?;
    let mut depth = 0i32;
    for &(byte_pos, c) in &bytes[start_idx..] {
        if c == open {
            depth += 1;
        } else if c == close {
            depth -= 1;
            if depth == 0 {
                let end = byte_pos + c.len_utf8();
                return Some(&s[bytes[start_idx].0..end]);
            }
        }
    }
    None
}

fn json_to_value<'a>(json: &serde_json::Value) -> Option<Value<'a>> {
    match json {
        serde_json::Value::Array(items) => {
            let values: Option<Vec<Value<'a>>> = items.iter().map(json_to_value).collect();
            Some(Value::List(std::rc::Rc::new(std::cell::RefCell::new(values?))))
        }
        serde_json::Value::Object(map) => {
            let mut out = indexmap::IndexMap::new();
            for (k, v) in map {
                out.insert(k.clone(), json_to_value(v)?);
            }
            Some(Value::Dict(std::rc::Rc::new(std::cell::RefCell::new(out))))
        }
        serde_json::Value::String(s) => Some(Value::Str(std::rc::Rc::new(s.clone()))),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(Value::Int(i))
            } else {
                n.as_f64().map(Value::Float)
            }
        }
        serde_json::Value::Bool(b) => Some(Value::Bool(*b)),
        serde_json::Value::Null => Some(Value::None_),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span() -> Span {
        Span::new(1, 1, 1)
    }

    #[test]
    fn resolve_decision_matches_default_map() {
        let exec = LlmExecutor::new();
        assert_eq!(exec.resolve_decision("yes"), DecisionOutcome::Decided('1'));
        assert_eq!(exec.resolve_decision("Fail"), DecisionOutcome::Decided('0'));
        assert_eq!(
            exec.resolve_decision("maybe"),
            DecisionOutcome::Uncertain("maybe".to_string())
        );
    }

    #[test]
    fn retry_hint_consumed_once() {
        let mut exec = LlmExecutor::new();
        exec.set_retry_hint("be more specific".to_string());
        assert_eq!(exec.take_retry_hint(), Some("be more specific".to_string()));
        assert_eq!(exec.take_retry_hint(), None);
    }

    #[test]
    fn system_prompt_appends_intents_and_type_note() {
        let exec = LlmExecutor::new();
        let prompt = exec.build_behavior_system_prompt(
            Scene::General,
            None,
            &["always answer in English".to_string()],
            Some("be brief"),
            Some("int"),
        );
        assert!(prompt.contains("always answer in English"));
        assert!(prompt.contains("be brief"));
        assert!(prompt.contains("expected return type is int"));
    }

    #[test]
    fn coerce_int_extracts_first_signed_integer() {
        let v = coerce_response("the answer is -42 maybe", CoerceTarget::Int, span()).unwrap();
        assert!(matches!(v, Value::Int(-42)));
    }

    #[test]
    fn coerce_float_extracts_first_float() {
        let v = coerce_response("about 3.14 give or take", CoerceTarget::Float, span()).unwrap();
        assert!(matches!(v, Value::Float(f) if (f - 3.14).abs() < 1e-9));
    }

    #[test]
    fn coerce_list_strips_code_fence_and_parses_json() {
        let v = coerce_response("```json\n[1, 2, 3]\n```", CoerceTarget::List, span()).unwrap();
        let Value::List(items) = v else { panic!("expected list") };
        assert_eq!(items.borrow().len(), 3);
    }

    #[test]
    fn coerce_dict_parses_balanced_object() {
        let v = coerce_response("here: {\"a\": 1} trailing", CoerceTarget::Dict, span()).unwrap();
        let Value::Dict(map) = v else { panic!("expected dict") };
        assert!(matches!(map.borrow().get("a"), Some(Value::Int(1))));
    }

    #[test]
    fn coerce_list_failure_is_llm_error() {
        let err = coerce_response("no brackets here", CoerceTarget::List, span()).unwrap_err();
        assert_eq!(err.code, Code::RUN_LLM_ERROR);
    }
}
