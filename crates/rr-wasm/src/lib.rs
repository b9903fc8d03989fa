//! WebAssembly bindings for Reroute

mod engine;

use std::cell::RefCell;
use std::sync::Once;

use log::LevelFilter;
use serde::Serialize;
use wasm_bindgen::prelude::*;

use rr_compiler::{compile, Directive};
use rr_core::{parse_rules, test_url as match_url, MatchResult, RuleEdit, StoreError};

use crate::engine::EngineState;

thread_local! {
    static ENGINE: RefCell<EngineState> = RefCell::new(EngineState::default());
}

static LOGGER: Once = Once::new();

fn with_engine<T>(f: impl FnOnce(&mut EngineState) -> T) -> T {
    ENGINE.with(|engine| f(&mut engine.borrow_mut()))
}

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    let text = serde_json::to_string(value)
        .map_err(|e| JsValue::from_str(&format!("Failed to serialize: {}", e)))?;
    js_sys::JSON::parse(&text)
}

fn store_err(e: StoreError) -> JsValue {
    JsValue::from_str(&e.to_string())
}

fn match_result_js(result: &MatchResult) -> JsValue {
    let js_result = js_sys::Object::new();
    let _ = js_sys::Reflect::set(&js_result, &"matched".into(), &JsValue::from(result.matched));
    if let Some(redirect_url) = &result.redirect_url {
        let _ = js_sys::Reflect::set(&js_result, &"redirectUrl".into(), &JsValue::from_str(redirect_url));
    }
    if let Some(captured) = &result.captured_text {
        let _ = js_sys::Reflect::set(&js_result, &"capturedText".into(), &JsValue::from_str(captured));
    }
    js_result.into()
}

/// Route `log` records to the browser console. Later calls only change the
/// level.
#[wasm_bindgen]
pub fn init_logging(debug: bool) {
    LOGGER.call_once(|| wasm_logger::init(wasm_logger::Config::new(log::Level::Debug)));
    log::set_max_level(if debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    });
}

// =============================================================================
// Stateless helpers
// =============================================================================

/// Live "test this URL" feedback for the rule editor.
#[wasm_bindgen]
pub fn test_url(from_url: &str, to_url: &str, candidate: &str) -> JsValue {
    match_result_js(&match_url(from_url, to_url, candidate))
}

/// Compile a rule file into native rules without touching engine state.
#[wasm_bindgen]
pub fn compile_rules(rules_json: &str) -> Result<JsValue, JsValue> {
    let rules = parse_rules(rules_json).map_err(|e| JsValue::from_str(&e.to_string()))?;
    let native: Vec<_> = compile(&rules).iter().map(Directive::to_native).collect();
    to_js(&native)
}

// =============================================================================
// Rule book
// =============================================================================

#[wasm_bindgen]
pub fn load_state(state_json: &str) -> Result<(), JsValue> {
    with_engine(|engine| engine.load(state_json))
        .map_err(|e| JsValue::from_str(&format!("Failed to load state: {}", e)))
}

#[wasm_bindgen]
pub fn get_state() -> Result<JsValue, JsValue> {
    let state = with_engine(|engine| engine.state());
    to_js(&state)
}

#[wasm_bindgen]
pub fn generation() -> f64 {
    with_engine(|engine| engine.book.generation() as f64)
}

#[wasm_bindgen]
pub fn import_rules(text: &str) -> Result<u32, JsValue> {
    with_engine(|engine| engine.import(text))
        .map(|count| count as u32)
        .map_err(|e| JsValue::from_str(&format!("Import failed: {}", e)))
}

#[wasm_bindgen]
pub fn export_rules() -> Result<String, JsValue> {
    with_engine(|engine| rr_core::export_rules(engine.book.rules()))
        .map_err(|e| JsValue::from_str(&format!("Export failed: {}", e)))
}

#[wasm_bindgen]
pub fn add_rule(from_url: &str, to_url: &str, name: &str, section: &str) -> u32 {
    let rule = rr_core::Rule::new(from_url, to_url)
        .with_name(name)
        .in_section(section);
    with_engine(|engine| engine.book.add_rule(rule) as u32)
}

/// Apply a partial edit; `edit` may hold fromUrl, toUrl, name, section and
/// disabled.
#[wasm_bindgen]
pub fn update_rule(index: u32, edit: JsValue) -> Result<(), JsValue> {
    let get_str = |key: &str| {
        js_sys::Reflect::get(&edit, &key.into())
            .ok()
            .and_then(|value| value.as_string())
    };
    let rule_edit = RuleEdit {
        from_url: get_str("fromUrl"),
        to_url: get_str("toUrl"),
        name: get_str("name"),
        section: get_str("section"),
        disabled: js_sys::Reflect::get(&edit, &"disabled".into())
            .ok()
            .and_then(|value| value.as_bool()),
    };
    with_engine(|engine| engine.book.update_rule(index as usize, rule_edit)).map_err(store_err)
}

#[wasm_bindgen]
pub fn remove_rule(index: u32) -> Result<(), JsValue> {
    with_engine(|engine| engine.book.remove_rule(index as usize))
        .map(|_| ())
        .map_err(store_err)
}

#[wasm_bindgen]
pub fn is_rule_active(index: u32) -> bool {
    with_engine(|engine| {
        engine
            .book
            .rule(index as usize)
            .is_some_and(|rule| engine.book.is_rule_active(rule))
    })
}

#[wasm_bindgen]
pub fn add_section(name: &str) -> Result<(), JsValue> {
    with_engine(|engine| engine.book.add_section(name)).map_err(store_err)
}

#[wasm_bindgen]
pub fn rename_section(old_name: &str, new_name: &str) -> Result<(), JsValue> {
    with_engine(|engine| engine.book.rename_section(old_name, new_name)).map_err(store_err)
}

#[wasm_bindgen]
pub fn remove_section(name: &str) -> Result<u32, JsValue> {
    with_engine(|engine| engine.book.remove_section(name))
        .map(|removed| removed as u32)
        .map_err(store_err)
}

#[wasm_bindgen]
pub fn set_section_enabled(name: &str, enabled: bool) -> Result<(), JsValue> {
    with_engine(|engine| engine.book.set_section_enabled(name, enabled)).map_err(store_err)
}

#[wasm_bindgen]
pub fn set_enabled(enabled: bool) {
    with_engine(|engine| engine.book.set_enabled(enabled));
}

// =============================================================================
// Installation
// =============================================================================

/// Ids returned by the browser's `getDynamicRules()` at startup.
#[wasm_bindgen]
pub fn adopt_installed_ids(ids: Vec<u32>) {
    with_engine(|engine| engine.adopt_installed(ids));
}

/// Build `{ generation, options }` where `options` is ready for
/// `updateDynamicRules`, or `null` when a newer generation is installed.
#[wasm_bindgen]
pub fn prepare_install() -> Result<JsValue, JsValue> {
    with_engine(|engine| {
        let Some(plan) = engine.prepare_install() else {
            return Ok(JsValue::NULL);
        };
        let js_result = js_sys::Object::new();
        let _ = js_sys::Reflect::set(&js_result, &"generation".into(), &JsValue::from(plan.generation as f64));
        let _ = js_sys::Reflect::set(&js_result, &"options".into(), &to_js(&plan)?);
        Ok(js_result.into())
    })
}

/// Report that `updateDynamicRules` resolved for `generation`.
#[wasm_bindgen]
pub fn commit_install(generation: f64) -> bool {
    with_engine(|engine| engine.commit_install(generation as u64).is_some())
}

/// Report that `updateDynamicRules` rejected the plan for `generation`.
#[wasm_bindgen]
pub fn abandon_install(generation: f64) -> bool {
    with_engine(|engine| engine.abandon_install(generation as u64))
}

// =============================================================================
// Debug panel
// =============================================================================

/// Match a navigated URL and record it in the redirect history.
#[wasm_bindgen]
pub fn observe_request(url: &str, timestamp_ms: f64) -> JsValue {
    match with_engine(|engine| engine.observe(url, timestamp_ms as u64)) {
        Some(result) => match_result_js(&result),
        None => match_result_js(&MatchResult::no_match()),
    }
}

#[wasm_bindgen]
pub fn get_history() -> Result<JsValue, JsValue> {
    let entries: Vec<_> = with_engine(|engine| engine.history.entries().rev().cloned().collect());
    to_js(&entries)
}

#[wasm_bindgen]
pub fn redirect_count() -> f64 {
    with_engine(|engine| engine.history.total_redirects() as f64)
}

#[wasm_bindgen]
pub fn clear_history() {
    with_engine(|engine| engine.history.clear());
}
