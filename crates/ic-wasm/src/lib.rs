//! WebAssembly bindings for Intercept
//!
//! The options page hands profiles over as JSON text and gets plain JS
//! objects back. Nothing here touches the live rule store.

use ic_compiler::{compile_with_stats, export_profiles, parse_import, RuleIdAllocator};
use ic_core::{
    classify, simulate, validate, CompileOptions, PatternKind, Profile, ProfileSet,
    rule::EXCLUDED_DOMAINS,
    url::{extract_host, is_excluded_host},
};
use serde::Serialize;
use wasm_bindgen::prelude::*;

#[wasm_bindgen]
pub fn compile_profile(
    profile_json: &str,
    options_json: Option<String>,
    seed: Option<i32>,
) -> Result<JsValue, JsValue> {
    let profile = parse_profile(profile_json).map_err(|e| JsValue::from_str(&e))?;
    let options = parse_options(options_json.as_deref()).map_err(|e| JsValue::from_str(&e))?;

    let mut ids = seed.map_or_else(RuleIdAllocator::from_clock, RuleIdAllocator::starting_at);
    let (rules, stats) = compile_with_stats(&profile, &options, &mut ids);

    if stats.skipped_items > 0 {
        web_sys::console::warn_1(&JsValue::from_str(&format!(
            "{} enabled items skipped: a required field is empty",
            stats.skipped_items
        )));
    }

    let js_result = js_sys::Object::new();
    let _ = js_sys::Reflect::set(&js_result, &"rules".into(), &to_js(&rules)?);

    let js_stats = js_sys::Object::new();
    let _ = js_sys::Reflect::set(&js_stats, &"total".into(), &JsValue::from(stats.total() as u32));
    let _ = js_sys::Reflect::set(&js_stats, &"requestHeaders".into(), &JsValue::from(stats.request_header_rules as u32));
    let _ = js_sys::Reflect::set(&js_stats, &"responseHeaders".into(), &JsValue::from(stats.response_header_rules as u32));
    let _ = js_sys::Reflect::set(&js_stats, &"redirects".into(), &JsValue::from(stats.redirect_rules as u32));
    let _ = js_sys::Reflect::set(&js_stats, &"blocks".into(), &JsValue::from(stats.block_rules as u32));
    let _ = js_sys::Reflect::set(&js_stats, &"scopePatterns".into(), &JsValue::from(stats.scope_patterns as u32));
    let _ = js_sys::Reflect::set(&js_stats, &"skipped".into(), &JsValue::from(stats.skipped_items as u32));
    let _ = js_sys::Reflect::set(&js_result, &"stats".into(), &js_stats);

    Ok(js_result.into())
}

#[wasm_bindgen]
pub fn validate_profile(profile_json: &str) -> Result<JsValue, JsValue> {
    let profile = parse_profile(profile_json).map_err(|e| JsValue::from_str(&e))?;
    to_js(&validate(&profile))
}

#[wasm_bindgen]
pub fn simulate_url(profile_json: &str, url: &str, options_json: Option<String>) -> Result<JsValue, JsValue> {
    let profile = parse_profile(profile_json).map_err(|e| JsValue::from_str(&e))?;
    let options = parse_options(options_json.as_deref()).map_err(|e| JsValue::from_str(&e))?;
    to_js(&simulate(&profile, url, &options))
}

#[wasm_bindgen]
pub fn classify_pattern(pattern: &str) -> String {
    kind_name(classify(pattern)).to_string()
}

#[wasm_bindgen]
pub fn import_profiles(text: &str) -> Result<JsValue, JsValue> {
    let set = parse_import(text).map_err(|e| JsValue::from_str(&e.to_string()))?;
    to_js(&set)
}

#[wasm_bindgen]
pub fn export_profile_set(set_json: &str) -> Result<String, JsValue> {
    let set: ProfileSet = serde_json::from_str(set_json)
        .map_err(|e| JsValue::from_str(&format!("Invalid profile set: {e}")))?;
    export_profiles(&set).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Whether requests to this URL bypass every compiled rule.
#[wasm_bindgen]
pub fn is_excluded_url(url: &str) -> bool {
    extract_host(url).is_some_and(|host| is_excluded_host(host, &EXCLUDED_DOMAINS[..]))
}

fn parse_profile(json: &str) -> Result<Profile, String> {
    serde_json::from_str(json).map_err(|e| format!("Invalid profile: {e}"))
}

fn parse_options(json: Option<&str>) -> Result<CompileOptions, String> {
    match json {
        Some(text) if !text.trim().is_empty() => {
            serde_json::from_str(text).map_err(|e| format!("Invalid compile options: {e}"))
        }
        _ => Ok(CompileOptions::default()),
    }
}

fn kind_name(kind: PatternKind) -> &'static str {
    match kind {
        PatternKind::Literal => "literal",
        PatternKind::Regex => "regex",
    }
}

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    let text = serde_json::to_string(value).map_err(|e| JsValue::from_str(&e.to_string()))?;
    js_sys::JSON::parse(&text)
}
