//! FFI bindings for Epiform
//!
//! This module provides C-compatible functions so a host-language modelling
//! front end can call Epiform. All functions use C strings (null-terminated)
//! and return allocated memory that must be freed by the caller using
//! `epiform_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::config::ParseConfig;
use crate::error::TermError;
use crate::formula::Formula;
use crate::pipeline::{formula_to_backend_json, TermProcessor};

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Set the last error message
fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

/// Clear the last error message
fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Helper to convert C string to Rust string
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

/// Hand a result to C: the string on success, NULL plus last error otherwise
fn into_cstr(result: Result<String, TermError>) -> *mut c_char {
    match result {
        Ok(s) => string_to_cstr(&s),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Stateless API
// ============================================================================

/// Parse the random walk terms of a formula against a JSON dataset.
///
/// # Safety
/// - `formula` and `dataset_json` must be valid null-terminated C strings.
/// - Returns a newly allocated payload JSON string that must be freed with `epiform_free_string`.
/// - Returns NULL on error; call `epiform_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn epiform_parse_terms(
    formula: *const c_char,
    dataset_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    let formula_str = match cstr_to_string(formula) {
        Some(s) => s,
        None => {
            set_last_error("Invalid formula string pointer");
            return ptr::null_mut();
        }
    };

    let dataset_str = match cstr_to_string(dataset_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid dataset string pointer");
            return ptr::null_mut();
        }
    };

    into_cstr(formula_to_backend_json(formula_str, dataset_str))
}

/// Detect the random walk terms of a formula.
///
/// # Safety
/// - `formula` must be a valid null-terminated C string.
/// - Returns a newly allocated JSON array of labels that must be freed with `epiform_free_string`.
/// - Returns NULL on error; call `epiform_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn epiform_detect_terms(formula: *const c_char) -> *mut c_char {
    clear_last_error();

    let formula_str = match cstr_to_string(formula) {
        Some(s) => s,
        None => {
            set_last_error("Invalid formula string pointer");
            return ptr::null_mut();
        }
    };

    into_cstr(
        TermProcessor::new()
            .detect(&formula_str)
            .and_then(|labels| Ok(serde_json::to_string(&labels)?)),
    )
}

/// Remove the random walk terms from a formula.
///
/// # Safety
/// - `formula` must be a valid null-terminated C string.
/// - Returns a newly allocated formula string that must be freed with `epiform_free_string`.
/// - Returns NULL on error; call `epiform_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn epiform_strip_random_walks(formula: *const c_char) -> *mut c_char {
    clear_last_error();

    let formula_str = match cstr_to_string(formula) {
        Some(s) => s,
        None => {
            set_last_error("Invalid formula string pointer");
            return ptr::null_mut();
        }
    };

    into_cstr(Formula::parse(&formula_str).map(|f| f.without_random_walks().to_string()))
}

// ============================================================================
// Configured Processor API
// ============================================================================

/// Opaque handle to a TermProcessor
pub struct TermProcessorHandle {
    processor: TermProcessor,
}

/// Create a new TermProcessor.
///
/// # Safety
/// - `config_json` must be NULL (defaults) or a valid null-terminated C string
///   holding a ParseConfig JSON object.
/// - Returns a pointer that must be freed with `epiform_processor_free`.
/// - Returns NULL on error; call `epiform_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn epiform_processor_new(
    config_json: *const c_char,
) -> *mut TermProcessorHandle {
    clear_last_error();

    let config = if config_json.is_null() {
        ParseConfig::default()
    } else {
        let json = match cstr_to_string(config_json) {
            Some(s) => s,
            None => {
                set_last_error("Invalid config string pointer");
                return ptr::null_mut();
            }
        };
        match ParseConfig::from_json(&json) {
            Ok(config) => config,
            Err(e) => {
                set_last_error(&e.to_string());
                return ptr::null_mut();
            }
        }
    };

    let handle = Box::new(TermProcessorHandle {
        processor: TermProcessor::with_config(config),
    });
    Box::into_raw(handle)
}

/// Free a TermProcessor.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `epiform_processor_new`.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn epiform_processor_free(processor: *mut TermProcessorHandle) {
    if !processor.is_null() {
        drop(Box::from_raw(processor));
    }
}

/// Parse terms with a configured processor.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `epiform_processor_new`.
/// - `formula` and `dataset_json` must be valid null-terminated C strings.
/// - Returns a newly allocated payload JSON string that must be freed with `epiform_free_string`.
/// - Returns NULL on error; call `epiform_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn epiform_processor_parse_terms(
    processor: *const TermProcessorHandle,
    formula: *const c_char,
    dataset_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return ptr::null_mut();
    }

    let handle = &*processor;

    let formula_str = match cstr_to_string(formula) {
        Some(s) => s,
        None => {
            set_last_error("Invalid formula string pointer");
            return ptr::null_mut();
        }
    };

    let dataset_str = match cstr_to_string(dataset_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid dataset string pointer");
            return ptr::null_mut();
        }
    };

    into_cstr(handle.processor.process_json(&formula_str, &dataset_str))
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by Epiform functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by an Epiform function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn epiform_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next Epiform function call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn epiform_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the Epiform library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn epiform_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}
