//! FFI bindings for Eisen Layout
//!
//! This module provides C-compatible functions for calling the engine from the
//! mobile clients. All functions use C strings (null-terminated) and return
//! allocated memory that must be freed by the caller using `eisen_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::bias::{BiasLearnerConfig, InMemoryBiasStore, PreferenceBiasLearner};
use crate::error::LayoutError;
use crate::normalizer::LayoutOptions;
use crate::pipeline::{normalize_tasks_json, normalize_tasks_json_with};
use crate::types::PlacementObservation;

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

/// Map a JSON-producing result onto the C convention: string or NULL + last error
fn result_to_cstr(result: Result<String, LayoutError>) -> *mut c_char {
    match result {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Stateless API
// ============================================================================

/// Normalize a JSON array of task records with default options.
///
/// # Safety
/// - `tasks_json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `eisen_free_string`.
/// - Returns NULL on error; call `eisen_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn eisen_normalize_json(tasks_json: *const c_char) -> *mut c_char {
    clear_last_error();

    let json_str = match cstr_to_string(tasks_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid tasks JSON string pointer");
            return ptr::null_mut();
        }
    };

    result_to_cstr(normalize_tasks_json(json_str))
}

/// Normalize a JSON array of task records with options given as JSON.
///
/// # Safety
/// - `tasks_json` and `options_json` must be valid null-terminated C strings.
/// - Returns a newly allocated string that must be freed with `eisen_free_string`.
/// - Returns NULL on error; call `eisen_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn eisen_normalize_json_with_options(
    tasks_json: *const c_char,
    options_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    let json_str = match cstr_to_string(tasks_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid tasks JSON string pointer");
            return ptr::null_mut();
        }
    };

    let options_str = match cstr_to_string(options_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid options JSON string pointer");
            return ptr::null_mut();
        }
    };

    let options = match LayoutOptions::from_json(&options_str) {
        Ok(o) => o,
        Err(e) => {
            set_last_error(&e.to_string());
            return ptr::null_mut();
        }
    };

    result_to_cstr(normalize_tasks_json_with(json_str, &options))
}

// ============================================================================
// Stateful Bias Learner API
// ============================================================================

/// Opaque handle to an in-memory bias learner
pub struct EisenLearnerHandle {
    learner: PreferenceBiasLearner<InMemoryBiasStore>,
}

/// Create a new bias learner.
///
/// A `decay` that is not finite or not strictly between 0 and 1 selects the
/// default of 0.7.
///
/// # Safety
/// - Returns a pointer to a newly allocated learner.
/// - Must be freed with `eisen_learner_free`.
/// - Returns NULL on error; call `eisen_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn eisen_learner_new(decay: f64) -> *mut EisenLearnerHandle {
    clear_last_error();

    let mut config = BiasLearnerConfig::default();
    if decay.is_finite() && decay > 0.0 && decay < 1.0 {
        config.decay = decay;
    }

    match PreferenceBiasLearner::with_config(InMemoryBiasStore::new(), config) {
        Ok(learner) => Box::into_raw(Box::new(EisenLearnerHandle { learner })),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Free a bias learner.
///
/// # Safety
/// - `learner` must be a valid pointer returned by `eisen_learner_new`.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn eisen_learner_free(learner: *mut EisenLearnerHandle) {
    if !learner.is_null() {
        drop(Box::from_raw(learner));
    }
}

/// Record a JSON array of placement observations for a user.
///
/// Observations under the noise threshold are dropped. Returns the updated
/// bias as JSON, or the JSON literal `null` when nothing was recorded.
///
/// # Safety
/// - `learner` must be a valid pointer returned by `eisen_learner_new`.
/// - `user_id` and `observations_json` must be valid null-terminated C strings.
/// - Returns a newly allocated string that must be freed with `eisen_free_string`.
/// - Returns NULL on error; call `eisen_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn eisen_learner_record_json(
    learner: *mut EisenLearnerHandle,
    user_id: *const c_char,
    observations_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if learner.is_null() {
        set_last_error("Null learner pointer");
        return ptr::null_mut();
    }

    let handle = &*learner;

    let user_str = match cstr_to_string(user_id) {
        Some(s) => s,
        None => {
            set_last_error("Invalid user_id string pointer");
            return ptr::null_mut();
        }
    };

    let obs_str = match cstr_to_string(observations_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid observations JSON string pointer");
            return ptr::null_mut();
        }
    };

    let result = serde_json::from_str::<Vec<PlacementObservation>>(&obs_str)
        .map_err(LayoutError::from)
        .and_then(|observations| handle.learner.record_observations(&user_str, &observations))
        .and_then(|bias| serde_json::to_string(&bias).map_err(LayoutError::from));

    result_to_cstr(result)
}

/// Get a user's current bias as JSON (`null` when unknown).
///
/// # Safety
/// - `learner` must be a valid pointer returned by `eisen_learner_new`.
/// - `user_id` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `eisen_free_string`.
/// - Returns NULL on error; call `eisen_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn eisen_learner_bias_json(
    learner: *mut EisenLearnerHandle,
    user_id: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if learner.is_null() {
        set_last_error("Null learner pointer");
        return ptr::null_mut();
    }

    let handle = &*learner;

    let user_str = match cstr_to_string(user_id) {
        Some(s) => s,
        None => {
            set_last_error("Invalid user_id string pointer");
            return ptr::null_mut();
        }
    };

    let result = handle
        .learner
        .current_bias(&user_str)
        .and_then(|bias| serde_json::to_string(&bias).map_err(LayoutError::from));

    result_to_cstr(result)
}

/// Save all learned biases to JSON.
///
/// # Safety
/// - `learner` must be a valid pointer returned by `eisen_learner_new`.
/// - Returns a newly allocated string that must be freed with `eisen_free_string`.
/// - Returns NULL on error; call `eisen_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn eisen_learner_save_json(learner: *mut EisenLearnerHandle) -> *mut c_char {
    clear_last_error();

    if learner.is_null() {
        set_last_error("Null learner pointer");
        return ptr::null_mut();
    }

    let handle = &*learner;
    result_to_cstr(handle.learner.store().to_json())
}

/// Replace the learner's biases with a previously saved JSON snapshot.
///
/// # Safety
/// - `learner` must be a valid pointer returned by `eisen_learner_new`.
/// - `json` must be a valid null-terminated C string.
/// - Returns 0 on success, non-zero on error.
/// - On error, call `eisen_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn eisen_learner_load_json(
    learner: *mut EisenLearnerHandle,
    json: *const c_char,
) -> i32 {
    clear_last_error();

    if learner.is_null() {
        set_last_error("Null learner pointer");
        return -1;
    }

    let handle = &mut *learner;

    let json_str = match cstr_to_string(json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid JSON string pointer");
            return -1;
        }
    };

    match InMemoryBiasStore::from_json(&json_str) {
        Ok(store) => {
            let config = handle.learner.config().clone();
            match PreferenceBiasLearner::with_config(store, config) {
                Ok(learner) => {
                    handle.learner = learner;
                    0
                }
                Err(e) => {
                    set_last_error(&e.to_string());
                    -1
                }
            }
        }
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by Eisen functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by an Eisen function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn eisen_free_string(ptr: *mut c_char) {
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
/// - The returned pointer is valid until the next Eisen function call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn eisen_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn eisen_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}
