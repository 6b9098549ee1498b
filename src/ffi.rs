// FFI bindings for C/C++/C#
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int};
use std::slice;

use crate::{extract, ExtractOptions, ExtractOutput};

/// C-compatible extraction result. `error` is null on success.
#[repr(C)]
pub struct CExtractResult {
    pub text: *mut c_char,
    pub page_count: usize,
    pub text_length: usize,
    pub error: *mut c_char,
}

/// Extract the text of an in-memory PDF
///
/// Returns 0 when extraction succeeded, 1 when it finished with an error
/// (the partial text and the message are still filled in) and a negative
/// value on invalid arguments.
///
/// # Safety
/// - pdf_data must point to pdf_len readable bytes
/// - result_out must be valid for writes; free it with hpo_free_result
#[no_mangle]
pub unsafe extern "C" fn hpo_extract(
    pdf_data: *const u8,
    pdf_len: usize,
    use_ocr: c_int,
    result_out: *mut CExtractResult,
) -> c_int {
    if pdf_data.is_null() || result_out.is_null() {
        return -1;
    }

    let data = slice::from_raw_parts(pdf_data, pdf_len);
    let options = ExtractOptions {
        use_enhanced_ocr: use_ocr != 0,
        ..ExtractOptions::default()
    };
    let output = extract(data, &options);
    let status = if output.error.is_some() { 1 } else { 0 };
    *result_out = output_to_c(&output);
    status
}

/// Extract with options given as JSON (`ExtractOptions`) and return the full
/// result as a JSON string, or null on invalid arguments.
///
/// # Safety
/// - pdf_data must point to pdf_len readable bytes
/// - options_json must be null or a valid null-terminated UTF-8 string
/// - the returned string must be freed with hpo_free_string
#[no_mangle]
pub unsafe extern "C" fn hpo_extract_json(
    pdf_data: *const u8,
    pdf_len: usize,
    options_json: *const c_char,
) -> *mut c_char {
    if pdf_data.is_null() {
        return std::ptr::null_mut();
    }

    let options: ExtractOptions = if options_json.is_null() {
        ExtractOptions::default()
    } else {
        let Ok(json) = CStr::from_ptr(options_json).to_str() else {
            return std::ptr::null_mut();
        };
        match serde_json::from_str(json) {
            Ok(o) => o,
            Err(_) => return std::ptr::null_mut(),
        }
    };

    let data = slice::from_raw_parts(pdf_data, pdf_len);
    let output = extract(data, &options);
    match serde_json::to_string(&output) {
        Ok(json) => to_c_string(&json),
        Err(_) => std::ptr::null_mut(),
    }
}

/// Free the strings inside a result filled by hpo_extract
///
/// # Safety
/// result must point to a CExtractResult filled by hpo_extract, freed once
#[no_mangle]
pub unsafe extern "C" fn hpo_free_result(result: *mut CExtractResult) {
    if result.is_null() {
        return;
    }
    let result = &mut *result;
    hpo_free_string(result.text);
    hpo_free_string(result.error);
    result.text = std::ptr::null_mut();
    result.error = std::ptr::null_mut();
}

/// Free a string returned by this library
///
/// # Safety
/// s must be null or a pointer returned by this library, freed once
#[no_mangle]
pub unsafe extern "C" fn hpo_free_string(s: *mut c_char) {
    if !s.is_null() {
        drop(CString::from_raw(s));
    }
}

/// Get library version
#[no_mangle]
pub extern "C" fn hpo_version() -> *const c_char {
    static VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "\0");
    VERSION.as_ptr() as *const c_char
}

fn output_to_c(output: &ExtractOutput) -> CExtractResult {
    CExtractResult {
        text: to_c_string(&output.text),
        page_count: output.page_count,
        text_length: output.text_length,
        error: match &output.error {
            Some(e) => to_c_string(&e.to_string()),
            None => std::ptr::null_mut(),
        },
    }
}

/// Interior NULs cannot cross the boundary; they are dropped.
fn to_c_string(s: &str) -> *mut c_char {
    let bytes: Vec<u8> = s.bytes().filter(|&b| b != 0).collect();
    match CString::new(bytes) {
        Ok(c) => c.into_raw(),
        Err(_) => std::ptr::null_mut(),
    }
}
