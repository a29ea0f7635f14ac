//! Fake libtcc backend shared by the integration tests
//!
//! Mirrors the observable behaviour of the real entry points closely enough
//! to drive the context state machine: it "compiles" by checking for a few
//! syntax errors, records every call, and resolves a handful of known
//! functions to Rust implementations after relocation.

#![allow(dead_code)]

use embedcc_runtime::ffi::bindings::{BindingTable, TCCErrorFunc, TCCState};
use embedcc_runtime::Context;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::ffi::{c_char, c_int, c_void, CStr, CString};

#[derive(Default)]
struct FakeState {
    output_type: c_int,
    error: Option<(*mut c_void, TCCErrorFunc)>,
    symbols: HashMap<String, *const c_void>,
    functions: Vec<String>,
    compiled: bool,
    relocated: bool,
}

thread_local! {
    static CALLS: RefCell<Vec<String>> = RefCell::new(Vec::new());
    static DELETES: Cell<usize> = Cell::new(0);
    static RUN_ARGS: RefCell<Vec<String>> = RefCell::new(Vec::new());
    static GET_NUM: Cell<Option<extern "C" fn() -> i32>> = Cell::new(None);
}

// ============================================================================
// Test-side helpers
// ============================================================================

pub fn reset() {
    CALLS.with(|c| c.borrow_mut().clear());
    DELETES.with(|d| d.set(0));
    RUN_ARGS.with(|a| a.borrow_mut().clear());
    GET_NUM.with(|g| g.set(None));
}

/// Append an event to the call log (used by drop probes in tests)
pub fn record(event: impl Into<String>) {
    CALLS.with(|c| c.borrow_mut().push(event.into()));
}

pub fn calls() -> Vec<String> {
    CALLS.with(|c| c.borrow().clone())
}

pub fn deletes() -> usize {
    DELETES.with(|d| d.get())
}

pub fn run_args() -> Vec<String> {
    RUN_ARGS.with(|a| a.borrow().clone())
}

/// A fresh context over the fake backend
pub fn fake_context() -> Context {
    Context::with_bindings(&FAKE).expect("fake tcc_new never fails")
}

pub const VALID_ADD: &str = r#"
    extern int get_num();

    int add(int a, int b) {
        return get_num() + a + b;
    }
"#;

pub const MISSING_SEMICOLON: &str = r#"
    int add(int a, int b) {
        return a + b
    }
"#;

// ============================================================================
// Fake entry points
// ============================================================================

unsafe fn state<'a>(s: *mut TCCState) -> &'a mut FakeState {
    &mut *(s as *mut FakeState)
}

unsafe fn text(ptr: *const c_char) -> String {
    CStr::from_ptr(ptr).to_string_lossy().into_owned()
}

fn report(st: &FakeState, message: &str) {
    if let Some((opaque, func)) = st.error {
        let msg = CString::new(message).unwrap();
        unsafe { func(opaque, msg.as_ptr()) };
    }
}

/// Very small stand-in for a parser: catches a missing `;` after `return`
/// and unbalanced braces
fn syntax_error(source: &str) -> Option<String> {
    let opens = source.matches('{').count();
    let closes = source.matches('}').count();
    if opens != closes {
        return Some("<string>:1: error: '}' expected (got \"<eof>\")".to_string());
    }
    for (offset, _) in source.match_indices("return") {
        let rest = &source[offset..];
        let semi = rest.find(';');
        let brace = rest.find('}');
        match (semi, brace) {
            (Some(s), Some(b)) if s < b => {}
            (Some(_), None) => {}
            _ => {
                let line = source[..offset].matches('\n').count() + 1;
                return Some(format!("<string>:{}: error: ';' expected (got \"}}\")", line));
            }
        }
    }
    None
}

/// Names of functions with a body: `int name(...) {`
fn defined_functions(source: &str) -> Vec<String> {
    let mut names = Vec::new();
    for (offset, _) in source.match_indices("int ") {
        let rest = &source[offset + 4..];
        let name: String = rest
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
            .collect();
        if name.is_empty() {
            continue;
        }
        let after = &rest[name.len()..];
        if !after.starts_with('(') {
            continue;
        }
        if let Some(close) = after.find(')') {
            if after[close + 1..].trim_start().starts_with('{') {
                names.push(name);
            }
        }
    }
    names
}

fn compile(st: &mut FakeState, source: &str) -> c_int {
    if let Some(message) = syntax_error(source) {
        report(st, &message);
        return -1;
    }
    st.functions.extend(defined_functions(source));
    st.compiled = true;
    0
}

extern "C" fn fake_add(a: i32, b: i32) -> i32 {
    let base = GET_NUM.with(|g| g.get()).map_or(0, |f| f());
    base + a + b
}

extern "C" fn fake_answer() -> i32 {
    42
}

static FAKE_COUNTER: i32 = 7;

unsafe extern "C" fn tcc_new() -> *mut TCCState {
    record("tcc_new");
    Box::into_raw(Box::<FakeState>::default()) as *mut TCCState
}

unsafe extern "C" fn tcc_new_null() -> *mut TCCState {
    std::ptr::null_mut()
}

unsafe extern "C" fn tcc_delete(s: *mut TCCState) {
    record("tcc_delete");
    DELETES.with(|d| d.set(d.get() + 1));
    drop(Box::from_raw(s as *mut FakeState));
}

unsafe extern "C" fn tcc_set_lib_path(_s: *mut TCCState, path: *const c_char) {
    record(format!("set_lib_path:{}", text(path)));
}

unsafe extern "C" fn tcc_set_error_func(
    s: *mut TCCState,
    opaque: *mut c_void,
    func: Option<TCCErrorFunc>,
) {
    record(if func.is_some() { "set_error_func" } else { "clear_error_func" });
    state(s).error = func.map(|f| (opaque, f));
}

unsafe extern "C" fn tcc_set_options(_s: *mut TCCState, options: *const c_char) {
    record(format!("set_options:{}", text(options)));
}

unsafe fn path_call(name: &str, path: *const c_char) -> c_int {
    let path = text(path);
    record(format!("{}:{}", name, path));
    if path == "/fail" {
        -1
    } else {
        0
    }
}

unsafe extern "C" fn tcc_add_include_path(_s: *mut TCCState, path: *const c_char) -> c_int {
    path_call("add_include_path", path)
}

unsafe extern "C" fn tcc_add_sysinclude_path(_s: *mut TCCState, path: *const c_char) -> c_int {
    path_call("add_sysinclude_path", path)
}

unsafe extern "C" fn tcc_add_library_path(_s: *mut TCCState, path: *const c_char) -> c_int {
    path_call("add_library_path", path)
}

unsafe extern "C" fn tcc_define_symbol(_s: *mut TCCState, sym: *const c_char, value: *const c_char) {
    if value.is_null() {
        record(format!("define:{}", text(sym)));
    } else {
        record(format!("define:{}={}", text(sym), text(value)));
    }
}

unsafe extern "C" fn tcc_undefine_symbol(_s: *mut TCCState, sym: *const c_char) {
    record(format!("undefine:{}", text(sym)));
}

unsafe extern "C" fn tcc_add_file(s: *mut TCCState, filename: *const c_char) -> c_int {
    let path = text(filename);
    record(format!("add_file:{}", path));
    let st = state(s);
    match std::fs::read_to_string(&path) {
        Ok(source) => compile(st, &source),
        Err(_) => {
            report(st, &format!("error: file '{}' not found", path));
            -1
        }
    }
}

unsafe extern "C" fn tcc_compile_string(s: *mut TCCState, buf: *const c_char) -> c_int {
    record("compile_string");
    compile(state(s), &text(buf))
}

unsafe extern "C" fn tcc_set_output_type(s: *mut TCCState, output_type: c_int) -> c_int {
    record(format!("set_output_type:{}", output_type));
    if !(1..=5).contains(&output_type) {
        return -1;
    }
    state(s).output_type = output_type;
    0
}

unsafe extern "C" fn tcc_add_library(s: *mut TCCState, name: *const c_char) -> c_int {
    let name = text(name);
    record(format!("add_library:{}", name));
    if name == "missing" {
        report(state(s), "error: library 'missing' not found");
        -1
    } else {
        0
    }
}

unsafe extern "C" fn tcc_add_symbol(s: *mut TCCState, name: *const c_char, val: *const c_void) -> c_int {
    let name = text(name);
    record(format!("add_symbol:{}", name));
    if name.starts_with("reject_") {
        return -1;
    }
    state(s).symbols.insert(name, val);
    0
}

unsafe extern "C" fn tcc_output_file(s: *mut TCCState, filename: *const c_char) -> c_int {
    let path = text(filename);
    record(format!("output_file:{}", path));
    let st = state(s);
    if st.output_type == 1 || !st.compiled {
        return -1;
    }
    match std::fs::write(&path, b"\x7fELF fake object") {
        Ok(()) => 0,
        Err(_) => -1,
    }
}

unsafe fn relocate_in_place(st: &mut FakeState) -> c_int {
    if !st.compiled {
        return -1;
    }
    if let Some(ptr) = st.symbols.get("get_num") {
        let get_num: extern "C" fn() -> i32 = std::mem::transmute(*ptr);
        GET_NUM.with(|g| g.set(Some(get_num)));
    }
    st.relocated = true;
    0
}

unsafe extern "C" fn tcc_relocate(s: *mut TCCState, ptr: *mut c_void) -> c_int {
    record(format!("relocate:{:?}", ptr));
    let st = state(s);
    if ptr.is_null() {
        return if st.compiled { 4096 } else { -1 };
    }
    relocate_in_place(st)
}

unsafe extern "C" fn tcc_run(s: *mut TCCState, argc: c_int, argv: *mut *mut c_char) -> c_int {
    record(format!("run:{}", argc));
    let st = state(s);
    if !st.relocated && relocate_in_place(st) < 0 {
        return -1;
    }
    let mut args = Vec::new();
    for i in 0..argc as usize {
        args.push(text(*argv.add(i)));
    }
    assert!((*argv.add(argc as usize)).is_null(), "argv must be null-terminated");
    RUN_ARGS.with(|a| *a.borrow_mut() = args);
    argc * 10
}

/// `tcc_run` whose internal link fails
unsafe extern "C" fn tcc_run_link_fails(
    _s: *mut TCCState,
    argc: c_int,
    _argv: *mut *mut c_char,
) -> c_int {
    record(format!("run:{}", argc));
    -1
}

/// `tcc_get_symbol` that answers even for unlinked code, with a section offset
unsafe extern "C" fn tcc_get_symbol_offset(_s: *mut TCCState, name: *const c_char) -> *mut c_void {
    record(format!("get_symbol:{}", text(name)));
    0x40 as *mut c_void
}

unsafe extern "C" fn tcc_get_symbol(s: *mut TCCState, name: *const c_char) -> *mut c_void {
    let name = text(name);
    record(format!("get_symbol:{}", name));
    let st = state(s);
    if !st.relocated {
        return std::ptr::null_mut();
    }
    if st.functions.iter().any(|f| *f == name) {
        return match name.as_str() {
            "add" => fake_add as *mut c_void,
            "answer" => fake_answer as *mut c_void,
            _ => std::ptr::null_mut(),
        };
    }
    if name == "counter" {
        return &FAKE_COUNTER as *const i32 as *mut c_void;
    }
    st.symbols
        .get(&name)
        .map_or(std::ptr::null_mut(), |p| *p as *mut c_void)
}

const FAKE_TABLE: BindingTable = BindingTable {
    tcc_new,
    tcc_delete,
    tcc_set_lib_path,
    tcc_set_error_func,
    tcc_set_options,
    tcc_add_include_path,
    tcc_add_sysinclude_path,
    tcc_define_symbol,
    tcc_undefine_symbol,
    tcc_add_file,
    tcc_compile_string,
    tcc_set_output_type,
    tcc_add_library_path,
    tcc_add_library,
    tcc_add_symbol,
    tcc_output_file,
    tcc_run,
    tcc_relocate,
    tcc_get_symbol,
};

/// The fake backend
pub static FAKE: BindingTable = FAKE_TABLE;

/// A backend whose `tcc_new` fails
pub static NULL_NEW: BindingTable = BindingTable {
    tcc_new: tcc_new_null,
    ..FAKE_TABLE
};

/// A backend whose `tcc_run` cannot link and whose `tcc_get_symbol` never
/// returns null
pub static UNLINKED_RUN: BindingTable = BindingTable {
    tcc_run: tcc_run_link_fails,
    tcc_get_symbol: tcc_get_symbol_offset,
    ..FAKE_TABLE
};
