//! # omni-wasm: Sandboxed Module Validators
//!
//! The sandbox-module plugin. Annotations of the form
//! `wasm:<moduleId>:<function>` call an exported function of a registered
//! WebAssembly module with the field's value.
//!
//! - **[`config`]**: [`SandboxConfig`] sets the fuel budget per call and the
//!   linear memory limit per instance.
//! - **[`error`]**: [`SandboxError`] covers module registration failures.
//! - **[`instance`]**: one instantiated module with its own store.
//! - **[`validator`]**: [`SandboxValidator`], the plugin itself.
//!
//! ## Calling convention
//!
//! | Export signature        | Behaviour                                          |
//! |-------------------------|----------------------------------------------------|
//! | `(i32, i32) -> i32`     | value JSON written via `alloc(len) -> ptr` into `memory`, called with `(ptr, len)` |
//! | `() -> i32`             | called without the value                           |
//!
//! A return of `0` passes; anything else rejects. Modules may not import
//! anything from the host.

pub mod config;
pub mod error;
pub mod instance;
pub mod validator;

pub use config::SandboxConfig;
pub use error::SandboxError;
pub use validator::{SandboxValidator, WASM_PLUGIN_ID};
