//! Integration-test member of the workspace.
//!
//! The actual tests live under `tests/`; this crate intentionally exports
//! nothing.
