//! Exit codes for the `bagit` binary.
//! Per-bag failures map through `BagError::exit_code`; the process exits with
//! the highest code seen.

pub const SUCCESS: i32 = 0;
pub const CONFIG_ERROR: i32 = 2; // Bad arguments, config file or log target

/// Fold a per-directory result into the running exit code.
pub fn combine(current: i32, next: i32) -> i32 {
    current.max(next)
}
