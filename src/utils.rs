/// Debug logging utility function
///
/// Prints debug messages with a colored prefix when debug assertions are
/// enabled or `CODE_ANCHOR_DEBUG` is set.
pub fn debug_log(msg: &str) {
    if cfg!(debug_assertions) || std::env::var("CODE_ANCHOR_DEBUG").is_ok() {
        eprintln!("\x1b[1;33m[code-anchor]\x1b[0m {}", msg);
    }
}
