use tasktime::cli::{internal_error, is_internal, run, user_error};

fn main() {
    // Silent unless RUST_LOG is set
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("off")).init();

    #[cfg(windows)]
    let _ = enable_ansi_support::enable_ansi_support();

    if let Err(e) = run() {
        if is_internal(&e) {
            internal_error(&e);
        } else {
            user_error(&e.to_string());
        }
    }
}
