//! Shared test infrastructure.
//!
//! All integration tests run their async bodies on one multi-thread
//! runtime so fixture servers and loaders share a reactor, mirroring how
//! the crates are used in a real process.

use std::sync::LazyLock;

use tokio::runtime::Runtime;

/// Shared runtime for fixture servers and test bodies.
///
/// Tracing is initialized here once; set `RUST_LOG` to see loader/cache
/// logs while debugging a test.
pub static SERVER_RT: LazyLock<Runtime> = LazyLock::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("failed to build shared test runtime")
});
