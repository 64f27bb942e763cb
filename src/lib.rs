//! Hierarchical planning engine: a typed tree of atomic and container
//! templates, the duration-ratio invariant between a container and its
//! children, a schedule flattener and ledger simulator that together
//! compute a container's input/output contract, and a closed algebra
//! of layout-mutating operations (`spec.md` §1-§2).
//!
//! The public surface is [`facade::Facade`] plus the value types
//! needed to call it. Persistence beyond process lifetime, the
//! RPC/tool dispatch surface, rendering, and free-text heuristics that
//! guess variable names are external collaborators (`spec.md` §1) —
//! this crate only defines the [`store::Store`] contract they sit
//! behind.

pub mod diagnostic;
pub mod facade;
pub mod flatten;
pub mod ids;
pub mod layout;
pub mod ledger_sim;
pub mod link;
pub mod model;
pub mod ratio;
pub mod store;
pub mod vocabulary;
pub mod wire;

pub use diagnostic::Diagnostic;
pub use facade::Facade;

/// Initializes terminal + file logging for host binaries, mirroring
/// the teacher's `init()`: info level to the terminal, debug level to
/// a timestamped file under `logs/`.
#[cfg(feature = "logging")]
pub fn init() {
    std::fs::create_dir_all("logs").expect("create logs directory");
    let config = simplelog::ConfigBuilder::new()
        .set_location_level(log::LevelFilter::Off)
        .set_target_level(log::LevelFilter::Off)
        .set_thread_level(log::LevelFilter::Off)
        .build();
    let time = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("time moves slow")
        .as_secs();
    let file = simplelog::WriteLogger::new(
        log::LevelFilter::Debug,
        config.clone(),
        std::fs::File::create(format!("logs/{time}.log")).expect("create log file"),
    );
    let term = simplelog::TermLogger::new(
        log::LevelFilter::Info,
        config,
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    );
    simplelog::CombinedLogger::init(vec![term, file]).expect("initialize logger");
}

/// Initializes `env_logger` for test binaries that want `RUST_LOG`-
/// controlled output instead of the file-backed `init()` above. Safe
/// to call from more than one test in a process; only the first call
/// takes effect.
#[cfg(feature = "logging")]
pub fn init_test_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
