use std::io::Write;
use std::thread;
use std::time::{SystemTime, UNIX_EPOCH};

use log::LevelFilter;

/// Install the process logger: `[<ms>ms][<thread>] LEVEL message` on stderr.
///
/// `RUST_LOG` overrides `default`. Safe to call more than once.
pub fn init(default: LevelFilter) {
    let _ = env_logger::Builder::new()
        .filter_level(default)
        .parse_default_env()
        .format(|buf, record| {
            let ts = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis())
                .unwrap_or(0);
            let current = thread::current();
            let thread_name = current.name().unwrap_or("unnamed");
            writeln!(
                buf,
                "[{ts}ms][{thread_name}] {:<5} {}",
                record.level(),
                record.args()
            )
        })
        .try_init();
}
