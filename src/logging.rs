use indicatif::MultiProgress;
use std::io::{self, Write};
use std::sync::Mutex;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

/// Status table currently drawn on stderr, if any.
static ACTIVE_TABLE: Mutex<Option<MultiProgress>> = Mutex::new(None);

/// Install the global log subscriber.
///
/// Logs go to stderr. `RUST_LOG` overrides the default level (`info`, or
/// `debug` with `verbose`), e.g. `RUST_LOG=script=warn` to silence script output.
pub fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(|| TableAwareStderr))
        .with(filter)
        .init();
}

/// Route log output around `table` until [`detach_table`] is called.
pub fn attach_table(table: &MultiProgress) {
    if let Ok(mut slot) = ACTIVE_TABLE.lock() {
        *slot = Some(table.clone());
    }
}

pub fn detach_table() {
    if let Ok(mut slot) = ACTIVE_TABLE.lock() {
        *slot = None;
    }
}

fn active_table() -> Option<MultiProgress> {
    ACTIVE_TABLE.lock().ok().and_then(|slot| slot.clone())
}

#[cfg(test)]
pub(crate) fn table_attached() -> bool {
    active_table().is_some()
}

/// Stderr writer that clears the status rows while a log line is printed
/// and redraws them afterwards.
struct TableAwareStderr;

impl Write for TableAwareStderr {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match active_table() {
            Some(table) => table.suspend(|| io::stderr().write_all(buf).map(|()| buf.len())),
            None => io::stderr().write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indicatif::ProgressDrawTarget;
    use serial_test::serial;

    #[test]
    #[serial]
    fn writes_pass_through_an_attached_table() {
        let table = MultiProgress::with_draw_target(ProgressDrawTarget::hidden());
        attach_table(&table);
        assert!(table_attached());

        let mut w = TableAwareStderr;
        assert_eq!(w.write(b"line\n").unwrap(), 5);

        detach_table();
        assert!(!table_attached());
        assert_eq!(w.write(b"").unwrap(), 0);
    }
}
