use std::panic::{self, PanicHookInfo};
use std::sync::Once;

use metrics::counter;
use tracing::error;

static INSTALLED: Once = Once::new();

/// Install a panic hook that records the panic in logs and metrics before
/// delegating to the previous hook, so default backtraces still print.
pub fn install_hook() {
    INSTALLED.call_once(|| {
        let prev = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            let thread = std::thread::current();
            error!(
                thread = thread.name().unwrap_or("<unnamed>"),
                location = %location_of(info),
                payload = payload_of(info),
                "panic captured"
            );
            counter!("shapesink_panics_total").increment(1);
            prev(info);
        }));
    });
}

fn location_of(info: &PanicHookInfo<'_>) -> String {
    info.location()
        .map(|l| format!("{}:{}", l.file(), l.line()))
        .unwrap_or_else(|| "<unknown>".into())
}

fn payload_of<'a>(info: &'a PanicHookInfo<'_>) -> &'a str {
    if let Some(s) = info.payload().downcast_ref::<&str>() {
        s
    } else if let Some(s) = info.payload().downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic payload>"
    }
}
