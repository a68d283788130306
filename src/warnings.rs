//! Non-fatal diagnostics channel
//!
//! Warnings are routed through a single process-wide callback so that
//! embedding applications can redirect them. The default callback emits
//! through `tracing`.

use std::sync::Mutex;

use tracing::warn;

/// Callback invoked with every warning message
pub type WarningCallback = Box<dyn Fn(&str) + Send + Sync + 'static>;

static CALLBACK: Mutex<Option<WarningCallback>> = Mutex::new(None);

/// Replace the global warning callback
pub fn set_warning_callback<F>(callback: F)
where
    F: Fn(&str) + Send + Sync + 'static,
{
    let mut slot = CALLBACK.lock().expect("warning callback mutex poisoned");
    *slot = Some(Box::new(callback));
}

/// Send a warning from `component` to the registered callback, or to the
/// default tracing-based one.
pub(crate) fn warning(component: &str, message: impl AsRef<str>) {
    let message = if component.is_empty() {
        message.as_ref().to_string()
    } else {
        format!("{}: {}", component, message.as_ref())
    };

    let slot = CALLBACK.lock().expect("warning callback mutex poisoned");
    match &*slot {
        Some(callback) => callback(&message),
        None => warn!("[molio] {}", message),
    }
}
