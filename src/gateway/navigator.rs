use tracing::warn;

/// Receives the session-expired redirect issued on a 401.
pub trait Navigator: Send + Sync {
    fn redirect(&self, path: &str);
}

impl<F> Navigator for F
where
    F: Fn(&str) + Send + Sync,
{
    fn redirect(&self, path: &str) {
        self(path)
    }
}

/// Headless default: records the redirect in the log only.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNavigator;

impl Navigator for LogNavigator {
    fn redirect(&self, path: &str) {
        warn!(auth_page = path, "Session expired, redirecting to sign-in");
    }
}
