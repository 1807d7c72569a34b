use rolegate_core::AppError;

/// SQLSTATE classes retried by the gateway: connection exceptions,
/// serialization failures and deadlocks.
fn is_transient_code(code: &str) -> bool {
    code.starts_with("08") || code == "40001" || code == "40P01" || code == "57P03"
}

/// Maps a sqlx error to `StoreUnavailable` when a retry may succeed,
/// otherwise to `Internal`.
pub(crate) fn store_error(error: sqlx::Error, operation: &str) -> AppError {
    let transient = match &error {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => true,
        sqlx::Error::Database(database_error) => database_error
            .code()
            .is_some_and(|code| is_transient_code(code.as_ref())),
        _ => false,
    };

    if transient {
        AppError::StoreUnavailable(format!("failed to {operation}: {error}"))
    } else {
        AppError::Internal(format!("failed to {operation}: {error}"))
    }
}
