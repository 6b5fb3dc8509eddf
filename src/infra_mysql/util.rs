use crate::domain_port::StoreError;
use sqlx::mysql::MySqlDatabaseError;

const ER_DUP_ENTRY: u16 = 1062;
const ER_LOCK_WAIT_TIMEOUT: u16 = 1205;
const ER_LOCK_DEADLOCK: u16 = 1213;

fn mysql_error_number(err: &sqlx::Error) -> Option<u16> {
    if let sqlx::Error::Database(db) = err {
        if let Some(mysql_err) = db.try_downcast_ref::<MySqlDatabaseError>() {
            return Some(mysql_err.number());
        }
    }

    None
}

pub fn is_dup_key(err: &sqlx::Error) -> bool {
    mysql_error_number(err) == Some(ER_DUP_ENTRY)
}

/// Errors after which the whole batch can be retried from a fresh read.
pub fn is_retryable(err: &sqlx::Error) -> bool {
    matches!(
        mysql_error_number(err),
        Some(ER_LOCK_DEADLOCK | ER_LOCK_WAIT_TIMEOUT)
    )
}

pub fn store_error(context: &str, err: sqlx::Error) -> StoreError {
    if is_dup_key(&err) || is_retryable(&err) {
        StoreError::Conflict(format!("{context}: {err}"))
    } else {
        StoreError::Unavailable(format!("{context}: {err}"))
    }
}
