pub mod ls;
pub mod ps;

use nvsmi_query::QueryError;

/// Attach `action` to a library error, calling out output that no longer matches the expected columns
pub(crate) fn describe(err: QueryError, action: &str) -> anyhow::Error {
    let context = if err.is_malformed() {
        format!("{}: nvidia-smi output does not match the expected columns", action)
    } else {
        action.to_string()
    };
    anyhow::Error::new(err).context(context)
}
