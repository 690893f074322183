use thiserror::Error;

pub type Result<T> = std::result::Result<T, DashboardError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DashboardError {
    /// A required structural field is absent or has the wrong type.
    #[error("malformed {view} payload: {reason}")]
    MalformedPayload { view: String, reason: String },

    #[error("network failure: {0}")]
    NetworkFailure(String),

    /// A derivation that needs at least one entry was given none.
    #[error("no data points to derive `{field}` from")]
    EmptySeries { field: String },

    #[error("unknown view: {0}")]
    UnknownView(String),
}

impl DashboardError {
    pub fn malformed(view: impl Into<String>, reason: impl ToString) -> Self {
        DashboardError::MalformedPayload {
            view: view.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<reqwest::Error> for DashboardError {
    fn from(err: reqwest::Error) -> Self {
        DashboardError::NetworkFailure(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_human_readable() {
        let err = DashboardError::malformed("at-risk", "missing field `days_since_checkin`");
        assert_eq!(
            err.to_string(),
            "malformed at-risk payload: missing field `days_since_checkin`"
        );

        let err = DashboardError::EmptySeries {
            field: "checkin_count".to_string(),
        };
        assert_eq!(err.to_string(), "no data points to derive `checkin_count` from");
    }
}
