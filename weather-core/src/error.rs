use thiserror::Error;

/// Failure kinds raised by the provider client.
///
/// The operation surface is the only place these are caught; everything
/// below it propagates them with `?`.
#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("{0}")]
    Configuration(String),

    #[error("{0}")]
    Validation(String),

    #[error("Network error while contacting the weather service: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("The weather service did not respond in time")]
    Timeout,

    #[error("{message}")]
    Provider { status: u16, message: String },

    #[error("{0}")]
    Format(String),
}

/// Short, stable name for each failure kind, used in log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Validation,
    Transport,
    Timeout,
    Provider,
    Format,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::Validation => "validation",
            ErrorKind::Transport => "transport",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Provider => "provider",
            ErrorKind::Format => "format",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl WeatherError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WeatherError::Configuration(_) => ErrorKind::Configuration,
            WeatherError::Validation(_) => ErrorKind::Validation,
            WeatherError::Transport(_) => ErrorKind::Transport,
            WeatherError::Timeout => ErrorKind::Timeout,
            WeatherError::Provider { .. } => ErrorKind::Provider,
            WeatherError::Format(_) => ErrorKind::Format,
        }
    }

    /// Builds a provider error from a non-success HTTP status.
    pub fn from_status(status: u16) -> Self {
        let message = match status {
            401 => "Invalid API key".to_string(),
            404 => "Location not found".to_string(),
            429 => "API rate limit exceeded".to_string(),
            other => format!("API request failed with status {other}"),
        };

        WeatherError::Provider { status, message }
    }

    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            WeatherError::Timeout
        } else {
            WeatherError::Transport(err)
        }
    }
}

pub type Result<T, E = WeatherError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_statuses_have_fixed_messages() {
        assert_eq!(WeatherError::from_status(401).to_string(), "Invalid API key");
        assert_eq!(WeatherError::from_status(404).to_string(), "Location not found");
        assert_eq!(WeatherError::from_status(429).to_string(), "API rate limit exceeded");
    }

    #[test]
    fn other_statuses_use_generic_message() {
        for status in [400, 418, 500, 503] {
            let err = WeatherError::from_status(status);
            assert_eq!(err.to_string(), format!("API request failed with status {status}"));
            assert!(matches!(err, WeatherError::Provider { status: s, .. } if s == status));
        }
    }

    #[test]
    fn kind_matches_variant() {
        assert_eq!(WeatherError::Timeout.kind(), ErrorKind::Timeout);
        assert_eq!(WeatherError::Validation("x".into()).kind().as_str(), "validation");
        assert_eq!(WeatherError::from_status(500).kind(), ErrorKind::Provider);
    }
}
