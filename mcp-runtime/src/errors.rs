use crate::search_console::UpstreamError;

/// Stable classification of an upstream HTTP failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpstreamErrorKind {
    InvalidRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    RateLimited,
    ServiceUnavailable,
    Other(u16),
}

impl UpstreamErrorKind {
    pub fn from_status(status: u16) -> Self {
        match status {
            400 => Self::InvalidRequest,
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            429 => Self::RateLimited,
            500..=599 => Self::ServiceUnavailable,
            other => Self::Other(other),
        }
    }

    pub fn code(self) -> String {
        match self {
            Self::InvalidRequest => "INVALID_REQUEST".to_string(),
            Self::Unauthorized => "UNAUTHORIZED".to_string(),
            Self::Forbidden => "FORBIDDEN".to_string(),
            Self::NotFound => "NOT_FOUND".to_string(),
            Self::RateLimited => "RATE_LIMIT".to_string(),
            Self::ServiceUnavailable => "SERVICE_ERROR".to_string(),
            Self::Other(status) => format!("HTTP_{status}"),
        }
    }

    fn advice(self, detail: &str) -> String {
        match self {
            Self::InvalidRequest => "Invalid request parameters".to_string(),
            Self::Unauthorized => {
                "Authentication failed. Try running `gsc auth` to re-authenticate.".to_string()
            }
            Self::Forbidden => {
                "Permission denied. Make sure you have access to this Search Console property."
                    .to_string()
            }
            Self::NotFound => "Resource not found. The URL or property may not exist.".to_string(),
            Self::RateLimited => {
                "Rate limit exceeded. Please wait a moment and try again.".to_string()
            }
            Self::ServiceUnavailable => {
                "Google Search Console service is temporarily unavailable. Please try again later."
                    .to_string()
            }
            Self::Other(_) => format!("Google API error: {detail}"),
        }
    }
}

/// User-facing rendering of a handler failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedError {
    pub code: String,
    pub message: String,
    pub details: Option<String>,
}

impl FormattedError {
    pub fn from_upstream(err: &UpstreamError) -> Self {
        match err {
            UpstreamError::Api { status, message } => {
                let kind = UpstreamErrorKind::from_status(*status);
                Self {
                    code: kind.code(),
                    message: kind.advice(message),
                    details: Some(message.clone()),
                }
            }
            UpstreamError::Transport(_) => Self {
                code: "TRANSPORT_ERROR".to_string(),
                message: err.to_string(),
                details: None,
            },
            UpstreamError::Auth(auth) => Self {
                code: auth.code().to_ascii_uppercase(),
                message: auth.to_string(),
                details: None,
            },
        }
    }

    /// `message`, plus a `Details:` line when the upstream text adds information.
    pub fn render(&self) -> String {
        match &self.details {
            Some(details) if !details.is_empty() && details != &self.message => {
                format!("{}\nDetails: {details}", self.message)
            }
            _ => self.message.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gsc_core::AuthError;

    fn api(status: u16) -> UpstreamError {
        UpstreamError::Api {
            status,
            message: "upstream said no".to_string(),
        }
    }

    #[test]
    fn status_mapping_is_total_and_distinct() {
        let expected = [
            (400, UpstreamErrorKind::InvalidRequest, "INVALID_REQUEST"),
            (401, UpstreamErrorKind::Unauthorized, "UNAUTHORIZED"),
            (403, UpstreamErrorKind::Forbidden, "FORBIDDEN"),
            (404, UpstreamErrorKind::NotFound, "NOT_FOUND"),
            (429, UpstreamErrorKind::RateLimited, "RATE_LIMIT"),
            (500, UpstreamErrorKind::ServiceUnavailable, "SERVICE_ERROR"),
            (502, UpstreamErrorKind::ServiceUnavailable, "SERVICE_ERROR"),
            (503, UpstreamErrorKind::ServiceUnavailable, "SERVICE_ERROR"),
            (418, UpstreamErrorKind::Other(418), "HTTP_418"),
        ];
        for (status, kind, code) in expected {
            assert_eq!(UpstreamErrorKind::from_status(status), kind, "status {status}");
            assert_eq!(kind.code(), code);
        }

        let distinct: std::collections::HashSet<_> = [400, 401, 403, 404, 429, 500, 418]
            .into_iter()
            .map(UpstreamErrorKind::from_status)
            .collect();
        assert_eq!(distinct.len(), 7);
    }

    #[test]
    fn unauthorized_advises_reauthentication_with_details() {
        let formatted = FormattedError::from_upstream(&api(401));
        assert_eq!(formatted.code, "UNAUTHORIZED");
        assert_eq!(
            formatted.render(),
            "Authentication failed. Try running `gsc auth` to re-authenticate.\nDetails: upstream said no"
        );
    }

    #[test]
    fn other_status_keeps_number_and_appends_upstream_details() {
        let formatted = FormattedError::from_upstream(&api(409));
        assert_eq!(formatted.code, "HTTP_409");
        assert_eq!(
            formatted.render(),
            "Google API error: upstream said no\nDetails: upstream said no"
        );
    }

    #[test]
    fn details_identical_to_message_are_not_repeated() {
        let plain = FormattedError {
            code: "X".to_string(),
            message: "same".to_string(),
            details: Some("same".to_string()),
        };
        assert_eq!(plain.render(), "same");
    }

    #[test]
    fn auth_failures_keep_their_message() {
        let formatted = FormattedError::from_upstream(&UpstreamError::Auth(
            AuthError::TokenRefresh("invalid_grant".to_string()),
        ));
        assert_eq!(formatted.code, "TOKEN_REFRESH_FAILURE");
        assert!(formatted.render().contains("gsc auth"));
    }
}
