/// The broad class of a status code, named by its first digit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCategory {
    /// `1x`: the server wants a line of user input.
    Input,
    /// `2x`: a body follows.
    Success,
    /// `3x`: the resource lives elsewhere.
    Redirect,
    /// `4x`: the request failed, an identical one may succeed later.
    TemporaryFailure,
    /// `5x`: the request failed and will keep failing.
    PermanentFailure,
    /// `6x`: a client certificate is needed.
    CertificateRequired,
}

/// A status code defined by the Gemini protocol.
///
/// See [gemini://geminiprotocol.net/docs/protocol-specification.gmi](gemini://geminiprotocol.net/docs/protocol-specification.gmi) for what each one asks of a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    /// 10: meta is a prompt for user input.
    Input,
    /// 11: like 10, but the input should not be echoed.
    SensitiveInput,
    /// 20: meta is the MIME type of the body.
    Success,
    /// 30: meta is the new URL, the move is temporary.
    TemporaryRedirect,
    /// 31: meta is the new URL, the move is permanent.
    PermanentRedirect,
    /// 40.
    TemporaryFailure,
    /// 41: overload or maintenance.
    ServerUnavailable,
    /// 42: dynamic content generation failed.
    CGIError,
    /// 43: a proxied request failed.
    ProxyError,
    /// 44: rate limited, meta is the number of seconds to wait.
    SlowDown,
    /// 50.
    PermanentFailure,
    /// 51.
    NotFound,
    /// 52: the resource is gone for good.
    Gone,
    /// 53: the server does not proxy for the requested host.
    ProxyRequestRefused,
    /// 59: the server could not parse the request.
    BadRequest,
    /// 60.
    ClientCertificateRequired,
    /// 61: the certificate is not authorised for this resource.
    CertificateNotAuthorized,
    /// 62: the certificate itself is invalid.
    CertificateNotValid,
}

const REGISTRY: [(u16, StatusCode); 18] = [
    (10, StatusCode::Input),
    (11, StatusCode::SensitiveInput),
    (20, StatusCode::Success),
    (30, StatusCode::TemporaryRedirect),
    (31, StatusCode::PermanentRedirect),
    (40, StatusCode::TemporaryFailure),
    (41, StatusCode::ServerUnavailable),
    (42, StatusCode::CGIError),
    (43, StatusCode::ProxyError),
    (44, StatusCode::SlowDown),
    (50, StatusCode::PermanentFailure),
    (51, StatusCode::NotFound),
    (52, StatusCode::Gone),
    (53, StatusCode::ProxyRequestRefused),
    (59, StatusCode::BadRequest),
    (60, StatusCode::ClientCertificateRequired),
    (61, StatusCode::CertificateNotAuthorized),
    (62, StatusCode::CertificateNotValid),
];

impl StatusCode {
    /// Look up a numeric code. Codes the protocol does not define give `None`.
    pub fn from_code(code: u16) -> Option<Self> {
        REGISTRY
            .iter()
            .find(|(value, _)| *value == code)
            .map(|(_, status)| *status)
    }

    /// The numeric value sent on the wire.
    pub fn code(self) -> u16 {
        REGISTRY
            .iter()
            .find(|(_, status)| *status == self)
            .map(|(value, _)| *value)
            .unwrap_or_default()
    }

    /// The category this status belongs to.
    pub fn category(self) -> StatusCategory {
        match self {
            Self::Input | Self::SensitiveInput => StatusCategory::Input,
            Self::Success => StatusCategory::Success,
            Self::TemporaryRedirect | Self::PermanentRedirect => StatusCategory::Redirect,
            Self::TemporaryFailure
            | Self::ServerUnavailable
            | Self::CGIError
            | Self::ProxyError
            | Self::SlowDown => StatusCategory::TemporaryFailure,
            Self::PermanentFailure
            | Self::NotFound
            | Self::Gone
            | Self::ProxyRequestRefused
            | Self::BadRequest => StatusCategory::PermanentFailure,
            Self::ClientCertificateRequired
            | Self::CertificateNotAuthorized
            | Self::CertificateNotValid => StatusCategory::CertificateRequired,
        }
    }

    /// Whether the server is asking for user input.
    pub fn is_input(self) -> bool {
        self.category() == StatusCategory::Input
    }

    /// Whether a body follows.
    pub fn is_success(self) -> bool {
        self.category() == StatusCategory::Success
    }

    /// Whether meta is a redirect target.
    pub fn is_redirect(self) -> bool {
        self.category() == StatusCategory::Redirect
    }

    /// Whether the request failed, temporarily or permanently.
    pub fn is_failure(self) -> bool {
        matches!(self.category(), StatusCategory::TemporaryFailure | StatusCategory::PermanentFailure)
    }

    /// Whether a client certificate is needed.
    pub fn requires_certificate(self) -> bool {
        self.category() == StatusCategory::CertificateRequired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_defined_code_round_trips() {
        for (code, status) in REGISTRY {
            assert_eq!(StatusCode::from_code(code), Some(status));
            assert_eq!(status.code(), code);
        }
    }

    #[test]
    fn category_follows_first_digit() {
        for (code, status) in REGISTRY {
            let expected = match code / 10 {
                1 => StatusCategory::Input,
                2 => StatusCategory::Success,
                3 => StatusCategory::Redirect,
                4 => StatusCategory::TemporaryFailure,
                5 => StatusCategory::PermanentFailure,
                6 => StatusCategory::CertificateRequired,
                _ => unreachable!(),
            };
            assert_eq!(status.category(), expected, "status {code}");
        }
    }

    #[test]
    fn undefined_codes_are_not_found() {
        for code in [0, 1, 12, 21, 39, 45, 54, 58, 63, 70, 99, 200] {
            assert_eq!(StatusCode::from_code(code), None, "status {code}");
        }
    }

    #[test]
    fn predicates() {
        assert!(StatusCode::SensitiveInput.is_input());
        assert!(StatusCode::Success.is_success());
        assert!(StatusCode::PermanentRedirect.is_redirect());
        assert!(StatusCode::SlowDown.is_failure());
        assert!(StatusCode::Gone.is_failure());
        assert!(!StatusCode::Success.is_failure());
        assert!(StatusCode::CertificateNotValid.requires_certificate());
    }
}
