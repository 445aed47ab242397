use super::status::StatusCode;
use nom::{
    IResult,
    Parser,
    bytes::complete::{tag, take_till, take_while1},
    character::complete::{digit1, space0},
    combinator::all_consuming,
    multi::many0,
    sequence::{preceded, separated_pair},
};
use std::time::Duration;

const DEFAULT_MIME_TYPE: &str = "text/gemini";
const DEFAULT_CHARSET: &str = "utf-8";

/// A MIME type taken from the meta of a successful response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MimeType {
    /// The `type/subtype` part, lowercased.
    pub mime_type: String,
    /// The character set of the body, `utf-8` unless the server said otherwise.
    pub charset: String,
    /// The `lang` parameter, if any.
    pub lang: Option<String>,
}

impl MimeType {
    fn token(input: &str) -> IResult<&str, &str> {
        take_while1(|c: char| c.is_ascii_alphanumeric() || "!#$&-^_.+".contains(c)).parse(input)
    }

    fn parameter(input: &str) -> IResult<&str, (&str, &str)> {
        preceded(
            (space0, tag(";"), space0),
            separated_pair(Self::token, tag("="), take_till(|c: char| c == ';')),
        )
        .parse(input)
    }

    fn parse(input: &str) -> IResult<&str, Self> {
        let (input, (kind, subtype)) = separated_pair(Self::token, tag("/"), Self::token).parse(input)?;
        let (input, parameters) = many0(Self::parameter).parse(input)?;

        let mut mime_type = Self {
            mime_type: format!("{kind}/{subtype}").to_ascii_lowercase(),
            charset: DEFAULT_CHARSET.to_string(),
            lang: None,
        };

        for (name, value) in parameters {
            let value = value.trim().trim_matches('"');
            match name.to_ascii_lowercase().as_str() {
                "charset" => mime_type.charset = value.to_ascii_lowercase(),
                "lang" => mime_type.lang = Some(value.to_string()),
                _ => {}
            }
        }

        Ok((input, mime_type))
    }

    /// Whether the body is a Gemtext document.
    pub fn is_gemtext(&self) -> bool {
        self.mime_type == DEFAULT_MIME_TYPE
    }
}

impl Default for MimeType {
    fn default() -> Self {
        Self {
            mime_type: DEFAULT_MIME_TYPE.to_string(),
            charset: DEFAULT_CHARSET.to_string(),
            lang: None,
        }
    }
}

/// A decoded response.
///
/// Parsing never fails: a header that does not start with a status code leaves
/// `status_code` and `status_meta` unset, and the body is still kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponsePage {
    /// The status, if the header started with a code the protocol defines.
    pub status_code: Option<StatusCode>,
    /// Everything on the header line after the first space, verbatim.
    pub status_meta: Option<String>,
    /// Everything after the header line, verbatim. `None` when nothing follows the header.
    pub body: Option<String>,
    /// The numeric header token, even when it is not a defined status code.
    pub raw_status: Option<u16>,
}

impl ResponsePage {
    fn status_token(input: &str) -> IResult<&str, &str> {
        all_consuming(digit1).parse(input)
    }

    /// Decode a response.
    pub fn parse(response: &str) -> Self {
        let (header, body) = match response.split_once("\r\n") {
            Some((header, body)) => (header, Some(body)),
            None => (response, None),
        };
        let body = body.filter(|body| !body.is_empty()).map(|body| body.to_string());

        let (token, meta) = match header.split_once(' ') {
            Some((token, meta)) => (token, Some(meta)),
            None => (header, None),
        };

        let raw_status = Self::status_token(token)
            .ok()
            .and_then(|(_, digits)| digits.parse::<u16>().ok());
        let status_code = raw_status.and_then(StatusCode::from_code);

        // an unknown code is treated the same as a malformed one
        let status_meta = status_code.and(meta).map(|meta| meta.to_string());

        Self { status_code, status_meta, body, raw_status }
    }

    /// The MIME type of the body, for successful responses.
    ///
    /// An empty meta means `text/gemini; charset=utf-8`.
    pub fn mime_type(&self) -> Option<MimeType> {
        if !self.status_code?.is_success() {
            return None;
        }

        let meta = self.status_meta.as_deref().unwrap_or_default().trim();
        if meta.is_empty() {
            return Some(MimeType::default());
        }

        MimeType::parse(meta).ok().map(|(_, mime_type)| mime_type)
    }

    /// The prompt to show the user, for input responses.
    pub fn prompt(&self) -> Option<&str> {
        self.meta_if(StatusCode::is_input)
    }

    /// Where the server is redirecting to, for redirect responses.
    pub fn redirect_target(&self) -> Option<&str> {
        self.meta_if(StatusCode::is_redirect)
    }

    /// How long to wait before asking again, for slow down responses.
    pub fn retry_after(&self) -> Option<Duration> {
        self.meta_if(|status| status == StatusCode::SlowDown)?
            .trim()
            .parse()
            .ok()
            .map(Duration::from_secs)
    }

    fn meta_if(&self, predicate: impl Fn(StatusCode) -> bool) -> Option<&str> {
        self.status_code
            .filter(|status| predicate(*status))
            .and(self.status_meta.as_deref())
    }
}

impl From<&str> for ResponsePage {
    fn from(response: &str) -> Self {
        Self::parse(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success() {
        let page = ResponsePage::parse("20 text/gemini\r\nHello world");
        assert_eq!(page.status_code, Some(StatusCode::Success));
        assert!(page.status_code.unwrap().is_success());
        assert_eq!(page.status_meta.as_deref(), Some("text/gemini"));
        assert_eq!(page.body.as_deref(), Some("Hello world"));
        assert_eq!(page.raw_status, Some(20));
    }

    #[test]
    fn header_without_status() {
        let page = ResponsePage::parse("oops\r\nbody");
        assert_eq!(page, ResponsePage {
            status_code: None,
            status_meta: None,
            body: Some("body".to_string()),
            raw_status: None,
        });
    }

    #[test]
    fn unknown_code_collapses_to_no_status() {
        let page = ResponsePage::parse("70 meow\r\n");
        assert_eq!(page.status_code, None);
        assert_eq!(page.status_meta, None);
        assert_eq!(page.body, None);
        assert_eq!(page.raw_status, Some(70));
    }

    #[test]
    fn token_must_be_all_digits() {
        for response in ["+20 text/gemini\r\n", "2x text/gemini\r\n", " 20 text/gemini\r\n", "\r\nbody"] {
            let page = ResponsePage::parse(response);
            assert_eq!(page.status_code, None, "{response:?}");
            assert_eq!(page.raw_status, None, "{response:?}");
        }
    }

    #[test]
    fn meta_is_kept_verbatim() {
        let page = ResponsePage::parse("40 try  again later \r\n");
        assert_eq!(page.status_code, Some(StatusCode::TemporaryFailure));
        assert_eq!(page.status_meta.as_deref(), Some("try  again later "));
    }

    #[test]
    fn only_the_first_crlf_splits() {
        let page = ResponsePage::parse("20 text/plain\r\nline one\r\nline two\r\n");
        assert_eq!(page.body.as_deref(), Some("line one\r\nline two\r\n"));
    }

    #[test]
    fn missing_crlf_means_no_body() {
        let page = ResponsePage::parse("51 Not found");
        assert_eq!(page.status_code, Some(StatusCode::NotFound));
        assert_eq!(page.status_meta.as_deref(), Some("Not found"));
        assert_eq!(page.body, None);
    }

    #[test]
    fn missing_space_means_no_meta() {
        let page = ResponsePage::parse("20\r\n# Title");
        assert_eq!(page.status_code, Some(StatusCode::Success));
        assert_eq!(page.status_meta, None);
        assert_eq!(page.mime_type(), Some(MimeType::default()));
    }

    #[test]
    fn mime_type_with_parameters() {
        let page = ResponsePage::parse("20 text/plain; charset=US-ASCII; lang=en\r\nhi");
        assert_eq!(page.mime_type(), Some(MimeType {
            mime_type: "text/plain".to_string(),
            charset: "us-ascii".to_string(),
            lang: Some("en".to_string()),
        }));
    }

    #[test]
    fn mime_type_defaults_charset() {
        let mime_type = ResponsePage::parse("20 text/gemini\r\n").mime_type().unwrap();
        assert!(mime_type.is_gemtext());
        assert_eq!(mime_type.charset, "utf-8");
    }

    #[test]
    fn mime_type_only_for_success() {
        assert_eq!(ResponsePage::parse("51 text/gemini\r\n").mime_type(), None);
    }

    #[test]
    fn prompt() {
        let page = ResponsePage::parse("11 Password?\r\n");
        assert_eq!(page.prompt(), Some("Password?"));
        assert_eq!(page.redirect_target(), None);
    }

    #[test]
    fn redirect_target() {
        let page = ResponsePage::parse("31 gemini://example.com/new\r\n");
        assert_eq!(page.redirect_target(), Some("gemini://example.com/new"));
        assert_eq!(page.prompt(), None);
    }

    #[test]
    fn retry_after() {
        assert_eq!(ResponsePage::parse("44 30\r\n").retry_after(), Some(Duration::from_secs(30)));
        assert_eq!(ResponsePage::parse("44 soon\r\n").retry_after(), None);
        assert_eq!(ResponsePage::parse("41 30\r\n").retry_after(), None);
    }
}
