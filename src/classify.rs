use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use http::{Method, StatusCode};

pub const BAD_PATH_MESSAGE: &str = "Invalid URL format. Use: /proxy/{base64-encoded-url}";
pub const BAD_ENCODING_MESSAGE: &str = "Invalid encoded URL";
pub const BAD_METHOD_MESSAGE: &str = "Method not allowed";

/// outcome of classifying an inbound request, before any cache or origin work
#[derive(Debug, PartialEq, Eq)]
pub enum Classified {
    /// cors preflight, answered immediately without touching cache or origin
    Preflight,
    /// validated proxy request carrying the decoded origin url.
    /// `include_body` is false for HEAD, which shares the GET fetch path
    /// but returns headers only.
    Proxy {
        origin_url: String,
        include_body: bool,
    },
}

/// terminal rejection for the current request; always rendered with cors
/// headers so browser callers can read it
#[derive(Debug, PartialEq, Eq)]
pub struct Rejection {
    pub status: StatusCode,
    pub message: &'static str,
}

impl Rejection {
    fn bad_request(message: &'static str) -> Self {
        Rejection {
            status: StatusCode::BAD_REQUEST,
            message,
        }
    }
}

/// validates method and path shape, decodes the embedded origin url and
/// checks it against the allow-listed host fragments.
///
/// the allow-list is a coarse substring check over the decoded url rather
/// than a parsed-hostname match; the fragments come from configuration.
pub fn classify(
    method: &Method,
    path: &str,
    allowed_fragments: &[String],
) -> Result<Classified, Rejection> {
    if method == Method::OPTIONS {
        return Ok(Classified::Preflight);
    }

    if method != Method::GET && method != Method::HEAD {
        return Err(Rejection {
            status: StatusCode::METHOD_NOT_ALLOWED,
            message: BAD_METHOD_MESSAGE,
        });
    }

    // a request path of /proxy/{encoded} splits into ["", "proxy", encoded]
    let segments: Vec<&str> = path.split('/').collect();
    let encoded = match segments.get(1).zip(segments.get(2)) {
        Some((&"proxy", &encoded)) if !encoded.is_empty() => encoded,
        _ => return Err(Rejection::bad_request(BAD_PATH_MESSAGE)),
    };

    let decoded_bytes = BASE64
        .decode(encoded)
        .map_err(|_| Rejection::bad_request(BAD_ENCODING_MESSAGE))?;
    let origin_url = String::from_utf8(decoded_bytes)
        .map_err(|_| Rejection::bad_request(BAD_ENCODING_MESSAGE))?;

    if !allowed_fragments
        .iter()
        .any(|fragment| origin_url.contains(fragment.as_str()))
    {
        return Err(Rejection::bad_request(BAD_ENCODING_MESSAGE));
    }

    Ok(Classified::Proxy {
        include_body: method == Method::GET,
        origin_url,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allowed() -> Vec<String> {
        vec![
            "prod-files-secure.s3.us-west-2.amazonaws.com".to_string(),
            "secure.notion-static.com".to_string(),
        ]
    }

    fn encode(url: &str) -> String {
        BASE64.encode(url)
    }

    #[test]
    fn get_with_allow_listed_url_is_accepted() {
        let url = "https://prod-files-secure.s3.us-west-2.amazonaws.com/abc.png";
        let path = format!("/proxy/{}", encode(url));
        let classified = classify(&Method::GET, &path, &allowed()).unwrap();
        assert_eq!(
            classified,
            Classified::Proxy {
                origin_url: url.to_string(),
                include_body: true,
            }
        );
    }

    #[test]
    fn head_shares_the_proxy_path_without_a_body() {
        let url = "https://s3.us-west-2.amazonaws.com/secure.notion-static.com/x.jpg";
        let path = format!("/proxy/{}", encode(url));
        match classify(&Method::HEAD, &path, &allowed()).unwrap() {
            Classified::Proxy { include_body, .. } => assert!(!include_body),
            other => panic!("unexpected classification: {:?}", other),
        }
    }

    #[test]
    fn options_short_circuits_for_any_path() {
        for path in ["/", "/proxy/not-base64", "/anything/else"] {
            assert_eq!(
                classify(&Method::OPTIONS, path, &allowed()).unwrap(),
                Classified::Preflight
            );
        }
    }

    #[test]
    fn unsupported_method_is_405() {
        let rejection = classify(&Method::DELETE, "/proxy/abcd", &allowed()).unwrap_err();
        assert_eq!(rejection.status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(rejection.message, BAD_METHOD_MESSAGE);
    }

    #[test]
    fn wrong_path_shape_is_rejected_with_usage_hint() {
        for path in ["/notproxy/xyz", "/proxy", "/proxy/", "/"] {
            let rejection = classify(&Method::GET, path, &allowed()).unwrap_err();
            assert_eq!(rejection.status, StatusCode::BAD_REQUEST);
            assert_eq!(rejection.message, BAD_PATH_MESSAGE);
        }
    }

    #[test]
    fn invalid_base64_is_rejected() {
        let rejection = classify(&Method::GET, "/proxy/!!notb64!!", &allowed()).unwrap_err();
        assert_eq!(rejection.status, StatusCode::BAD_REQUEST);
        assert_eq!(rejection.message, BAD_ENCODING_MESSAGE);
    }

    #[test]
    fn url_outside_the_allow_list_is_rejected() {
        let path = format!("/proxy/{}", encode("https://evil.example.com/abc.png"));
        let rejection = classify(&Method::GET, &path, &allowed()).unwrap_err();
        assert_eq!(rejection.status, StatusCode::BAD_REQUEST);
        assert_eq!(rejection.message, BAD_ENCODING_MESSAGE);
    }

    #[test]
    fn allow_list_is_substring_containment_not_host_parsing() {
        // the coarse check accepts a fragment appearing anywhere in the url
        let path = format!(
            "/proxy/{}",
            encode("https://s3.us-west-2.amazonaws.com/secure.notion-static.com/f/img.png")
        );
        assert!(classify(&Method::GET, &path, &allowed()).is_ok());
    }
}
