use crate::cache::CachedResponse;
use crate::classify::Rejection;
use actix_web::HttpResponse;
use bytes::Bytes;
use http::header::{self, HeaderName, HeaderValue};
use http::{HeaderMap, Response, StatusCode};

/// advisory freshness written into every cached response: fresh for 24h at
/// the client, 7d at the edge, servable stale for 7 more days while a
/// revalidation happens downstream
pub const CACHE_CONTROL_VALUE: &str =
    "public, max-age=86400, s-maxage=604800, stale-while-revalidate=604800";

pub const CACHED_BY_HEADER: &str = "x-cached-by";
pub const CACHE_STATUS_HEADER: &str = "x-cache-status";
pub const UPSTREAM_FAILURE_MESSAGE: &str = "Failed to fetch image";

const CACHED_BY_VALUE: &str = "imgrelay";
const CORS_METHODS: &str = "GET, HEAD";
const PREFLIGHT_METHODS: &str = "GET, HEAD, OPTIONS";
const CORS_ALLOWED_HEADERS: &str = "Content-Type";
const PREFLIGHT_MAX_AGE: &str = "86400";

// hop-by-hop headers that must not be carried from the origin response
// into the cached entry. content-length is recomputed from the body.
const HOP_BY_HOP: &[HeaderName] = &[
    header::CONNECTION,
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
    header::CONTENT_LENGTH,
];

fn cors_headers(headers: &mut HeaderMap) {
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(CORS_METHODS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(CORS_ALLOWED_HEADERS),
    );
}

/// answers an OPTIONS preflight without touching cache or origin
pub fn preflight() -> HttpResponse {
    HttpResponse::Ok()
        .insert_header((header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"))
        .insert_header((header::ACCESS_CONTROL_ALLOW_METHODS, PREFLIGHT_METHODS))
        .insert_header((header::ACCESS_CONTROL_ALLOW_HEADERS, CORS_ALLOWED_HEADERS))
        .insert_header((header::ACCESS_CONTROL_MAX_AGE, PREFLIGHT_MAX_AGE))
        .finish()
}

/// renders a classifier rejection; cors headers are kept so browser
/// callers can read the error instead of an opaque network failure
pub fn rejection(rejection: &Rejection) -> HttpResponse {
    plain_error(rejection.status, rejection.message)
}

/// renders an origin failure as 502
pub fn bad_gateway() -> HttpResponse {
    plain_error(StatusCode::BAD_GATEWAY, UPSTREAM_FAILURE_MESSAGE)
}

fn plain_error(status: StatusCode, message: &'static str) -> HttpResponse {
    HttpResponse::build(status)
        .insert_header((header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"))
        .insert_header((header::ACCESS_CONTROL_ALLOW_METHODS, CORS_METHODS))
        .insert_header((header::ACCESS_CONTROL_ALLOW_HEADERS, CORS_ALLOWED_HEADERS))
        .insert_header((header::CONTENT_TYPE, "text/plain; charset=utf-8"))
        .body(message)
}

/// shapes a fetched origin response into the entry that is both returned
/// to the caller and stored: origin headers minus hop-by-hop ones, the
/// advisory cache-control, the cached-by marker and the cors triplet
pub fn store_entry(origin: Response<Bytes>, origin_url: &str) -> CachedResponse {
    let (parts, body) = origin.into_parts();

    let mut headers = HeaderMap::new();
    for (name, value) in parts.headers.iter() {
        if HOP_BY_HOP.contains(name) {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }

    // signed object-store urls sometimes come back without a content type;
    // fall back to guessing from the url's path extension
    if !headers.contains_key(header::CONTENT_TYPE) {
        let path = origin_url.split('?').next().unwrap_or(origin_url);
        let mime = mime_guess::from_path(path).first_or_octet_stream();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_str(mime.as_ref())
                .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
        );
    }

    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static(CACHE_CONTROL_VALUE),
    );
    headers.insert(
        HeaderName::from_static(CACHED_BY_HEADER),
        HeaderValue::from_static(CACHED_BY_VALUE),
    );
    cors_headers(&mut headers);

    CachedResponse {
        status: parts.status,
        headers,
        body,
    }
}

/// builds the outbound response from a shaped entry. hits get the
/// diagnostic HIT marker on top of the stored headers; HEAD responses
/// carry status and headers only.
pub fn respond(entry: &CachedResponse, include_body: bool, hit: bool) -> HttpResponse {
    let mut builder = HttpResponse::build(entry.status);
    for (name, value) in entry.headers.iter() {
        builder.append_header((name.clone(), value.clone()));
    }
    if hit {
        builder.insert_header((
            HeaderName::from_static(CACHE_STATUS_HEADER),
            HeaderValue::from_static("HIT"),
        ));
    }

    if include_body {
        builder.body(entry.body.clone())
    } else {
        builder.finish()
    }
}
