use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("hyper error: {0}")]
    Hyper(#[from] hyper::Error),

    #[error("http error: {0}")]
    Http(#[from] http::Error),

    #[error("uri parse error: {0}")]
    UriParse(#[from] http::uri::InvalidUri),

    #[error("url parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("invalid header value: {0}")]
    InvalidHeaderValue(#[from] http::header::InvalidHeaderValue),

    #[error("origin returned status {0}")]
    UpstreamStatus(http::StatusCode),

    #[error("origin fetch timed out after {0}s")]
    UpstreamTimeout(u64),

    #[error("tls configuration error: {0}")]
    TlsConfig(String),
}

pub type Result<T> = std::result::Result<T, RelayError>;

pub fn setup_logger() {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));
}
