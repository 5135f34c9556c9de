use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Config {
    #[clap(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:8080")]
    pub listen_addr: String,

    /// substrings the decoded origin url must contain (comma separated)
    #[clap(
        long,
        env = "ALLOWED_HOST_FRAGMENTS",
        value_delimiter = ',',
        default_values_t = vec![
            "prod-files-secure.s3.us-west-2.amazonaws.com".to_string(),
            "secure.notion-static.com".to_string(),
        ]
    )]
    pub allowed_host_fragments: Vec<String>,

    /// cache ttl
    #[clap(long, env = "CACHE_TTL_SECONDS", default_value_t = 604800)]
    pub cache_ttl_seconds: u64,

    /// max cache size in mb
    #[clap(long, env = "CACHE_SIZE_MB", default_value_t = 512)]
    pub cache_size_mb: u64,

    /// upper bound on a single origin fetch
    #[clap(long, env = "FETCH_TIMEOUT_SECONDS", default_value_t = 10)]
    pub fetch_timeout_seconds: u64,

    /// tls cert path
    #[clap(long = "tls-cert", env = "TLS_CERT_PATH")]
    pub tls_cert_path: Option<PathBuf>,

    /// tls key path
    #[clap(long = "tls-key", env = "TLS_KEY_PATH")]
    pub tls_key_path: Option<PathBuf>,
}

impl Config {
    pub fn load() -> Self {
        Config::parse()
    }

    pub fn is_tls_enabled(&self) -> bool {
        self.tls_cert_path.is_some() && self.tls_key_path.is_some()
    }
}
