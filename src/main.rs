//! imgrelay - an edge image cache proxy
//!
//! wraps expiring, signed object-storage urls into stable, cacheable,
//! cors-permissive resources:
//! - /proxy/{base64-encoded-url} request surface
//! - read-through in-memory caching
//! - TLS termination
//!

mod cache;
mod classify;
mod config;
mod fetcher;
mod server;
mod shape;
mod tls;
mod util;

use config::Config;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    util::setup_logger();

    let config = Config::load();

    server::run(config)
        .await
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))
}
