use crate::cache::{CacheStore, MokaStore};
use crate::classify::{classify, Classified};
use crate::config::Config;
use crate::fetcher::{OriginFetch, OriginFetcher};
use crate::shape;
use crate::tls::load_rustls_config;
use crate::util::{RelayError, Result};

use actix_web::{
    middleware::Logger, // provides access logging
    rt,
    web,
    App,
    HttpRequest,
    HttpResponse,
    HttpServer,
    Responder,
};
use log::{debug, error, info};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

// cache statistics tracker, surfaced via /health
#[derive(Default)]
struct CacheStats {
    hits: usize,
    misses: usize,
}

struct AppState {
    fetcher: Arc<dyn OriginFetch>,
    store: Arc<dyn CacheStore>,
    allowed_host_fragments: Vec<String>,
    cache_stats: Mutex<CacheStats>,
}

/// the single proxy handler: classify, consult the store, fetch on miss,
/// detach the populate and shape the response
async fn relay(req: HttpRequest, state: web::Data<AppState>) -> HttpResponse {
    let start_time = Instant::now();

    let classified = match classify(req.method(), req.path(), &state.allowed_host_fragments) {
        Ok(classified) => classified,
        Err(rejection) => {
            debug!(
                "rejected {} {}: {}",
                req.method(),
                req.path(),
                rejection.message
            );
            return shape::rejection(&rejection);
        }
    };

    let (origin_url, include_body) = match classified {
        Classified::Preflight => return shape::preflight(),
        Classified::Proxy {
            origin_url,
            include_body,
        } => (origin_url, include_body),
    };

    // cache key is the full request url as received at the edge; GET and
    // HEAD share one slot since HEAD is the headers-only subset of GET
    let cache_key = {
        let conn = req.connection_info();
        format!("{}://{}{}", conn.scheme(), conn.host(), req.uri())
    };

    if let Some(entry) = state.store.lookup(&cache_key).await {
        state.cache_stats.lock().unwrap().hits += 1;
        debug!("cache hit for: {}", cache_key);
        info!(
            "{} {} -> {} {}ms (cached)",
            req.method(),
            req.uri(),
            entry.status,
            start_time.elapsed().as_millis()
        );
        return shape::respond(&entry, include_body, true);
    }

    state.cache_stats.lock().unwrap().misses += 1;
    debug!("cache miss for: {}", cache_key);

    let origin_response = match state.fetcher.fetch(&origin_url).await {
        Ok(response) => response,
        Err(cause) => {
            error!("origin fetch failed for {}: {}", origin_url, cause);
            info!(
                "{} {} -> 502 {}ms (origin failure)",
                req.method(),
                req.uri(),
                start_time.elapsed().as_millis()
            );
            return shape::bad_gateway();
        }
    };

    let entry = Arc::new(shape::store_entry(origin_response, &origin_url));

    // the response returns without waiting for the store write; the
    // spawned task stays on the worker's runtime until it completes
    {
        let store = Arc::clone(&state.store);
        let entry = Arc::clone(&entry);
        rt::spawn(async move {
            store.populate(cache_key, entry).await;
        });
    }

    info!(
        "{} {} -> {} {}ms",
        req.method(),
        req.uri(),
        entry.status,
        start_time.elapsed().as_millis()
    );
    shape::respond(&entry, include_body, false)
}

async fn health_check(state: web::Data<AppState>) -> impl Responder {
    let (hits, misses) = {
        let stats = state.cache_stats.lock().unwrap();
        (stats.hits, stats.misses)
    };
    let items = state.store.len().await;
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "cache": {
            "hits": hits,
            "misses": misses,
            "items": items,
            "hit_ratio": if hits + misses > 0 {
                hits as f32 / (hits + misses) as f32
            } else {
                0.0
            }
        }
    }))
}

pub async fn run(config: Config) -> Result<()> {
    let app_config = Arc::new(config.clone()); // arc for sharing config across httpserver threads

    let fetcher: Arc<dyn OriginFetch> = Arc::new(OriginFetcher::new(&app_config));
    let store: Arc<dyn CacheStore> = Arc::new(MokaStore::new(
        app_config.cache_size_mb,
        app_config.cache_ttl_seconds,
    ));

    // appstate is constructed once and cloned by actix for each worker thread
    let app_state_data = web::Data::new(AppState {
        fetcher,
        store,
        allowed_host_fragments: app_config.allowed_host_fragments.clone(),
        cache_stats: Mutex::new(CacheStats::default()),
    });

    let num_workers = num_cpus::get();
    info!(
        "imgrelay starting on {} with {} workers",
        app_config.listen_addr, num_workers
    );
    info!(
        "allow-listed origin fragments: {:?}",
        app_config.allowed_host_fragments
    );
    if app_config.is_tls_enabled() {
        info!("tls is enabled.");
    } else {
        info!("tls is disabled (http only).");
    }

    let server_builder = HttpServer::new(move || {
        App::new()
            .app_data(app_state_data.clone()) // clones the web::Data<AppState> for this worker
            .wrap(Logger::default())
            // non-GET methods on /health (OPTIONS preflight included) fall
            // through to the classifier like any other path
            .service(
                web::resource("/health")
                    .route(web::get().to(health_check))
                    .default_service(web::to(relay)),
            )
            .default_service(web::to(relay))
    })
    .keep_alive(Duration::from_secs(75))
    .workers(num_workers);

    let server = if app_config.is_tls_enabled() {
        let tls_rustls_config = load_rustls_config(&app_config)?.ok_or_else(|| {
            RelayError::TlsConfig("tls enabled but rustls config failed to load".to_string())
        })?;
        server_builder
            .bind_rustls(&app_config.listen_addr, tls_rustls_config)
            .map_err(RelayError::Io)?
    } else {
        server_builder
            .bind(&app_config.listen_addr)
            .map_err(RelayError::Io)?
    };

    // graceful shutdown with a bounded drain period
    let server = server.shutdown_timeout(30);

    server.run().await.map_err(RelayError::Io)
}
