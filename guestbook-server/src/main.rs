mod config;

use std::net::SocketAddr;

use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::Layer;
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use rustls::crypto::ring::default_provider;

use guestbook_api::{ApiState, router};
use guestbook_core::Guestbook;
use guestbook_database::{CacheService, Database, KvStore};
use guestbook_moderation::{ModerationChain, WordlistSource};

use config::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let fmt_layer = tracing_subscriber::fmt::layer().with_filter(filter_fn(|metadata| {
        let target = metadata.target();

        let within_info_level = *metadata.level() <= tracing::Level::INFO;
        if !within_info_level {
            return false;
        }

        !(target.starts_with("hyper") || target.starts_with("h2"))
    }));

    tracing_subscriber::registry().with(fmt_layer).init();

    default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("failed to install rustls ring provider"))?;

    dotenvy::dotenv().ok();

    let config = ServerConfig::from_env();

    let store = connect_store(&config).await;
    let mut cache = if config.cache_enabled {
        CacheService::new(store.clone(), config.key_prefix.clone())
    } else {
        info!("Page cache disabled (set CACHE_ENABLED=true to enable).");
        CacheService::disabled(config.key_prefix.clone())
    };
    cache.configure_page_ttl(config.page_cache_ttl);

    let mut db = Database::with_cache(store, cache, config.key_prefix.clone());
    db.configure_rate_limit(config.write_rate_limit);
    db.configure_rate_limit(config.read_rate_limit);
    for action in [config.write_rate_limit.action, config.read_rate_limit.action] {
        let policy = db.rate_limits().policy(action);
        info!(
            action = action.as_str(),
            max_hits = policy.max_hits,
            window_seconds = policy.window.as_secs(),
            "Rate limit configured."
        );
    }

    let moderation = ModerationChain::from_env()?;
    match moderation.classifier() {
        Some(classifier) => info!(
            endpoint = classifier.endpoint(),
            failure_mode = %moderation.classifier_failure(),
            "Remote classifier enabled."
        ),
        None => info!("Remote classifier disabled (set CLASSIFIER_URL to enable)."),
    }
    let wordlist = match moderation.lexical().source() {
        WordlistSource::Preset => "built-in".to_owned(),
        WordlistSource::File(path) => path.display().to_string(),
    };
    info!(
        %wordlist,
        failure_mode = %moderation.lexical_failure(),
        "Lexical filter ready."
    );

    let app = router(ApiState {
        guestbook: Guestbook::new(db, moderation),
        trust_proxy_headers: config.trust_proxy_headers,
    })
    .layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(tracing::Level::INFO))
            .on_response(DefaultOnResponse::new().level(tracing::Level::INFO)),
    );

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Guestbook listening.");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

async fn connect_store(config: &ServerConfig) -> KvStore {
    if !config.redis_enabled {
        info!("Redis disabled (set REDIS_ENABLED=true to enable); using in-memory store.");
        return KvStore::memory();
    }

    let Some(redis_url) = config.redis_url.as_deref() else {
        warn!(key_prefix = %config.key_prefix, "REDIS_ENABLED=true but REDIS_URL is missing; using in-memory store.");
        return KvStore::memory();
    };

    let store = match KvStore::redis(redis_url) {
        Ok(store) => store,
        Err(err) => {
            warn!(?err, key_prefix = %config.key_prefix, "Failed to initialize Redis; using in-memory store.");
            return KvStore::memory();
        }
    };

    if let Err(err) = store.ping().await {
        warn!(
            ?err,
            "Redis ping failed; store operations will report database errors until it recovers."
        );
    } else {
        info!(key_prefix = %config.key_prefix, "Redis store enabled.");
    }

    store
}
