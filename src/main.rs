//! NoteWave server binary: wire the providers together and serve HTTP.

use notewave::api::{self, AppState};
use notewave::config::Config;
use notewave::embedding::{BatchScheduler, FailurePolicy, HttpEmbeddingClient};
use notewave::extract::PlainTextExtractor;
use notewave::generation::OpenAiCompatClient;
use notewave::logging;
use notewave::metrics::IngestMetrics;
use notewave::processing::{IngestionPipeline, RetrievalService};
use notewave::speech::{DeepgramClient, ElevenLabsClient};
use notewave::store::PineconeStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let config = Config::from_env().expect("Failed to load configuration");
    logging::init_tracing(config.log_file.as_deref());
    let state = build_state(&config).expect("Failed to initialize providers");
    let app = api::create_router(Arc::new(state));

    let (listener, port) = bind_listener(&config)
        .await
        .expect("Failed to bind listener");
    tracing::info!("Listening on http://0.0.0.0:{}", port);
    axum::serve(listener, app).await.expect("Server exited");
}

fn build_state(config: &Config) -> Result<AppState, Box<dyn std::error::Error>> {
    let embedding = Arc::new(
        HttpEmbeddingClient::new(
            &config.embedding_url,
            &config.embedding_api_key,
            config.embedding_dimension,
        )?,
    );
    let store: Arc<PineconeStore> = Arc::new(PineconeStore::new(
        &config.vector_index_url,
        &config.vector_index_api_key,
    )?);
    let generation = Arc::new(OpenAiCompatClient::new(
        &config.generation_url,
        &config.generation_api_key,
        &config.generation_model,
    )?);
    let synthesizer = Arc::new(ElevenLabsClient::new(&config.tts_url, &config.tts_api_key)?);
    let transcriber = Arc::new(DeepgramClient::new(
        &config.transcribe_url,
        &config.transcribe_api_key,
    )?);
    let metrics = Arc::new(IngestMetrics::new());

    let scheduler = BatchScheduler::new(
        embedding.clone(),
        config.embed_batch_size,
        Duration::from_millis(config.embed_batch_delay_ms),
        FailurePolicy::AbortAll,
    );
    let pipeline = IngestionPipeline::new(
        Arc::new(PlainTextExtractor),
        scheduler,
        store.clone(),
        metrics.clone(),
        config.chunk_size,
        config.chunk_overlap,
    );
    let retrieval = RetrievalService::new(embedding, store.clone());

    Ok(AppState {
        pipeline,
        retrieval,
        store,
        generation,
        synthesizer,
        transcriber,
        metrics,
        max_upload_bytes: config.max_upload_bytes,
    })
}

async fn bind_listener(config: &Config) -> Result<(TcpListener, u16), std::io::Error> {
    use std::net::Ipv4Addr;

    if let Some(port) = config.server_port {
        return TcpListener::bind((Ipv4Addr::UNSPECIFIED, port))
            .await
            .map(|listener| (listener, port));
    }

    const PORT_RANGE: std::ops::RangeInclusive<u16> = 4300..=4399;
    for port in PORT_RANGE {
        match TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).await {
            Ok(listener) => {
                tracing::debug!(port, "Bound server port");
                return Ok((listener, port));
            }
            Err(err) if err.kind() == std::io::ErrorKind::AddrInUse => {
                tracing::debug!(port, "Port already in use; trying next");
                continue;
            }
            Err(err) => return Err(err),
        }
    }

    Err(std::io::Error::new(
        std::io::ErrorKind::AddrNotAvailable,
        "No available port found in range 4300-4399",
    ))
}
