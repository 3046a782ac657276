mod admin;
mod broker;
mod combiner;
mod config;
mod consumer;
mod errors;
mod forwarder;
mod http_fetch;
mod model;
mod processor;
mod request_processor;

use std::sync::Arc;

use axum::routing::post;
use axum::Router;
use clap::Parser;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use admin::AdminState;
use broker::{RestProxyConsumer, RestProxyProducer};
use combiner::Combiner;
use config::Cli;
use consumer::{ChannelMessage, ConsumerAdapter, TopicTag, CHANNEL_CAPACITY};
use forwarder::Forwarder;
use http_fetch::HttpFetcher;
use processor::StreamProcessor;
use request_processor::RequestProcessor;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt().json().flatten_event(true).init();

    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let content_fetcher = Arc::new(HttpFetcher::new(client.clone(), cli.upstream.doc_store_template()));
    let annotations_fetcher = Arc::new(HttpFetcher::new(
        client.clone(),
        cli.upstream.public_annotations_template(),
    ));

    let stream_combiner = Combiner::new(content_fetcher.clone(), annotations_fetcher.clone());
    let stream_producer = RestProxyProducer::new(client.clone(), &cli.kafka, &cli.topics.combined_topic);
    let stream_forwarder = Forwarder::new(
        Box::new(stream_producer),
        cli.whitelist.whitelisted_content_types.clone(),
    );

    let stream_processor = Arc::new(StreamProcessor::new(
        stream_combiner,
        stream_forwarder,
        cli.whitelist.whitelisted_content_uris.clone(),
        cli.whitelist.whitelisted_metadata_origin_system_headers.clone(),
    ));

    let forced_combiner = Combiner::new(content_fetcher.clone(), annotations_fetcher.clone());
    let forced_producer = RestProxyProducer::new(client.clone(), &cli.kafka, &cli.topics.forced_combined_topic);
    let forced_forwarder = Forwarder::new(
        Box::new(forced_producer),
        cli.whitelist.whitelisted_content_types.clone(),
    );
    let request_processor = Arc::new(RequestProcessor::new(forced_combiner, forced_forwarder));

    let admin_state = Arc::new(AdminState::new(
        client.clone(),
        cli.kafka.kafka_proxy_address.clone(),
        cli.upstream.doc_store_api_base_url.clone(),
        cli.upstream.public_annotations_api_base_url.clone(),
    ));

    let (tx, rx) = mpsc::channel::<ChannelMessage>(CHANNEL_CAPACITY);

    let mut content_adapter = ConsumerAdapter::new(TopicTag::Content);
    content_adapter.start(
        Box::new(RestProxyConsumer::new(
            client.clone(),
            &cli.kafka,
            &cli.kafka.kafka_content_consumer_group,
            &cli.topics.content_topic,
        )),
        tx.clone(),
    );

    let mut metadata_adapter = ConsumerAdapter::new(TopicTag::Metadata);
    metadata_adapter.start(
        Box::new(RestProxyConsumer::new(
            client.clone(),
            &cli.kafka,
            &cli.kafka.kafka_metadata_consumer_group,
            &cli.topics.metadata_topic,
        )),
        tx,
    );

    let processor_token = CancellationToken::new();
    let processor_handle = tokio::spawn({
        let stream_processor = stream_processor.clone();
        let token = processor_token.clone();
        async move { stream_processor.run(rx, token).await }
    });

    let app = Router::new()
        .route("/:uuid", post(request_processor::post_force_publish))
        .with_state(request_processor)
        .merge(admin::router(admin_state));

    let addr = cli.listen.socket_addr();
    info!(%addr, "listening");

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("http server stopped, draining consumers");
    content_adapter.stop().await;
    metadata_adapter.stop().await;

    info!("consumers drained, stopping stream processor");
    processor_token.cancel();
    let _ = processor_handle.await;

    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let mut terminate = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {},
        _ = terminate.recv() => {},
    }
}
