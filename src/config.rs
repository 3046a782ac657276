use std::net::SocketAddr;

use clap::{Args, Parser};

pub const SERVICE_NAME: &str = "post-publication-combiner";
pub const AUTHOR_NAME: &str = "Content Platforms Team <content-platforms@example.com>";

#[derive(Parser)]
#[clap(name = SERVICE_NAME)]
#[clap(author = AUTHOR_NAME)]
#[clap(about = "Joins content and metadata publication events into a combined downstream event")]
pub struct Cli {
    #[command(flatten, next_help_heading = "listen")]
    pub listen: ListenConfig,

    #[command(flatten, next_help_heading = "topics")]
    pub topics: TopicsConfig,

    #[command(flatten, next_help_heading = "kafka")]
    pub kafka: KafkaConfig,

    #[command(flatten, next_help_heading = "upstream")]
    pub upstream: UpstreamConfig,

    #[command(flatten, next_help_heading = "whitelist")]
    pub whitelist: WhitelistConfig,
}

#[derive(Args)]
pub struct ListenConfig {
    /// Port to listen on for the force-publish and admin HTTP surface
    #[clap(long, env = "PORT", default_value = "8080")]
    pub port: u16,
}

impl ListenConfig {
    pub fn socket_addr(&self) -> SocketAddr {
        ([0, 0, 0, 0], self.port).into()
    }
}

#[derive(Args)]
pub struct TopicsConfig {
    #[clap(long, env = "KAFKA_CONTENT_TOPIC_NAME", default_value = "PostPublicationEvents")]
    pub content_topic: String,

    #[clap(long, env = "KAFKA_METADATA_TOPIC_NAME", default_value = "PostConceptAnnotations")]
    pub metadata_topic: String,

    #[clap(long, env = "KAFKA_COMBINED_TOPIC_NAME", default_value = "CombinedPostPublicationEvents")]
    pub combined_topic: String,

    #[clap(
        long,
        env = "KAFKA_FORCED_COMBINED_TOPIC_NAME",
        default_value = "ForcedCombinedPostPublicationEvents"
    )]
    pub forced_combined_topic: String,
}

#[derive(Args)]
pub struct KafkaConfig {
    /// Address used by the queue consumer and producer to connect to the broker's REST proxy
    #[clap(long, env = "KAFKA_PROXY_ADDR", default_value = "http://localhost:8080")]
    pub kafka_proxy_address: String,

    /// Kafka proxy header, used for routing
    #[clap(long, env = "KAFKA_PROXY_HOST_HEADER", default_value = "kafka")]
    pub kafka_proxy_header: String,

    /// Consumer group used to read from the content queue
    #[clap(long, env = "KAFKA_PROXY_CONTENT_CONSUMER_GROUP", default_value = "content-post-publication-combiner")]
    pub kafka_content_consumer_group: String,

    /// Consumer group used to read from the metadata queue
    #[clap(
        long,
        env = "KAFKA_PROXY_METADATA_CONSUMER_GROUP",
        default_value = "metadata-post-publication-combiner"
    )]
    pub kafka_metadata_consumer_group: String,
}

#[derive(Args)]
pub struct UpstreamConfig {
    #[clap(long, env = "DOCUMENT_STORE_BASE_URL", default_value = "http://localhost:8080/__document-store-api")]
    pub doc_store_api_base_url: String,

    #[clap(long, env = "DOCUMENT_STORE_API_ENDPOINT", default_value = "/content/{uuid}")]
    pub doc_store_api_endpoint: String,

    #[clap(
        long,
        env = "PUBLIC_ANNOTATIONS_API_BASE_URL",
        default_value = "http://localhost:8080/__public-annotations-api"
    )]
    pub public_annotations_api_base_url: String,

    #[clap(long, env = "PUBLIC_ANNOTATIONS_API_ENDPOINT", default_value = "/content/{uuid}/annotations")]
    pub public_annotations_api_endpoint: String,
}

impl UpstreamConfig {
    pub fn doc_store_template(&self) -> String {
        format!("{}{}", self.doc_store_api_base_url, self.doc_store_api_endpoint)
    }

    pub fn public_annotations_template(&self) -> String {
        format!(
            "{}{}",
            self.public_annotations_api_base_url, self.public_annotations_api_endpoint
        )
    }
}

#[derive(Args)]
pub struct WhitelistConfig {
    /// Origin-System-Id substrings accepted from the metadata queue
    #[clap(
        long,
        value_delimiter = ',',
        default_value = "http://cmdb.ft.com/systems/pac,http://cmdb.ft.com/systems/methode-web-pub,http://cmdb.ft.com/systems/next-video-editor"
    )]
    pub whitelisted_metadata_origin_system_headers: Vec<String>,

    /// contentUri substrings accepted from the content queue
    #[clap(
        long,
        value_delimiter = ',',
        default_value = "methode-article-mapper,wordpress-article-mapper,next-video-mapper,upp-content-validator"
    )]
    pub whitelisted_content_uris: Vec<String>,

    /// Exact-match content types accepted by the forwarder; empty string is a legal element
    #[clap(long, value_delimiter = ',', default_value = "Article,Video,MediaResource,")]
    pub whitelisted_content_types: Vec<String>,
}
