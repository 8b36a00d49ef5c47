pub mod article_worker;
pub mod embedding_client;
pub mod extract;
pub mod feed_poller;
pub mod http;
pub mod llm_chunker;
pub mod url_policy;
