pub mod chunking_service;
pub mod embedding_service;
pub mod fts_service;
pub mod runner;
