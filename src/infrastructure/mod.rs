// Infrastructure layer - External dependencies and adapters
pub mod config;
pub mod erp_dispatcher;
pub mod mock_provider;
pub mod openai_client;
pub mod series_input;
