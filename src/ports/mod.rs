pub mod http_client;
pub mod reload_trigger;
