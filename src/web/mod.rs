pub mod api;
pub mod relay;
pub mod server;

pub use api::ApiState;
pub use relay::RelayForwarder;
pub use server::WebServer;
