pub use self::parser::{
    ChannexConfig, Config, DatabaseConfig, DbType, LoggingConfig, RoomMappingEntry, RoomsConfig,
    ServerConfig, WebhookConfig,
};
pub use self::validator::ConfigError;

mod parser;
mod validator;
