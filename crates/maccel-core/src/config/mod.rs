// Maccel Configuration

mod parser;

pub use parser::{
    Config, ConfigError, ConfigToml, GeneralConfig, InputSourceToml, Strategy, SuppressConfig,
    TapToml,
};
