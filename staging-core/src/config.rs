//! runtime configs

pub mod cli {
    //! Parse from either cli or env var

    /// tokio worker thread name
    pub static DEFAULT_THREAD_NAME: &str = "serverbot-worker";
    /// the default path to config
    pub static DEFAULT_CONFIG_PATH: &str = "/var/lib/serverbot/config.yaml";
    /// Default channel size for the in-process transport
    pub const DEFAULT_CHANNEL_SIZE: usize = 1_024;
    /// default log level. Can use this argument or SERVERBOT_LOG env var
    pub const DEFAULT_SERVERBOT_LOG: &str = "info";

    use std::path::PathBuf;

    pub use clap::Parser;

    #[derive(Parser, Debug, Clone, PartialEq, Eq)]
    #[clap(author, name = "serverbot", bin_name = "serverbot", about, long_about = None)]
    /// parses from cli & environment var. serverbot will load `.env` in the same
    /// dir as the binary as well
    pub struct Config {
        /// path to the server catalog config
        #[clap(
            short,
            long,
            value_parser,
            env,
            default_value = DEFAULT_CONFIG_PATH
        )]
        pub config_path: PathBuf,
        /// number of worker threads, defaults to the number of logical CPUs
        #[clap(long, env, value_parser)]
        pub threads: Option<usize>,
        /// Worker thread name
        #[clap(long, env, value_parser, default_value = DEFAULT_THREAD_NAME)]
        pub thread_name: String,
        /// channel size for the in-process transport
        #[clap(long, env, value_parser, default_value_t = DEFAULT_CHANNEL_SIZE)]
        pub channel_size: usize,
        /// set the log level. All valid RUST_LOG arguments are accepted
        #[clap(long, env, value_parser, default_value = DEFAULT_SERVERBOT_LOG)]
        pub serverbot_log: String,
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_defaults() {
            let cfg = Config::try_parse_from(["serverbot"]).unwrap();
            assert_eq!(cfg.config_path, PathBuf::from(DEFAULT_CONFIG_PATH));
            assert_eq!(cfg.threads, None);
            assert_eq!(cfg.channel_size, DEFAULT_CHANNEL_SIZE);
        }

        #[test]
        fn test_args() {
            let cfg = Config::try_parse_from([
                "serverbot",
                "-c",
                "/tmp/servers.yaml",
                "--threads",
                "2",
                "--serverbot-log",
                "debug",
            ])
            .unwrap();
            assert_eq!(cfg.config_path, PathBuf::from("/tmp/servers.yaml"));
            assert_eq!(cfg.threads, Some(2));
            assert_eq!(cfg.serverbot_log, "debug");
        }
    }
}

pub mod trace {
    //! tracing configuration. Logs go to stderr, stdout belongs to the stdio transport
    use std::{fmt, str::FromStr};

    use anyhow::Result;
    use env_parser::parse_var_with_err;
    use tracing_subscriber::{
        filter::EnvFilter,
        fmt::{
            self as layer_fmt,
            format::{Format, PrettyFields},
        },
        prelude::__tracing_subscriber_SubscriberExt,
        util::SubscriberInitExt,
    };

    /// log output style, read from `LOG_FORMAT`
    #[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
    pub enum LogFormat {
        /// unstructured single lines
        #[default]
        Standard,
        /// one JSON object per event
        Json,
        /// multi-line, human readable
        Pretty,
    }

    impl FromStr for LogFormat {
        type Err = UnknownLogFormat;

        fn from_str(s: &str) -> Result<Self, Self::Err> {
            match s.trim().to_ascii_lowercase().as_str() {
                "standard" => Ok(LogFormat::Standard),
                "json" => Ok(LogFormat::Json),
                "pretty" => Ok(LogFormat::Pretty),
                _ => Err(UnknownLogFormat(s.to_owned())),
            }
        }
    }

    impl fmt::Display for LogFormat {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(match self {
                LogFormat::Standard => "standard",
                LogFormat::Json => "json",
                LogFormat::Pretty => "pretty",
            })
        }
    }

    /// `LOG_FORMAT` held something other than standard, json or pretty
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct UnknownLogFormat(String);

    impl fmt::Display for UnknownLogFormat {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(
                f,
                "unknown log format {:?}, expected standard, json or pretty",
                self.0
            )
        }
    }

    impl std::error::Error for UnknownLogFormat {}

    /// Logging setup, installs the global subscriber
    #[derive(Debug)]
    pub struct Config {
        /// formatting applied to logs
        pub log_format: LogFormat,
    }

    impl Config {
        /// Install the global subscriber. `serverbot_log` is an `EnvFilter`
        /// directive, an invalid one falls back to `info`
        pub fn parse(serverbot_log: &str) -> Result<Self> {
            let log_format: LogFormat = parse_var_with_err("LOG_FORMAT", LogFormat::default())?;
            let filter =
                EnvFilter::try_new(serverbot_log).or_else(|_| EnvFilter::try_new("info"))?;
            let registry = tracing_subscriber::registry().with(filter);

            match log_format {
                LogFormat::Json => registry
                    .with(layer_fmt::layer().json().with_writer(std::io::stderr))
                    .init(),
                LogFormat::Pretty => registry
                    .with(
                        layer_fmt::layer()
                            .event_format(Format::default().pretty().with_source_location(false))
                            .fmt_fields(PrettyFields::new())
                            .with_writer(std::io::stderr),
                    )
                    .init(),
                LogFormat::Standard => registry
                    .with(layer_fmt::layer().with_writer(std::io::stderr))
                    .init(),
            }

            Ok(Self { log_format })
        }
    }

}
