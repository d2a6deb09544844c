//! Command-line arguments.

use std::net::IpAddr;

use clap::{Parser, Subcommand};

/// Pelecard gateway tool.
#[derive(Debug, Parser)]
#[command(name = "pelecard", version, about = "Pelecard payment gateway tool", long_about = None)]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, global = true, env = "PELECARD_CONFIG", default_value = pelecard::config::DEFAULT_CONFIG_PATH)]
    pub config: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the webhook listener.
    Serve {
        /// Bind address, overriding the configuration.
        #[arg(long, env = "HOST")]
        host: Option<IpAddr>,

        /// Port, overriding the configuration.
        #[arg(long, env = "PORT")]
        port: Option<u16>,
    },

    /// Call a gateway endpoint with the configured credentials.
    Call {
        /// Operation name (e.g. `charge`) or gateway path (e.g. `DebitRegularType`).
        endpoint: String,

        /// Request fields as a JSON object with snake_case keys.
        #[arg(long, default_value = "{}")]
        data: String,

        /// Exit with an error when the gateway declines.
        #[arg(long)]
        throw: bool,
    },

    /// List gateway endpoints and their required fields.
    Endpoints,

    /// Show the webhook URL and setup instructions.
    WebhookInfo {
        /// Public base URL of this listener, e.g. `https://shop.example`.
        #[arg(long)]
        base_url: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_call() {
        let cli = Cli::try_parse_from([
            "pelecard",
            "call",
            "charge",
            "--data",
            r#"{"amount":100}"#,
            "--throw",
        ])
        .unwrap();
        match cli.command {
            Command::Call {
                endpoint,
                data,
                throw,
            } => {
                assert_eq!(endpoint, "charge");
                assert_eq!(data, r#"{"amount":100}"#);
                assert!(throw);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_serve_overrides() {
        let cli =
            Cli::try_parse_from(["pelecard", "serve", "--host", "127.0.0.1", "--port", "9000"])
                .unwrap();
        match cli.command {
            Command::Serve { host, port } => {
                assert_eq!(host, Some("127.0.0.1".parse().unwrap()));
                assert_eq!(port, Some(9000));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_webhook_info() {
        let cli = Cli::try_parse_from([
            "pelecard",
            "webhook-info",
            "--base-url",
            "https://shop.example",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Command::WebhookInfo { base_url: Some(ref url) } if url == "https://shop.example"
        ));
    }

    #[test]
    fn test_unknown_command_rejected() {
        assert!(Cli::try_parse_from(["pelecard", "refund-everything"]).is_err());
    }
}
