use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use webpush_crypto::{KeyPair, VapidHeaderStyle, VapidSigner};

#[derive(Debug, Deserialize)]
pub struct CliConfig {
    pub vapid: VapidSection,
    #[serde(default)]
    pub push: PushSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

#[derive(Debug, Deserialize)]
pub struct VapidSection {
    /// base64url raw P-256 scalar.
    pub private_key: String,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub header_style: VapidHeaderStyle,
    /// Token lifetime in seconds. Default: 3600, max 86400.
    #[serde(default = "default_token_ttl")]
    pub token_ttl: u64,
}

fn default_token_ttl() -> u64 {
    3600
}

#[derive(Debug, Deserialize)]
pub struct PushSection {
    /// `TTL` request header in seconds.
    #[serde(default = "default_push_ttl")]
    pub ttl: u32,
}

fn default_push_ttl() -> u32 {
    webpush_proto::request::DEFAULT_TTL
}

impl Default for PushSection {
    fn default() -> Self {
        Self {
            ttl: default_push_ttl(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoggingSection {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl CliConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }
}

impl VapidSection {
    /// Build the signer described by this section.
    pub fn signer(&self) -> Result<VapidSigner, webpush_crypto::CryptoError> {
        let keypair = KeyPair::from_base64url(&self.private_key)?;
        let mut signer = VapidSigner::new(keypair)
            .with_header_style(self.header_style)
            .with_token_ttl(Duration::from_secs(self.token_ttl))?;
        if let Some(subject) = &self.subject {
            signer = signer.with_subject(subject.clone());
        }
        Ok(signer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_KEY: &str = "yfWPiYE-n46HLnH0KqZOF1fJJU3MYrct3AELtAQ-oRw";

    #[test]
    fn parse_minimal_config() {
        let toml_str = format!(
            r#"
            [vapid]
            private_key = "{TEST_KEY}"
        "#
        );
        let config: CliConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(config.vapid.private_key, TEST_KEY);
        assert_eq!(config.vapid.subject, None);
        assert_eq!(config.vapid.header_style, VapidHeaderStyle::Vapid); // default
        assert_eq!(config.vapid.token_ttl, 3600); // default
        // push section defaults when absent
        assert_eq!(config.push.ttl, 86400);
        // logging section defaults when absent
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn parse_full_config() {
        let toml_str = format!(
            r#"
            [vapid]
            private_key = "{TEST_KEY}"
            subject = "mailto:ops@example.org"
            header_style = "web-push"
            token_ttl = 600

            [push]
            ttl = 30

            [logging]
            level = "debug"
        "#
        );
        let config: CliConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(config.vapid.header_style, VapidHeaderStyle::WebPush);
        assert_eq!(config.vapid.token_ttl, 600);
        assert_eq!(config.push.ttl, 30);
        assert_eq!(config.logging.level, "debug");

        let signer = config.vapid.signer().unwrap();
        assert_eq!(signer.header_style(), VapidHeaderStyle::WebPush);
        assert_eq!(signer.token_ttl(), Duration::from_secs(600));
    }

    #[test]
    fn unknown_header_style_rejected() {
        let toml_str = format!(
            r#"
            [vapid]
            private_key = "{TEST_KEY}"
            header_style = "bearer"
        "#
        );
        assert!(toml::from_str::<CliConfig>(&toml_str).is_err());
    }

    #[test]
    fn overlong_token_ttl_rejected() {
        let section = VapidSection {
            private_key: TEST_KEY.into(),
            subject: None,
            header_style: VapidHeaderStyle::Vapid,
            token_ttl: 90_000,
        };
        assert!(section.signer().is_err());
    }

    #[test]
    fn bad_private_key_rejected() {
        let section = VapidSection {
            private_key: "AAAA".into(),
            subject: None,
            header_style: VapidHeaderStyle::Vapid,
            token_ttl: 3600,
        };
        assert!(section.signer().is_err());
    }
}
