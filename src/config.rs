//! Client configuration: server endpoint, TLS material, identity answers.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;

/// Identity answers served after authentication.
///
/// Defaults mirror the record the client was originally deployed with; any
/// field can be overridden in the config file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Identity {
    pub full_name: String,
    pub email: String,
    pub mail_count: String,
    pub country: String,
    pub birthdate: String,
    pub skype: String,
    pub address_count: String,
    pub address_line1: String,
    pub address_line2: String,
}

impl Default for Identity {
    fn default() -> Self {
        Self {
            full_name: "Deepak Shivanandham".to_owned(),
            email: "deepakshivanandham@hotmail.com".to_owned(),
            mail_count: "1".to_owned(),
            country: "india".to_owned(),
            birthdate: "06.02.1991".to_owned(),
            skype: "NA".to_owned(),
            address_count: "2".to_owned(),
            address_line1: "25, GAJALAKSHMI NAGAR 1st CROSS STREET".to_owned(),
            address_line2: "CHROMPET,CHENNAI, TAMILNADU".to_owned(),
        }
    }
}

impl Identity {
    /// Answer for an identity verb, if the verb is known.
    pub fn answer(&self, verb: &str) -> Option<&str> {
        match verb {
            "NAME" => Some(&self.full_name),
            "MAILNUM" => Some(&self.mail_count),
            "MAIL1" => Some(&self.email),
            "SKYPE" => Some(&self.skype),
            "BIRTHDATE" => Some(&self.birthdate),
            "COUNTRY" => Some(&self.country),
            "ADDRNUM" => Some(&self.address_count),
            "ADDRLINE1" => Some(&self.address_line1),
            "ADDRLINE2" => Some(&self.address_line2),
            _ => None,
        }
    }
}

/// Complete client configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// Server hostname or IP address.
    pub address: String,
    /// Ports tried round-robin when connecting.
    pub ports: Vec<u16>,
    /// Path to the CA certificate bundle (PEM) used to verify the server.
    pub ca_cert: String,
    /// Optional client certificate chain (PEM) for mutual TLS.
    #[serde(default)]
    pub client_cert: Option<String>,
    /// Optional client private key (PEM) for mutual TLS.
    #[serde(default)]
    pub client_key: Option<String>,
    /// Hostname used for TLS verification and SNI; defaults to `address`.
    #[serde(default)]
    pub server_name: Option<String>,
    /// Identity answers served after authentication.
    #[serde(default)]
    pub identity: Identity,
}

impl ClientConfig {
    /// Load and validate a TOML config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config: Self = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Assemble a config from direct command-line arguments.
    pub fn from_args(address: String, port: u16, ca_cert: String) -> Result<Self, ConfigError> {
        let config = Self {
            address,
            ports: vec![port],
            ca_cert,
            client_cert: None,
            client_key: None,
            server_name: None,
            identity: Identity::default(),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.address.is_empty() {
            return Err(ConfigError::Invalid("address must not be empty".into()));
        }
        if self.ports.is_empty() {
            return Err(ConfigError::Invalid("at least one port is required".into()));
        }
        if self.ca_cert.is_empty() {
            return Err(ConfigError::Invalid("ca_cert must not be empty".into()));
        }
        if self.client_cert.is_some() != self.client_key.is_some() {
            return Err(ConfigError::Invalid(
                "client_cert and client_key must be set together".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_config_with_defaults() {
        let config: ClientConfig = toml::from_str(
            r#"
            address = "127.0.0.1"
            ports = [8443]
            ca_cert = "certs/ca.pem"
            "#,
        )
        .expect("parse");
        config.validate().expect("validate");
        assert_eq!(config.ports, vec![8443]);
        assert!(config.server_name.is_none());
        assert_eq!(config.identity.full_name, "Deepak Shivanandham");
        assert_eq!(config.identity.skype, "NA");
    }

    #[test]
    fn identity_section_overrides_fields() {
        let config: ClientConfig = toml::from_str(
            r#"
            address = "challenge.example.net"
            ports = [8443, 8444]
            ca_cert = "ca.pem"
            server_name = "challenge.example.net"

            [identity]
            full_name = "Jane Doe"
            country = "germany"
            "#,
        )
        .expect("parse");
        assert_eq!(config.identity.full_name, "Jane Doe");
        assert_eq!(config.identity.country, "germany");
        // untouched fields keep their defaults
        assert_eq!(config.identity.birthdate, "06.02.1991");
    }

    #[test]
    fn rejects_empty_port_list() {
        let config: ClientConfig = toml::from_str(
            r#"
            address = "127.0.0.1"
            ports = []
            ca_cert = "ca.pem"
            "#,
        )
        .expect("parse");
        let err = config.validate().expect_err("empty ports must be rejected");
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_client_cert_without_key() {
        let config: ClientConfig = toml::from_str(
            r#"
            address = "127.0.0.1"
            ports = [8443]
            ca_cert = "ca.pem"
            client_cert = "client.pem"
            "#,
        )
        .expect("parse");
        assert!(config.validate().is_err());
    }

    #[test]
    fn answers_cover_every_identity_verb() {
        let identity = Identity::default();
        for verb in [
            "NAME",
            "MAILNUM",
            "MAIL1",
            "SKYPE",
            "BIRTHDATE",
            "COUNTRY",
            "ADDRNUM",
            "ADDRLINE1",
            "ADDRLINE2",
        ] {
            assert!(identity.answer(verb).is_some(), "no answer for {verb}");
        }
        assert!(identity.answer("HELO").is_none());
        assert!(identity.answer("name").is_none());
    }
}
