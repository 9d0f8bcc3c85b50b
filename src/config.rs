use anyhow::Result;
use clap::Parser;
use serde::Deserialize;
use serde_yaml;
use std::env;
use std::fs;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "item-desk")]
#[command(about = "Runs the item-desk front door", long_about = None)]
pub struct Cli {
    #[arg(short = 'c', long = "config")]
    pub config_path: Option<String>,
}

pub fn default_config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".item-desk")
}

pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.yaml")
}

#[derive(Debug, Deserialize, Clone)]
pub struct App {
    #[serde(default = "default_port")]
    port: u16,
}

impl Default for App {
    fn default() -> Self {
        App { port: default_port() }
    }
}

fn default_port() -> u16 {
    8080
}

impl App {
    pub fn get_port(&self) -> u16 {
        self.port
    }
}

/// Identity provider and item-master connection settings.
#[derive(Debug, Deserialize, Clone)]
pub struct Upstream {
    #[serde(default = "default_auth_host")]
    pub auth_host: String,
    #[serde(default = "default_api_host")]
    pub api_host: String,
    #[serde(default = "default_client_id")]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_username_base")]
    pub username_base: String,
}

impl Default for Upstream {
    fn default() -> Self {
        Upstream {
            auth_host: default_auth_host(),
            api_host: default_api_host(),
            client_id: default_client_id(),
            client_secret: String::new(),
            password: String::new(),
            username_base: default_username_base(),
        }
    }
}

fn default_auth_host() -> String {
    "salep-auth.sce.manh.com".to_string()
}

fn default_api_host() -> String {
    "salep.sce.manh.com".to_string()
}

fn default_client_id() -> String {
    "omnicomponent.1.0.0".to_string()
}

fn default_username_base() -> String {
    "sdtadmin@".to_string()
}

/// Asset host settings. Every field is optional; uploads are refused until
/// the key pair and bucket are present.
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Storage {
    #[serde(default)]
    pub aws_access_key_id: String,
    #[serde(default)]
    pub aws_secret_access_key: String,
    #[serde(default)]
    pub aws_endpoint_url_s3: String,
    #[serde(default)]
    pub aws_region: String,
    #[serde(default)]
    pub bucket: String,
    #[serde(default)]
    pub service: String,
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub folder: String,
}

impl Storage {
    pub fn is_configured(&self) -> bool {
        !self.aws_access_key_id.trim().is_empty()
            && !self.aws_secret_access_key.trim().is_empty()
            && !self.bucket.trim().is_empty()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Telemetry {
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default = "default_app_name")]
    pub app_name: String,
    #[serde(default = "default_app_version")]
    pub app_version: String,
}

impl Default for Telemetry {
    fn default() -> Self {
        Telemetry {
            webhook_url: None,
            app_name: default_app_name(),
            app_version: default_app_version(),
        }
    }
}

fn default_app_name() -> String {
    "item-update".to_string()
}

fn default_app_version() -> String {
    "1.0.0".to_string()
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    #[serde(default)]
    pub app: App,
    #[serde(default)]
    pub upstream: Upstream,
    #[serde(default)]
    pub storage: Storage,
    #[serde(default)]
    pub telemetry: Telemetry,
}

impl Config {
    pub fn new(path: &str) -> Result<Self> {
        let cfg = Config::load_config(path)?;
        Ok(cfg)
    }

    pub fn from_yaml(yaml_str: &str) -> Result<Self> {
        let yaml_with_env = Config::substitute_env_vars(yaml_str)?;
        let config: Config = serde_yaml::from_str(&yaml_with_env)?;
        Ok(config)
    }

    fn load_config(path: &str) -> Result<Config> {
        let yaml_str = fs::read_to_string(path)?;
        Config::from_yaml(&yaml_str)
    }

    fn substitute_env_vars(yaml_str: &str) -> Result<String> {
        let mut result = yaml_str.to_string();
        let mut offset = 0;

        while let Some(start) = result[offset..].find("${") {
            let actual_start = offset + start;
            if let Some(end) = result[actual_start..].find("}") {
                let var_name = &result[actual_start + 2..actual_start + end];

                // ${VAR:-default}
                let env_value = if let Some(default_start) = var_name.find(":-") {
                    let actual_var = &var_name[..default_start];
                    let default_val = &var_name[default_start + 2..];
                    env::var(actual_var).unwrap_or_else(|_| default_val.to_string())
                } else {
                    env::var(var_name).unwrap_or_else(|_| {
                        tracing::warn!(variable = var_name, "environment variable not found");
                        String::new()
                    })
                };

                result.replace_range(actual_start..actual_start + end + 1, &env_value);
                offset = actual_start + env_value.len();
            } else {
                break;
            }
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_sections_fall_back_to_defaults() {
        let cfg = Config::from_yaml("app:\n  port: 9000\n").unwrap();

        assert_eq!(cfg.app.get_port(), 9000);
        assert_eq!(cfg.upstream.auth_host, "salep-auth.sce.manh.com");
        assert_eq!(cfg.upstream.username_base, "sdtadmin@");
        assert_eq!(cfg.telemetry.app_name, "item-update");
        assert!(cfg.telemetry.webhook_url.is_none());
        assert!(!cfg.storage.is_configured());
    }

    #[test]
    fn test_default_value_substitution() {
        let yaml = "upstream:\n  api_host: ${ITEM_DESK_TEST_SURELY_UNSET_HOST:-api.example.com}\n";
        let cfg = Config::from_yaml(yaml).unwrap();
        assert_eq!(cfg.upstream.api_host, "api.example.com");
    }

    #[test]
    fn test_missing_variable_becomes_empty() {
        let yaml = "storage:\n  bucket: \"${ITEM_DESK_TEST_SURELY_UNSET_BUCKET}\"\n";
        let cfg = Config::from_yaml(yaml).unwrap();
        assert_eq!(cfg.storage.bucket, "");
    }

    #[test]
    fn test_storage_is_configured_requires_keys_and_bucket() {
        let mut storage = Storage {
            aws_access_key_id: "key".to_string(),
            aws_secret_access_key: "secret".to_string(),
            ..Default::default()
        };
        assert!(!storage.is_configured());

        storage.bucket = "images".to_string();
        assert!(storage.is_configured());
    }
}
