//! 守护进程配置，从环境变量 (及 `.env`) 读取。

use std::env;
use std::time::Duration;

use thiserror::Error;

use crate::raw_reader::FORCE_REGISTER;
use crate::sensor::DEFAULT_ADDRESS;
use crate::utils::{parse_hex_list, parse_hex_u8};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key} is not set")]
    Missing { key: &'static str },
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub client_id: String,
    pub topic_prefix: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub i2c_bus: String,
    pub sensor_address: u8,
    pub force_register: u8,
    pub power_pin: u64,
    pub sampling_interval: Duration,
    pub zero_offset: i32,
    pub sensitivity: f32,
    pub new_sensor_address: Option<u8>,
    pub sanity_addresses: Vec<u8>,
    pub sanity_samples: usize,
    /// `None` 表示不发布
    pub mqtt: Option<MqttConfig>,
}

const DEFAULT_SANITY_ADDRESSES: &str = "0x11,0x12,0x14,0x15,0x31,0x32,0x34,0x35";

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// 从任意键值查询构建，未设置的键使用默认值
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let hex = |key: &'static str, default: u8| -> Result<u8, ConfigError> {
            match lookup(key) {
                Some(v) => parse_hex_u8(&v).map_err(|_| ConfigError::Invalid { key, value: v }),
                None => Ok(default),
            }
        };

        let sampling_ms: u64 = parse_or(&lookup, "SAMPLING_INTERVAL_MS", 100)?;
        if sampling_ms == 0 {
            return Err(ConfigError::Invalid {
                key: "SAMPLING_INTERVAL_MS",
                value: "0".to_string(),
            });
        }

        let new_sensor_address = match lookup("NEW_SENSOR_ADDRESS") {
            Some(v) => Some(parse_hex_u8(&v).map_err(|_| ConfigError::Invalid {
                key: "NEW_SENSOR_ADDRESS",
                value: v,
            })?),
            None => None,
        };

        let sanity_raw =
            lookup("SANITY_ADDRESSES").unwrap_or_else(|| DEFAULT_SANITY_ADDRESSES.to_string());
        let sanity_addresses = parse_hex_list(&sanity_raw).map_err(|_| ConfigError::Invalid {
            key: "SANITY_ADDRESSES",
            value: sanity_raw.clone(),
        })?;

        let mqtt = match lookup("MQTT_BROKER_HOST") {
            Some(host) => Some(MqttConfig {
                host,
                port: parse_or(&lookup, "MQTT_BROKER_PORT", 1883)?,
                username: lookup("MQTT_USERNAME"),
                password: lookup("MQTT_PASSWORD"),
                client_id: lookup("MQTT_CLIENT_ID").unwrap_or_else(|| "fx29_daemon".to_string()),
                topic_prefix: lookup("MQTT_TOPIC_PREFIX").unwrap_or_else(|| "fx29".to_string()),
            }),
            None => None,
        };

        Ok(Self {
            i2c_bus: lookup("I2C_BUS").unwrap_or_else(|| "/dev/i2c-1".to_string()),
            sensor_address: hex("SENSOR_ADDRESS", DEFAULT_ADDRESS)?,
            force_register: hex("FORCE_REGISTER", FORCE_REGISTER)?,
            power_pin: parse_or(&lookup, "POWER_PIN", 4)?,
            sampling_interval: Duration::from_millis(sampling_ms),
            zero_offset: parse_or(&lookup, "ZERO_OFFSET", 0)?,
            sensitivity: parse_or(&lookup, "SENSITIVITY", 1.0)?,
            new_sensor_address,
            sanity_addresses,
            sanity_samples: parse_or(&lookup, "SANITY_SAMPLES", 5)?,
            mqtt,
        })
    }

    /// 地址修改模式的目标地址
    pub fn require_new_address(&self) -> Result<u8, ConfigError> {
        self.new_sensor_address.ok_or(ConfigError::Missing {
            key: "NEW_SENSOR_ADDRESS",
        })
    }
}

fn parse_or<F, V>(lookup: &F, key: &'static str, default: V) -> Result<V, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    V: std::str::FromStr,
{
    match lookup(key) {
        Some(v) => v
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: v }),
        None => Ok(default),
    }
}
