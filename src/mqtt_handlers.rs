use std::time::Duration;

use log::{debug, error, info};
use rumqttc::{AsyncClient, Event, MqttOptions, QoS, Transport};

use crate::config::MqttConfig;
use crate::data_models::{ForceSample, SanityReport};

// MQTT 连接函数
pub async fn connect_mqtt(config: &MqttConfig) -> Result<AsyncClient, Box<dyn std::error::Error>> {
    let mut mqtt_options = MqttOptions::new(&config.client_id, &config.host, config.port);
    mqtt_options.set_keep_alive(Duration::from_secs(5));
    if let Some(u) = &config.username {
        mqtt_options.set_credentials(u, config.password.clone().unwrap_or_default());
    }
    mqtt_options.set_transport(Transport::Tcp); // 默认使用 TCP

    let (client, mut eventloop) = AsyncClient::new(mqtt_options, 10);

    tokio::spawn(async move {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(rumqttc::Packet::ConnAck(_))) => {
                    info!("MQTT 连接成功!");
                }
                Ok(Event::Outgoing(rumqttc::Outgoing::PingReq)) => {
                    debug!("MQTT PingReq");
                }
                Ok(event) => {
                    debug!("MQTT Event: {:?}", event);
                }
                Err(e) => {
                    error!("MQTT EventLoop 错误: {:?}", e);
                    tokio::time::sleep(Duration::from_secs(5)).await; // 错误后等待
                }
            }
        }
    });

    Ok(client)
}

// 每个传感器一个主题: {prefix}/{地址}/force
pub fn force_topic(topic_prefix: &str, address: u8) -> String {
    format!("{}/{:02x}/force", topic_prefix, address)
}

pub fn sanity_topic(topic_prefix: &str, address: u8) -> String {
    format!("{}/{:02x}/sanity", topic_prefix, address)
}

pub async fn publish_sample(
    client: &AsyncClient,
    topic_prefix: &str,
    sample: &ForceSample,
) -> Result<(), Box<dyn std::error::Error>> {
    let payload = serde_json::to_vec(sample)?;
    client
        .publish(force_topic(topic_prefix, sample.address), QoS::AtLeastOnce, false, payload)
        .await?;
    debug!("已发布力值 {:.2} N", sample.force_newtons);
    Ok(())
}

pub async fn publish_sanity_reports(
    client: &AsyncClient,
    topic_prefix: &str,
    reports: &[SanityReport],
) -> Result<(), Box<dyn std::error::Error>> {
    for report in reports {
        let payload = serde_json::to_vec(report)?;
        client
            .publish(sanity_topic(topic_prefix, report.address), QoS::AtLeastOnce, true, payload)
            .await?;
    }
    info!("已发布 {} 个自检结果到主题前缀 '{}'", reports.len(), topic_prefix);
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use chrono::Utc;

    use super::*;

    #[test]
    fn topic_includes_address() {
        assert_eq!(force_topic("fx29", 0x28), "fx29/28/force");
        assert_eq!(force_topic("lab/bench", 0x0A), "lab/bench/0a/force");
    }

    #[test]
    fn sensors_get_separate_topics() {
        assert_ne!(force_topic("fx29", 0x28), force_topic("fx29", 0x29));
        assert_eq!(sanity_topic("fx29", 0x31), "fx29/31/sanity");
    }

    #[test]
    fn sample_payload_is_json() {
        let sample = ForceSample {
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            address: 0x28,
            raw: 8000,
            force_newtons: 12.5,
        };
        let value: serde_json::Value = serde_json::to_value(&sample).unwrap();
        assert_eq!(value["address"], 40);
        assert_eq!(value["raw"], 8000);
        assert_eq!(value["force_newtons"], 12.5);
        assert_eq!(value["timestamp"], "2024-05-01T12:00:00Z");
    }
}
