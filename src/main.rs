use std::env;
use std::error::Error;
use std::thread;
use std::time::Duration;

use dotenv::dotenv;
use env_logger::{Builder, Target};
use log::{error, info, warn};
use tokio::sync::mpsc;

use fx29_daemon::{config::AppConfig, mqtt_handlers::*, sensor_handlers::*, sensor_types::*};
use fx29_daemon::{sanity_check, SanityVerdict, SensorHandle};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv().ok(); // 加载 .env 文件
    Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(Target::Stdout)
        .init();
    info!("FX29 上位机程序启动...");

    let config = AppConfig::from_env()?;
    let mode = env::args().nth(1).unwrap_or_else(|| "read".to_string());
    match mode.as_str() {
        "read" => run_read(config).await,
        "change-address" => run_change_address(config).await,
        "check" => run_check(config).await,
        other => {
            error!("未知模式: {}", other);
            Err(format!("unknown mode {other:?}, expected read | change-address | check").into())
        }
    }
}

async fn connect_with_retry(config: &AppConfig) -> Option<rumqttc::AsyncClient> {
    let Some(mqtt) = &config.mqtt else {
        info!("未配置 MQTT_BROKER_HOST，仅输出日志。");
        return None;
    };
    info!("MQTT 地址: {}:{}", mqtt.host, mqtt.port);
    loop {
        match connect_mqtt(mqtt).await {
            Ok(client) => break Some(client),
            Err(e) => {
                error!("MQTT 连接失败: {:?}, 10秒后重试...", e);
                tokio::time::sleep(Duration::from_secs(10)).await;
            }
        }
    }
}

// 一次性模式: 只尝试连接一次，失败则跳过发布
async fn connect_once(config: &AppConfig) -> Option<rumqttc::AsyncClient> {
    let mqtt = config.mqtt.as_ref()?;
    match connect_mqtt(mqtt).await {
        Ok(client) => Some(client),
        Err(e) => {
            warn!("MQTT 连接失败: {:?}, 跳过发布。", e);
            None
        }
    }
}

async fn run_read(config: AppConfig) -> Result<(), Box<dyn Error>> {
    let transport = open_linux_transport(&config).map_err(|e| e as Box<dyn Error>)?;
    let mut sensor =
        SensorHandle::with_register(transport, config.sensor_address, config.force_register);
    sensor
        .calibration_mut()
        .set_manual(config.zero_offset, config.sensitivity);
    info!(
        "传感器 {:#04x}: zero_offset = {}, sensitivity = {}",
        config.sensor_address, config.zero_offset, config.sensitivity
    );

    let mqtt_client = connect_with_retry(&config).await;

    // 创建 MPSC 渠道
    let (event_tx, mut event_rx) = mpsc::channel::<SensorEvent>(32);

    // 启动采样线程 (阻塞 I/O)
    let interval = config.sampling_interval;
    thread::spawn(move || sensor_task(sensor, interval, event_tx));

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("收到 Ctrl+C 信号，正在执行优雅退出...");
                break;
            }
            Some(event) = event_rx.recv() => {
                match event {
                    SensorEvent::Sample(sample) => {
                        info!("Force: {:.2} N", sample.force_newtons);
                        if let (Some(client), Some(mqtt)) = (&mqtt_client, &config.mqtt) {
                            if let Err(e) = publish_sample(client, &mqtt.topic_prefix, &sample).await {
                                error!("MQTT 发布失败: {:?}", e);
                            }
                        }
                    }
                    SensorEvent::ReadFailed { address, reason } => {
                        warn!("传感器 {:#04x} 无读数: {}", address, reason);
                    }
                }
            }
            else => {
                info!("采样事件流结束，主循环退出。");
                break;
            }
        }
    }

    info!("程序退出。");
    Ok(())
}

async fn run_change_address(config: AppConfig) -> Result<(), Box<dyn Error>> {
    let new_address = config.require_new_address()?;
    let old_address = config.sensor_address;
    let register = config.force_register;

    // 整个流程必须一次完成，放到阻塞线程中执行
    let outcome = tokio::task::spawn_blocking(move || -> Result<(), Box<dyn Error + Send + Sync>> {
        let transport = open_linux_transport(&config)?;
        let mut sensor = SensorHandle::with_register(transport, old_address, register);

        let report = match sensor.change_address(new_address) {
            Ok(report) => report,
            Err(e) => {
                error!("修改 I2C 地址失败: {}", e);
                if e.failed_step().is_some() {
                    error!("设备地址状态未知，请先运行 check 再重试。");
                }
                return Err(e.to_string().into());
            }
        };
        if let Some(warning) = report.ack_warning {
            warn!("EEPROM 响应未确认: {}", warning);
        }
        info!(
            "EEPROM word 02: {:#06x} -> {:#06x}",
            report.word_read.0, report.word_written.0
        );

        // 用新地址重新创建句柄并读取一次
        let mut relocated = SensorHandle::with_register(sensor.release(), new_address, register);
        match relocated.read_raw() {
            Ok(raw) => info!("新地址 {:#04x} 读数: {}", new_address, raw),
            Err(e) => warn!("新地址 {:#04x} 无响应: {:?}", new_address, e),
        }
        Ok(())
    })
    .await?;

    outcome.map_err(|e| e as Box<dyn Error>)
}

async fn run_check(config: AppConfig) -> Result<(), Box<dyn Error>> {
    let addresses = config.sanity_addresses.clone();
    let register = config.force_register;
    let samples = config.sanity_samples;
    let interval_ms = u32::try_from(config.sampling_interval.as_millis()).unwrap_or(u32::MAX);
    let blocking_config = config.clone();

    let reports = tokio::task::spawn_blocking(move || -> Result<_, Box<dyn Error + Send + Sync>> {
        let mut transport = open_linux_transport(&blocking_config)?;
        Ok(sanity_check(&mut transport, &addresses, register, samples, interval_ms))
    })
    .await?
    .map_err(|e| e as Box<dyn Error>)?;

    let passed = reports
        .iter()
        .filter(|r| r.verdict == SanityVerdict::Works)
        .count();
    info!("自检完成: {}/{} 个传感器正常", passed, reports.len());
    for report in &reports {
        info!("  {:#04x}: {:?}", report.address, report.verdict);
    }

    if let Some(client) = connect_once(&config).await {
        if let Some(mqtt) = &config.mqtt {
            publish_sanity_reports(&client, &mqtt.topic_prefix, &reports).await?;
            tokio::time::sleep(Duration::from_secs(1)).await; // 等待事件循环发送完毕
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(pairs: &[(&str, &str)]) -> AppConfig {
        AppConfig::from_lookup(|key| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        })
        .unwrap()
    }

    #[tokio::test]
    async fn connect_once_without_broker_is_none() {
        assert!(connect_once(&config(&[])).await.is_none());
    }

    #[tokio::test]
    async fn connect_once_returns_without_retrying() {
        let cfg = config(&[("MQTT_BROKER_HOST", "127.0.0.1"), ("MQTT_BROKER_PORT", "1")]);
        let attempt = tokio::time::timeout(Duration::from_secs(2), connect_once(&cfg)).await;
        assert!(attempt.is_ok());
    }
}
