//! Cannon node firmware: main entry point.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     Adapters (outer ring)                    │
//! │                                                              │
//! │  HardwareAdapter    MqttAdapter         LogEventSink         │
//! │  (SensorPort)       (MessagePublisher)  (EventSink)          │
//! │  EspI2c + OpenDrainLine                 UptimeClock (Clock)  │
//! │                                                              │
//! │  ──────────────── Port Trait Boundary ──────────────────     │
//! │                                                              │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │             NodeService (pure logic)                   │  │
//! │  │  filters · StateTracker · ChangeView · throttles       │  │
//! │  └────────────────────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use core::cell::RefCell;

use anyhow::{Result, anyhow};
use esp_idf_hal::delay::{Ets, FreeRtos};
use esp_idf_hal::gpio::{AnyIOPin, AnyInputPin, PinDriver, Pull};
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::{AuthMethod, BlockingWifi, ClientConfiguration, Configuration, EspWifi};
use heapless::String;
use log::{info, warn};

use cannon_node::adapters::esp_i2c::{EspI2c, OpenDrainLine};
use cannon_node::adapters::hardware::HardwareAdapter;
use cannon_node::adapters::log_sink::LogEventSink;
use cannon_node::adapters::mqtt::MqttAdapter;
use cannon_node::adapters::time::UptimeClock;
use cannon_node::app::ports::Clock;
use cannon_node::app::service::NodeService;
use cannon_node::config::NodeConfig;
use cannon_node::drivers::bus_recovery::RecoveryLines;
use cannon_node::drivers::button::{ActiveLevel, DebouncedButton};
use cannon_node::drivers::i2c_bus::{BusConfig, DeviceAddress, I2cBus};

/// Build-time network settings.  Provisioning is out of scope for the node.
const WIFI_SSID: &str = match option_env!("CANNON_WIFI_SSID") {
    Some(s) => s,
    None => "",
};
const WIFI_PASS: &str = match option_env!("CANNON_WIFI_PASS") {
    Some(s) => s,
    None => "",
};
const MQTT_URL: &str = match option_env!("CANNON_MQTT_URL") {
    Some(s) => s,
    None => "mqtt://192.168.1.10:1883",
};

fn connect_wifi(wifi: &mut BlockingWifi<EspWifi<'static>>) -> Result<()> {
    let auth_method = if WIFI_PASS.is_empty() {
        AuthMethod::None
    } else {
        AuthMethod::WPA2Personal
    };
    wifi.set_configuration(&Configuration::Client(ClientConfiguration {
        ssid: WIFI_SSID.try_into().map_err(|_| anyhow!("ssid too long"))?,
        password: WIFI_PASS.try_into().map_err(|_| anyhow!("password too long"))?,
        auth_method,
        ..Default::default()
    }))?;
    wifi.start()?;
    wifi.connect()?;
    wifi.wait_netif_up()?;
    info!("WiFi connected to '{}'", WIFI_SSID);
    Ok(())
}

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  Cannon node v{}                  ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Configuration ──────────────────────────────────────
    let mut config = NodeConfig::default();
    if let Some(id) = option_env!("CANNON_UNIT_ID").and_then(|s| s.parse().ok()) {
        config.unit_id = id;
    }
    config.validate().map_err(cannon_node::error::Error::from)?;
    info!("Config: unit {} under {}", config.unit_id, config.unit_base());

    // ── 3. Network ────────────────────────────────────────────
    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;
    let mut wifi = BlockingWifi::wrap(
        EspWifi::new(peripherals.modem, sysloop.clone(), Some(nvs))?,
        sysloop,
    )?;
    if WIFI_SSID.is_empty() {
        warn!("WiFi: no SSID configured, running offline");
    } else if let Err(e) = connect_wifi(&mut wifi) {
        warn!("WiFi: connect failed ({}), running offline", e);
    }

    // ── 4. Hardware ───────────────────────────────────────────
    // SAFETY: the bus and button pins come from the validated config and
    // are not handed out anywhere else.
    let (sda, scl, button_pin) = unsafe {
        (
            AnyIOPin::new(config.i2c_sda_gpio),
            AnyIOPin::new(config.i2c_scl_gpio),
            AnyInputPin::new(config.button_gpio),
        )
    };
    let bus = RefCell::new(I2cBus::new(
        EspI2c::new(peripherals.i2c0, sda, scl),
        BusConfig::from_node(&config),
    ));
    let lines = RecoveryLines::new(
        OpenDrainLine::new(config.i2c_scl_gpio),
        OpenDrainLine::new(config.i2c_sda_gpio),
        Ets,
    );

    let mut pin = PinDriver::input(button_pin)?;
    let level = if config.button_active_low {
        pin.set_pull(Pull::Up)?;
        ActiveLevel::Low
    } else {
        pin.set_pull(Pull::Down)?;
        ActiveLevel::High
    };
    let button = DebouncedButton::new(pin, level, config.button_debounce_ms);

    let mut hw = HardwareAdapter::new(
        &bus,
        lines,
        button,
        DeviceAddress::new(config.angle_fallback_addr),
    )
    .with_heading_weight(config.angle_heading_weight);

    // ── 5. Service + message client ───────────────────────────
    let mut service = NodeService::new(&config)?;
    let mut client_id: String<16> = String::new();
    core::fmt::Write::write_fmt(&mut client_id, format_args!("Cannon{}", config.unit_id))
        .map_err(|_| anyhow!("client id overflow"))?;
    let mut mqtt = MqttAdapter::connect(MQTT_URL, &client_id, &service.command_topics()?)?;
    let mut sink = LogEventSink::new();
    let clock = UptimeClock::new();

    FreeRtos::delay_ms(config.startup_settle_ms);
    mqtt.poll();
    service.startup(&mut hw, &mut mqtt, &mut sink, clock.now_ms());

    // ── 6. Main loop ──────────────────────────────────────────
    loop {
        mqtt.poll();
        while let Some(msg) = mqtt.next_message() {
            service.handle_message(&msg.topic, &msg.payload, &mut hw, &mut mqtt, &mut sink);
        }
        service.tick(&mut hw, &mut mqtt, &mut sink, clock.now_ms());
        FreeRtos::delay_ms(config.loop_interval_ms);
    }
}
