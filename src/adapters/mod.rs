//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter    | Implements        | Connects to                    |
//! |------------|-------------------|--------------------------------|
//! | `hardware` | SensorPort        | I2C bus, range/angle sensors, trigger GPIO |
//! | `log_sink` | EventSink         | Serial log output              |
//! | `time`     | Clock             | ESP32 system timer             |
//! | `esp_i2c`  | BusController     | ESP-IDF I2C driver, raw GPIO   |
//! | `mqtt`     | MessagePublisher  | ESP-IDF MQTT client            |

#[cfg(target_os = "espidf")]
pub mod esp_i2c;
pub mod hardware;
pub mod log_sink;
#[cfg(target_os = "espidf")]
pub mod mqtt;
pub mod time;
