//! GPSD wire record formatting.
//!
//! Serializes the four record types as single-line JSON, `\n` terminated.
//! The `alt`, `altHAE`, `track`, `speed` and `cycle` fields are rendered
//! with exactly two fractional digits; they are emitted as pre-formatted
//! raw JSON numbers since a plain `f64` would lose the fixed width.

use serde::Serialize;
use serde_json::value::RawValue;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::route::Point;

pub const DEFAULT_VERSION_RELEASE: &str = "3.25";
pub const DEFAULT_VERSION_REV: &str = "3.25";
pub const DEFAULT_VERSION_PROTO_MAJOR: u32 = 3;
pub const DEFAULT_VERSION_PROTO_MINOR: u32 = 25;
pub const DEFAULT_DEVICE_PATH: &str = "/dev/ttyUSB1";
pub const DEFAULT_DEVICE_DRIVER: &str = "NMEA0183";
pub const DEFAULT_DEVICE_ACTIVATED: &str = "2025-03-21T12:20:29.002Z";
pub const DEFAULT_DEVICE_BPS: u32 = 9600;
pub const DEFAULT_DEVICE_PARITY: &str = "N";
pub const DEFAULT_DEVICE_STOPBITS: u32 = 1;
pub const DEFAULT_TPV_MODE: u32 = 3;

/// Field values for the VERSION, DEVICES and TPV records.
#[derive(Debug, Clone)]
pub struct WriterConfig {
    pub version_release: String,
    pub version_rev: String,
    pub version_proto_major: u32,
    pub version_proto_minor: u32,
    pub device_path: String,
    pub device_driver: String,
    pub device_activated: String,
    pub device_bps: u32,
    pub device_parity: String,
    pub device_stopbits: u32,
    pub tpv_mode: u32,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            version_release: DEFAULT_VERSION_RELEASE.to_string(),
            version_rev: DEFAULT_VERSION_REV.to_string(),
            version_proto_major: DEFAULT_VERSION_PROTO_MAJOR,
            version_proto_minor: DEFAULT_VERSION_PROTO_MINOR,
            device_path: DEFAULT_DEVICE_PATH.to_string(),
            device_driver: DEFAULT_DEVICE_DRIVER.to_string(),
            device_activated: DEFAULT_DEVICE_ACTIVATED.to_string(),
            device_bps: DEFAULT_DEVICE_BPS,
            device_parity: DEFAULT_DEVICE_PARITY.to_string(),
            device_stopbits: DEFAULT_DEVICE_STOPBITS,
            tpv_mode: DEFAULT_TPV_MODE,
        }
    }
}

/// A JSON number with exactly two fractional digits.
fn fixed2(value: f64) -> Box<RawValue> {
    let text = if value.is_finite() {
        format!("{value:.2}")
    } else {
        "0.00".to_string()
    };
    RawValue::from_string(text).expect("fixed-point literal is valid JSON")
}

#[derive(Serialize)]
struct VersionRecord<'a> {
    class: &'static str,
    release: &'a str,
    rev: &'a str,
    proto_major: u32,
    proto_minor: u32,
}

#[derive(Serialize)]
struct DeviceRecord<'a> {
    class: &'static str,
    path: &'a str,
    driver: &'a str,
    activated: &'a str,
    flags: u32,
    native: u32,
    bps: u32,
    parity: &'a str,
    stopbits: u32,
    cycle: Box<RawValue>,
}

#[derive(Serialize)]
struct DevicesRecord<'a> {
    class: &'static str,
    devices: Vec<DeviceRecord<'a>>,
}

#[derive(Serialize)]
struct WatchRecord {
    class: &'static str,
    enable: bool,
    json: bool,
    nmea: bool,
    raw: i32,
    scaled: bool,
    timing: bool,
    split24: bool,
    pps: bool,
}

#[derive(Serialize)]
struct TpvRecord<'a> {
    class: &'static str,
    device: &'a str,
    mode: u32,
    time: &'a str,
    lat: f64,
    lon: f64,
    alt: Box<RawValue>,
    #[serde(rename = "altHAE")]
    alt_hae: Box<RawValue>,
    track: Box<RawValue>,
    speed: Box<RawValue>,
}

/// Line-JSON record writer over a byte sink.
pub struct Writer<W> {
    sink: W,
    config: WriterConfig,
}

impl<W: AsyncWrite + Unpin> Writer<W> {
    pub fn new(sink: W, config: WriterConfig) -> Self {
        Self { sink, config }
    }

    async fn write_line(&mut self, mut line: Vec<u8>) -> std::io::Result<()> {
        line.push(b'\n');
        self.sink.write_all(&line).await
    }

    pub async fn write_version(&mut self) -> std::io::Result<()> {
        let record = VersionRecord {
            class: "VERSION",
            release: &self.config.version_release,
            rev: &self.config.version_rev,
            proto_major: self.config.version_proto_major,
            proto_minor: self.config.version_proto_minor,
        };
        self.write_line(serde_json::to_vec(&record)?).await
    }

    pub async fn write_devices(&mut self) -> std::io::Result<()> {
        let record = DevicesRecord {
            class: "DEVICES",
            devices: vec![DeviceRecord {
                class: "DEVICE",
                path: &self.config.device_path,
                driver: &self.config.device_driver,
                activated: &self.config.device_activated,
                flags: 1,
                native: 0,
                bps: self.config.device_bps,
                parity: &self.config.device_parity,
                stopbits: self.config.device_stopbits,
                cycle: fixed2(1.0),
            }],
        };
        self.write_line(serde_json::to_vec(&record)?).await
    }

    pub async fn write_watch(&mut self) -> std::io::Result<()> {
        let record = WatchRecord {
            class: "WATCH",
            enable: true,
            json: true,
            nmea: false,
            raw: 0,
            scaled: false,
            timing: false,
            split24: false,
            pps: false,
        };
        self.write_line(serde_json::to_vec(&record)?).await
    }

    /// Write one TPV record; `time` is the moment of emission in UTC.
    pub async fn write_tpv(&mut self, point: &Point) -> std::io::Result<()> {
        let time = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Nanos, true);
        self.write_line(self.format_tpv(point, &time)?).await
    }

    fn format_tpv(&self, point: &Point, time: &str) -> std::io::Result<Vec<u8>> {
        let record = TpvRecord {
            class: "TPV",
            device: &self.config.device_path,
            mode: self.config.tpv_mode,
            time,
            lat: point.lat,
            lon: point.lon,
            alt: fixed2(point.elevation),
            alt_hae: fixed2(point.elevation),
            track: fixed2(point.track),
            speed: fixed2(point.speed),
        };
        Ok(serde_json::to_vec(&record)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn writer() -> Writer<Vec<u8>> {
        Writer::new(Vec::new(), WriterConfig::default())
    }

    fn written(w: Writer<Vec<u8>>) -> String {
        String::from_utf8(w.sink).unwrap()
    }

    #[tokio::test]
    async fn test_version_record() {
        let mut w = writer();
        w.write_version().await.unwrap();
        assert_eq!(
            written(w),
            "{\"class\":\"VERSION\",\"release\":\"3.25\",\"rev\":\"3.25\",\"proto_major\":3,\"proto_minor\":25}\n"
        );
    }

    #[tokio::test]
    async fn test_devices_record() {
        let mut w = writer();
        w.write_devices().await.unwrap();
        assert_eq!(
            written(w),
            "{\"class\":\"DEVICES\",\"devices\":[{\"class\":\"DEVICE\",\"path\":\"/dev/ttyUSB1\",\
             \"driver\":\"NMEA0183\",\"activated\":\"2025-03-21T12:20:29.002Z\",\"flags\":1,\
             \"native\":0,\"bps\":9600,\"parity\":\"N\",\"stopbits\":1,\"cycle\":1.00}]}\n"
        );
    }

    #[tokio::test]
    async fn test_watch_record() {
        let mut w = writer();
        w.write_watch().await.unwrap();
        assert_eq!(
            written(w),
            "{\"class\":\"WATCH\",\"enable\":true,\"json\":true,\"nmea\":false,\"raw\":0,\
             \"scaled\":false,\"timing\":false,\"split24\":false,\"pps\":false}\n"
        );
    }

    #[test]
    fn test_tpv_record_fixed_decimals() {
        let w = writer();
        let point = Point {
            lat: 47.38184271474015,
            lon: 8.44824654879321,
            speed: 15.277777777813657,
            elevation: 575.0,
            track: 91.13973909509252,
        };

        let line = w.format_tpv(&point, "2025-06-13T17:29:00.337902000Z").unwrap();
        assert_eq!(
            String::from_utf8(line).unwrap(),
            "{\"class\":\"TPV\",\"device\":\"/dev/ttyUSB1\",\"mode\":3,\
             \"time\":\"2025-06-13T17:29:00.337902000Z\",\"lat\":47.38184271474015,\
             \"lon\":8.44824654879321,\"alt\":575.00,\"altHAE\":575.00,\"track\":91.14,\"speed\":15.28}"
        );
    }

    #[test]
    fn test_tpv_record_custom_device() {
        let config = WriterConfig {
            device_path: "/dev/gps0".into(),
            tpv_mode: 2,
            ..Default::default()
        };
        let w = Writer::new(Vec::new(), config);
        let line = w
            .format_tpv(&Point::default(), "2025-06-13T17:29:00Z")
            .unwrap();
        let text = String::from_utf8(line).unwrap();
        assert!(text.contains("\"device\":\"/dev/gps0\""));
        assert!(text.contains("\"mode\":2"));
    }

    #[test]
    fn test_fixed2_rounds_and_pads() {
        assert_eq!(fixed2(1.0).get(), "1.00");
        assert_eq!(fixed2(91.13973).get(), "91.14");
        assert_eq!(fixed2(-3.456).get(), "-3.46");
        assert_eq!(fixed2(f64::NAN).get(), "0.00");
    }
}
