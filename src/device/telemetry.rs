use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};

/// Latest device status, for diagnostic display only.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Telemetry {
    pub battery_percent: u8,
    pub height_cm: i32,
    pub flight_time_secs: u32,
    pub yaw_deg: i32,
}

impl Telemetry {
    /// Parse a Tello state datagram (`key:value;` pairs, e.g.
    /// `pitch:0;roll:0;yaw:12;...;h:30;bat:87;...;time:4;`).
    ///
    /// Only `bat` is required; unknown keys are ignored.
    pub fn parse(datagram: &str) -> Result<Self> {
        let mut telemetry = Telemetry::default();
        let mut saw_battery = false;
        for field in datagram.trim().split(';') {
            let Some((key, value)) = field.split_once(':') else {
                continue;
            };
            let value = value.trim();
            match key.trim() {
                "bat" => {
                    telemetry.battery_percent = value
                        .parse::<u8>()
                        .map_err(|_| anyhow!("invalid battery level '{}'", value))?
                        .min(100);
                    saw_battery = true;
                }
                "h" => telemetry.height_cm = value.parse().unwrap_or_default(),
                "time" => telemetry.flight_time_secs = value.parse().unwrap_or_default(),
                "yaw" => telemetry.yaw_deg = value.parse().unwrap_or_default(),
                _ => {}
            }
        }
        if !saw_battery {
            return Err(anyhow!("state datagram has no battery field"));
        }
        Ok(telemetry)
    }
}

/// Last-write-wins telemetry cell shared between the lifecycle handler
/// (writer) and status output (reader).
#[derive(Clone, Debug, Default)]
pub struct TelemetrySnapshot {
    latest: Arc<Mutex<Option<Telemetry>>>,
}

impl TelemetrySnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self, telemetry: Telemetry) {
        let mut guard = self.latest.lock().unwrap_or_else(|p| p.into_inner());
        *guard = Some(telemetry);
    }

    pub fn latest(&self) -> Option<Telemetry> {
        *self.latest.lock().unwrap_or_else(|p| p.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATE: &str = "mid:-1;x:0;y:0;z:0;mpry:0,0,0;pitch:0;roll:0;yaw:-12;vgx:0;vgy:0;vgz:0;templ:60;temph:63;tof:10;h:30;bat:87;baro:15.37;time:4;agx:-6.00;agy:0.00;agz:-999.00;\r\n";

    #[test]
    fn parses_state_datagram() {
        let telemetry = Telemetry::parse(STATE).unwrap();
        assert_eq!(
            telemetry,
            Telemetry {
                battery_percent: 87,
                height_cm: 30,
                flight_time_secs: 4,
                yaw_deg: -12,
            }
        );
    }

    #[test]
    fn rejects_datagram_without_battery() {
        assert!(Telemetry::parse("pitch:0;roll:0;").is_err());
        assert!(Telemetry::parse("bat:lots;").is_err());
    }

    #[test]
    fn snapshot_keeps_last_write() {
        let snapshot = TelemetrySnapshot::new();
        assert!(snapshot.latest().is_none());
        let reader = snapshot.clone();
        snapshot.store(Telemetry {
            battery_percent: 90,
            ..Telemetry::default()
        });
        snapshot.store(Telemetry {
            battery_percent: 89,
            ..Telemetry::default()
        });
        assert_eq!(reader.latest().unwrap().battery_percent, 89);
    }
}
