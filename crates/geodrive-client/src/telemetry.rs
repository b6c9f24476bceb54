//! Simulation telemetry logging.
//!
//! Outputs one CSV row per simulated frame for analysis. Supports multiple
//! output destinations via the `TelemetryOutput` trait.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use geodrive::{Action, Geodetic, InputState, Simulation, Vehicle, VehicleKind};

/// Snapshot of the active vehicle and the input driving it.
#[derive(Clone, Debug)]
pub struct TelemetrySnapshot {
    pub elapsed: f64,
    pub dt: f64,
    pub throttle: f64,
    pub brake: f64,
    pub turn: f64,
    pub climb: f64,
    pub roll_input: f64,
    pub kind: VehicleKind,
    pub position: Geodetic,
    pub heading: f64,
    pub pitch: f64,
    pub roll: f64,
    pub velocity: f64,
    pub speed: f64,
    pub baseline: Option<f64>,
    pub rover_mode: bool,
    pub collision_enabled: bool,
    pub crashed: bool,
}

impl TelemetrySnapshot {
    /// Capture the current frame. `None` while no vehicle is active.
    pub fn capture(sim: &Simulation, dt: f64) -> Option<Self> {
        let active = sim.manager().view().get()?;
        let input: InputState = sim.input().snapshot();
        Some(Self {
            elapsed: sim.time(),
            dt,
            throttle: input.value(Action::Throttle),
            brake: input.value(Action::Brake),
            turn: input.axis(Action::TurnRight, Action::TurnLeft),
            climb: input.axis(Action::Climb, Action::Descend),
            roll_input: input.axis(Action::RollRight, Action::RollLeft),
            kind: active.kind,
            position: active.state.geodetic(),
            heading: active.state.heading,
            pitch: active.state.pitch,
            roll: active.state.roll,
            velocity: active.state.velocity,
            speed: active.state.speed,
            baseline: sim.manager().active_vehicle().and_then(Vehicle::baseline),
            rover_mode: active.rover_mode,
            collision_enabled: active.collision_enabled,
            crashed: active.crashed,
        })
    }
}

/// Trait for telemetry output destinations.
pub trait TelemetryOutput: Send + Sync {
    /// Write the CSV header.
    fn write_header(&mut self, header: &str);
    /// Write a data row.
    fn write_row(&mut self, row: &str);
}

/// CSV file output.
pub struct FileTelemetryOutput {
    writer: BufWriter<File>,
}

impl FileTelemetryOutput {
    /// Create (or truncate) the file at `path`.
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        Ok(Self {
            writer: BufWriter::new(File::create(path)?),
        })
    }

    fn write_line(&mut self, line: &str) {
        if let Err(e) = writeln!(self.writer, "{line}").and_then(|()| self.writer.flush()) {
            tracing::warn!("failed to write telemetry: {e}");
        }
    }
}

impl TelemetryOutput for FileTelemetryOutput {
    fn write_header(&mut self, header: &str) {
        self.write_line(header);
    }

    fn write_row(&mut self, row: &str) {
        self.write_line(row);
    }
}

/// Stdout output for the headless runner.
pub struct StdoutTelemetryOutput;

impl TelemetryOutput for StdoutTelemetryOutput {
    fn write_header(&mut self, header: &str) {
        println!("{header}");
    }

    fn write_row(&mut self, row: &str) {
        println!("{row}");
    }
}

/// Define the CSV schema and generate the telemetry functions.
///
/// Column names and formats come from a single definition so the header and
/// the rows never drift apart.
macro_rules! define_telemetry {
    (
        columns: { $( $name:ident : $fmt:literal ),* $(,)? },
        prelude: |$snapshot:ident| { $( $prelude:stmt );* $(;)? },
        row_values: { $( $val:expr ),* $(,)? }
    ) => {
        /// CSV header string.
        const CSV_HEADER: &str = concat!( $( stringify!($name), "," ),* );

        /// Write the CSV header to the specified output.
        pub fn reset_telemetry_to(output: &mut dyn TelemetryOutput) {
            output.write_header(CSV_HEADER.trim_end_matches(','));
        }

        /// Write one telemetry row to the specified output.
        pub fn emit_telemetry_to($snapshot: &TelemetrySnapshot, output: &mut dyn TelemetryOutput) {
            $( $prelude )*

            let line = format!( concat!( $( $fmt, "," ),* ), $( $val ),* );
            output.write_row(line.trim_end_matches(','));
        }
    };
}

define_telemetry! {
    columns: {
        t: "{:.4}",
        dt: "{:.5}",
        throttle: "{:.0}",
        brake: "{:.0}",
        turn: "{:.0}",
        climb: "{:.0}",
        roll_in: "{:.0}",
        kind: "{}",
        lon: "{:.7}",
        lat: "{:.7}",
        height: "{:.3}",
        heading_deg: "{:.2}",
        pitch_deg: "{:.2}",
        roll_deg: "{:.2}",
        velocity: "{:.3}",
        speed: "{:.3}",
        baseline: "{}",
        rover: "{}",
        collision: "{}",
        crashed: "{}",
    },
    prelude: |t| {
        let p = t.position;
        let baseline = t.baseline.map_or_else(String::new, |b| format!("{b:.3}"));
    },
    row_values: {
        t.elapsed,
        t.dt,
        t.throttle,
        t.brake,
        t.turn,
        t.climb,
        t.roll_input,
        t.kind,
        p.longitude,
        p.latitude,
        p.height,
        t.heading.to_degrees(),
        t.pitch.to_degrees(),
        t.roll.to_degrees(),
        t.velocity,
        t.speed,
        baseline,
        u8::from(t.rover_mode),
        u8::from(t.collision_enabled),
        u8::from(t.crashed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingOutput {
        header: Option<String>,
        rows: Vec<String>,
    }

    impl TelemetryOutput for RecordingOutput {
        fn write_header(&mut self, header: &str) {
            self.header = Some(header.to_string());
        }

        fn write_row(&mut self, row: &str) {
            self.rows.push(row.to_string());
        }
    }

    fn snapshot() -> TelemetrySnapshot {
        TelemetrySnapshot {
            elapsed: 1.5,
            dt: 1.0 / 60.0,
            throttle: 1.0,
            brake: 0.0,
            turn: -1.0,
            climb: 0.0,
            roll_input: 0.0,
            kind: VehicleKind::Car,
            position: Geodetic::new(11.9746, 57.7089, 40.5),
            heading: std::f64::consts::FRAC_PI_2,
            pitch: 0.0,
            roll: 0.0,
            velocity: 12.25,
            speed: 12.25,
            baseline: Some(40.0),
            rover_mode: true,
            collision_enabled: true,
            crashed: false,
        }
    }

    #[test]
    fn test_header_and_rows_line_up() {
        let mut output = RecordingOutput::default();
        reset_telemetry_to(&mut output);
        emit_telemetry_to(&snapshot(), &mut output);

        let header = output.header.unwrap();
        assert!(header.starts_with("t,dt,throttle"));
        assert!(header.ends_with("crashed"));

        let columns: Vec<&str> = header.split(',').collect();
        let values: Vec<&str> = output.rows[0].split(',').collect();
        assert_eq!(columns.len(), values.len());

        let column = |name: &str| {
            let index = columns.iter().position(|c| *c == name).unwrap();
            values[index]
        };
        assert_eq!(column("kind"), "car");
        assert_eq!(column("turn"), "-1");
        assert_eq!(column("heading_deg"), "90.00");
        assert_eq!(column("height"), "40.500");
        assert_eq!(column("baseline"), "40.000");
        assert_eq!(column("rover"), "1");
        assert_eq!(column("crashed"), "0");
    }
}
