use std::path::{Path, PathBuf};

use tracing::debug;

use crate::ctx::Context;
use crate::err::ScriptError;
use crate::packet::Linkable;
use crate::pcap::PcapReader;
use crate::script::{InstructionParser, ScriptSource};
use crate::val::Micros;

/// What to do when a script issues an absolute timestamp earlier than
/// the current virtual clock.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum TimeRegressionPolicy {
    /// Fail the compile with [`ScriptError::TimeRegression`].
    #[default]
    Error,
    /// Send the packet immediately (zero delay) and leave the clock
    /// untouched.
    ClampToZeroDelay,
}

/// One compiled packet with its transmission offset relative to the
/// previous packet.
pub struct TimedPacket {
    /// Delay relative to the previous packet.
    pub delay: Micros,
    /// The compiled packet; walk [`Linkable::frames`] for the bytes.
    pub packet: Box<dyn Linkable>,
}

/// The compiler's output: packets in script order.
#[derive(Default)]
pub struct PacketData {
    /// Compiled packets with relative delays.
    pub packets: Vec<TimedPacket>,
    /// True when at least one delay was authored by the user (and
    /// should therefore pace transmission).
    pub has_user_timestamps: bool,
}

impl PacketData {
    /// Number of compiled packets.
    pub fn len(&self) -> usize {
        self.packets.len()
    }

    /// True when nothing was compiled.
    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }
}

/// Drives the instruction parser over whole scripts, maintaining the
/// virtual clock that turns the script's relative/absolute timestamps
/// into per-packet delays.
///
/// Relative timestamps advance the clock; absolute timestamps snap it
/// forward but never backward (see [`TimeRegressionPolicy`]).
pub struct Compiler<'c> {
    ctx: &'c Context,
    default_delay: Micros,
    delay_scale: u64,
    ip_optional_dest_mac: bool,
    policy: TimeRegressionPolicy,
    clock: Micros,
    data: PacketData,
}

impl<'c> Compiler<'c> {
    /// New compiler. `default_delay` applies to instructions without a
    /// timestamp; `delay_scale` is the microsecond multiplier for
    /// script timestamp values (1 = timestamps are microseconds).
    pub fn new(
        ctx: &'c Context,
        default_delay: Micros,
        delay_scale: u64,
        ip_optional_dest_mac: bool,
    ) -> Compiler<'c> {
        Compiler {
            ctx,
            default_delay,
            delay_scale,
            ip_optional_dest_mac,
            policy: TimeRegressionPolicy::default(),
            clock: Micros::ZERO,
            data: PacketData::default(),
        }
    }

    /// Behavior for absolute timestamps lying in the past.
    pub fn set_time_regression_policy(&mut self, policy: TimeRegressionPolicy) {
        self.policy = policy;
    }

    /// Current virtual clock.
    pub fn clock(&self) -> Micros {
        self.clock
    }

    fn stamp(
        &mut self,
        packet: Box<dyn Linkable>,
        timestamp: Option<(u64, bool)>,
        script_start: Micros,
    ) -> Result<(), ScriptError> {
        let (value, is_absolute) = match timestamp {
            Some((value, is_absolute)) => {
                self.data.has_user_timestamps = true;
                (Micros::from_us(value * self.delay_scale), is_absolute)
            }
            None => (self.default_delay, false),
        };

        let delay = if is_absolute {
            // absolute times count from the start of the current script
            let target = value.add(script_start);
            if target < self.clock {
                match self.policy {
                    TimeRegressionPolicy::Error => {
                        return Err(ScriptError::TimeRegression {
                            timestamp: target,
                            clock: self.clock,
                        })
                    }
                    TimeRegressionPolicy::ClampToZeroDelay => Micros::ZERO,
                }
            } else {
                let delay = target.sub(self.clock);
                self.clock = target;
                delay
            }
        } else {
            self.clock = self.clock.add(value);
            value
        };

        self.data.packets.push(TimedPacket { delay, packet });
        Ok(())
    }

    /// Compile a whole script text. `origin` labels diagnostics.
    pub fn add_script_text(&mut self, text: &str, origin: &Path) -> Result<(), ScriptError> {
        let script_start = self.clock;
        let mut source = ScriptSource::new(text, origin);
        let mut count = 0usize;

        while let Some(raw) = source.next_instruction()? {
            let compiled = InstructionParser::new(self.ctx, self.ip_optional_dest_mac)
                .parse(&raw.text)
                .map_err(|e| ScriptError::Parse {
                    path: origin.to_path_buf(),
                    line: raw.line,
                    source: e,
                })?;
            let timestamp = compiled
                .has_timestamp
                .then_some((compiled.timestamp, compiled.is_absolute));
            self.stamp(compiled.packet, timestamp, script_start)?;
            count += 1;
        }
        debug!(origin = %origin.display(), count, "script compiled");
        Ok(())
    }

    /// Compile a script file.
    pub fn add_script_file(&mut self, path: &Path) -> Result<(), ScriptError> {
        debug!(path = %path.display(), "reading script file");
        let text = std::fs::read_to_string(path).map_err(|source| ScriptError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.add_script_text(&text, path)
    }

    /// Compile a list of standalone instructions (e.g. from the
    /// command line). Absolute timestamps count from time zero.
    pub fn add_instructions<I, S>(&mut self, instructions: I) -> Result<(), ScriptError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let origin = PathBuf::from("<inline>");
        for (n, instruction) in instructions.into_iter().enumerate() {
            let compiled = InstructionParser::new(self.ctx, self.ip_optional_dest_mac)
                .parse(instruction.as_ref())
                .map_err(|e| ScriptError::Parse {
                    path: origin.clone(),
                    line: n as u64 + 1,
                    source: e,
                })?;
            let timestamp = compiled
                .has_timestamp
                .then_some((compiled.timestamp, compiled.is_absolute));
            self.stamp(compiled.packet, timestamp, Micros::ZERO)?;
        }
        Ok(())
    }

    /// Feed previously captured frames into the output stream.
    ///
    /// Record timestamps are offset-normalized (the first record is
    /// the time origin) and scaled by `scaling`; a factor of zero
    /// replays as fast as possible and marks the delays as defaulted.
    pub fn add_pcap_file(&mut self, path: &Path, scaling: f64) -> Result<(), ScriptError> {
        debug!(path = %path.display(), scaling, "reading capture file");
        let mut reader = PcapReader::open(path).map_err(|source| ScriptError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        if scaling != 0.0 {
            self.data.has_user_timestamps = true;
        }
        let mut prev: Option<Micros> = None;
        loop {
            let record = reader.read_record().map_err(|source| ScriptError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            let Some((time, frame)) = record else {
                break;
            };
            let delta = match prev {
                Some(prev_time) => time.saturating_sub(prev_time).mul(scaling),
                None => Micros::ZERO,
            };
            prev = Some(time);
            self.data.packets.push(TimedPacket {
                delay: delta,
                packet: Box::new(frame),
            });
        }
        Ok(())
    }

    /// Hand the compiled packets to the transmission layer.
    pub fn finish(self) -> PacketData {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ctx::Settings;
    use crate::rng::Rng;
    use crate::val::{Ipv4Address, MacAddress};
    use assert_matches::assert_matches;

    fn ctx() -> Context {
        let mut settings = Settings::new();
        settings.set_my_mac(MacAddress([0xba; 6]));
        settings.set_my_ipv4(Ipv4Address::parse("10.10.10.10", &Rng::counter(0)).unwrap());
        Context::new(settings)
    }

    #[test]
    fn relative_timestamps_accumulate() {
        let ctx = ctx();
        let mut compiler = Compiler::new(&ctx, Micros::ZERO, 1, false);
        let script = "\
            +10: eth(dmac=11:22:33:44:55:66, payload=aa);\n\
            +20: eth(dmac=11:22:33:44:55:66, payload=bb);\n\
            +30: eth(dmac=11:22:33:44:55:66, payload=cc);\n\
            +40: eth(dmac=11:22:33:44:55:66, payload=dd);\n";
        compiler.add_script_text(script, Path::new("t.pf")).unwrap();
        assert_eq!(compiler.clock(), Micros::from_us(100));

        let data = compiler.finish();
        assert!(data.has_user_timestamps);
        let delays: Vec<u64> = data.packets.iter().map(|p| p.delay.as_us()).collect();
        assert_eq!(delays, [10, 20, 30, 40]);
        // emitted offsets accumulate: 10, 30, 60, 100
        let offsets: Vec<u64> = delays
            .iter()
            .scan(0, |acc, d| {
                *acc += d;
                Some(*acc)
            })
            .collect();
        assert_eq!(offsets, [10, 30, 60, 100]);
    }

    #[test]
    fn absolute_timestamps_snap_forward() {
        let ctx = ctx();
        let mut compiler = Compiler::new(&ctx, Micros::ZERO, 1, false);
        let script = "\
            +100: eth(dmac=11:22:33:44:55:66, payload=aa);\n\
            500: eth(dmac=11:22:33:44:55:66, payload=bb);\n\
            +1: eth(dmac=11:22:33:44:55:66, payload=cc);\n";
        compiler.add_script_text(script, Path::new("t.pf")).unwrap();
        let data = compiler.finish();
        let delays: Vec<u64> = data.packets.iter().map(|p| p.delay.as_us()).collect();
        assert_eq!(delays, [100, 400, 1]);
    }

    #[test]
    fn absolute_regression_is_an_error() {
        let ctx = ctx();
        let mut compiler = Compiler::new(&ctx, Micros::ZERO, 1, false);
        let script = "\
            +500: eth(dmac=11:22:33:44:55:66, payload=aa);\n\
            100: eth(dmac=11:22:33:44:55:66, payload=bb);\n";
        assert_matches!(
            compiler.add_script_text(script, Path::new("t.pf")),
            Err(ScriptError::TimeRegression { .. })
        );
    }

    #[test]
    fn absolute_regression_clamped_by_policy() {
        let ctx = ctx();
        let mut compiler = Compiler::new(&ctx, Micros::ZERO, 1, false);
        compiler.set_time_regression_policy(TimeRegressionPolicy::ClampToZeroDelay);
        let script = "\
            +500: eth(dmac=11:22:33:44:55:66, payload=aa);\n\
            100: eth(dmac=11:22:33:44:55:66, payload=bb);\n";
        compiler.add_script_text(script, Path::new("t.pf")).unwrap();
        let data = compiler.finish();
        assert_eq!(data.packets[1].delay, Micros::ZERO);
    }

    #[test]
    fn default_delay_for_untimed_instructions() {
        let ctx = ctx();
        let mut compiler = Compiler::new(&ctx, Micros::from_ms(1), 1, false);
        compiler
            .add_script_text(
                "eth(dmac=11:22:33:44:55:66, payload=aa);",
                Path::new("t.pf"),
            )
            .unwrap();
        let data = compiler.finish();
        assert!(!data.has_user_timestamps);
        assert_eq!(data.packets[0].delay, Micros::from_ms(1));
    }

    #[test]
    fn delay_scale_multiplies_script_values() {
        let ctx = ctx();
        // timestamps in milliseconds
        let mut compiler = Compiler::new(&ctx, Micros::ZERO, 1000, false);
        compiler
            .add_script_text(
                "+3: eth(dmac=11:22:33:44:55:66, payload=aa);",
                Path::new("t.pf"),
            )
            .unwrap();
        let data = compiler.finish();
        assert_eq!(data.packets[0].delay, Micros::from_ms(3));
    }

    #[test]
    fn absolute_times_count_from_script_start() {
        let ctx = ctx();
        let mut compiler = Compiler::new(&ctx, Micros::ZERO, 1, false);
        compiler
            .add_script_text(
                "+100: eth(dmac=11:22:33:44:55:66, payload=aa);",
                Path::new("a.pf"),
            )
            .unwrap();
        // second script: absolute 50 means 50us after its own start
        compiler
            .add_script_text(
                "50: eth(dmac=11:22:33:44:55:66, payload=bb);",
                Path::new("b.pf"),
            )
            .unwrap();
        let data = compiler.finish();
        let delays: Vec<u64> = data.packets.iter().map(|p| p.delay.as_us()).collect();
        assert_eq!(delays, [100, 50]);
    }

    #[test]
    fn parse_errors_carry_file_and_line() {
        let ctx = ctx();
        let mut compiler = Compiler::new(&ctx, Micros::ZERO, 1, false);
        let err = compiler
            .add_script_text(
                "eth(dmac=11:22:33:44:55:66, payload=aa);\nbogus(x=1);",
                Path::new("t.pf"),
            )
            .unwrap_err();
        assert_matches!(err, ScriptError::Parse { line: 2, .. });
    }

    #[test]
    fn inline_instructions() {
        let ctx = ctx();
        let mut compiler = Compiler::new(&ctx, Micros::from_us(7), 1, false);
        compiler
            .add_instructions(["eth(dmac=11:22:33:44:55:66, payload=aa)"])
            .unwrap();
        let data = compiler.finish();
        assert_eq!(data.len(), 1);
        assert_eq!(data.packets[0].delay, Micros::from_us(7));
    }
}
