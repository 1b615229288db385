use tracing::debug;

use super::mso5::{Encoding, Query, Set};
use crate::{
    error::{Error, Result},
    scpi::{last_field, BinaryFormat, ByteWidth, Scpi, ToCommand},
    waveform::{CalibrationScalars, RawSamples},
};

/// What to transfer and how. `end` of `None` means the last sample of the record.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferConfig {
    pub channel: String,
    pub encoding: Encoding,
    pub byte_width: ByteWidth,
    pub start: u32,
    pub end: Option<u32>,
}

impl TransferConfig {
    /// Full record, signed little endian, two bytes per sample.
    pub fn new<S: Into<String>>(channel: S) -> Self {
        Self {
            channel: channel.into(),
            encoding: Encoding::SriBinary,
            byte_width: ByteWidth::Two,
            start: 1,
            end: None,
        }
    }
    pub fn with_encoding(mut self, encoding: Encoding, byte_width: ByteWidth) -> Self {
        self.encoding = encoding;
        self.byte_width = byte_width;
        self
    }
    pub fn with_window(mut self, start: u32, end: Option<u32>) -> Self {
        self.start = start;
        self.end = end;
        self
    }

    /// How the `CURVe?` block is laid out under this configuration. Only the signed
    /// binary encodings decode into samples.
    pub fn binary_format(&self) -> Result<BinaryFormat> {
        match self.encoding.endianness() {
            Some(endianness) if self.encoding.is_signed() => {
                Ok(BinaryFormat::new(self.byte_width, endianness))
            }
            _ => Err(Error::UnsupportedEncoding(self.encoding)),
        }
    }
}

/// The result of one curve transfer, before scaling.
#[derive(Debug, Clone, PartialEq)]
pub struct Fetched {
    pub samples: RawSamples,
    pub scalars: CalibrationScalars,
    /// Last sample of the transferred window, the record length for a full transfer.
    pub record_length: u32,
}

/// Splits a `DATa:SOUrce:AVAILable?` reply into source names, keeping the instrument's
/// order.
pub fn parse_sources(reply: &str) -> Vec<String> {
    last_field(reply.trim())
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Curve transfer on top of any SCPI link.
pub trait WaveformTransfer: Scpi {
    fn available_channels(&mut self) -> Result<Vec<String>> {
        let reply = self.scpi_query(Query::AvailableSources.to_command())?;
        Ok(parse_sources(&reply))
    }

    fn record_length(&mut self) -> Result<u32> {
        self.query_value(Query::RecordLength.to_command())
    }

    /// Selects source, encoding, byte width and sample window, in that order.
    ///
    /// The channel and the window are validated against the instrument's current state
    /// before anything is written. Returns the last sample of the window.
    fn setup(&mut self, config: &TransferConfig) -> Result<u32> {
        let available = self.available_channels()?;
        if !available.iter().any(|c| c == &config.channel) {
            return Err(Error::InvalidChannel {
                channel: config.channel.clone(),
                available,
            });
        }
        let record_length = self.record_length()?;
        let end = config.end.unwrap_or(record_length);
        if config.start < 1 || config.start > end || end > record_length {
            return Err(Error::InvalidTransferWindow {
                start: config.start,
                end,
                record_length,
            });
        }

        self.scpi_send(Set::Source(config.channel.clone()).to_command())?;
        self.scpi_send(Set::Encoding(config.encoding).to_command())?;
        self.scpi_send(Set::ByteWidth(config.byte_width).to_command())?;
        self.scpi_send(Set::StartSample(config.start).to_command())?;
        self.scpi_send(Set::StopSample(end).to_command())?;
        Ok(end)
    }

    /// Reads the calibration scalars of the last transfer.
    fn read_scalars(&mut self) -> Result<CalibrationScalars> {
        let scalars = CalibrationScalars {
            y_mult: self.query_value(Query::YMultiplier.to_command())?,
            y_zero: self.query_value(Query::YZero.to_command())?,
            x_incr: self.query_value(Query::XIncrement.to_command())?,
            x_zero: self.query_value(Query::XZero.to_command())?,
            pre_trigger_offset: self.query_value(Query::PreTriggerOffset.to_command())?,
        };
        scalars.check()?;
        Ok(scalars)
    }

    /// Transfers the full record of `channel` as signed little endian 16 bit samples.
    fn fetch(&mut self, channel: &str) -> Result<Fetched> {
        self.fetch_with(&TransferConfig::new(channel))
    }

    /// Transfers the window `config` selects, decoding the curve the way the encoding
    /// and byte width lay it out.
    fn fetch_with(&mut self, config: &TransferConfig) -> Result<Fetched> {
        let format = config.binary_format()?;
        let end = self.setup(config)?;
        self.clear_status()?;
        let points = (end - config.start + 1) as usize;
        let samples = self.scpi_query_binary(Query::Curve.to_command(), format, points)?;
        let scalars = self.read_scalars()?;
        debug!(channel = %config.channel, points = samples.len(), "curve fetched");
        Ok(Fetched {
            samples,
            scalars,
            record_length: end,
        })
    }
}

impl<T: Scpi> WaveformTransfer for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        protocols::{InstrumentAddress, SimulatedScope},
        scpi::CommandChannel,
    };

    fn sim() -> SimulatedScope {
        SimulatedScope::new(InstrumentAddress::simulated("XFER"))
    }

    #[test]
    fn parses_source_lists() {
        assert_eq!(parse_sources("CH1,CH2,MATH1\n"), vec!["CH1", "CH2", "MATH1"]);
        assert_eq!(
            parse_sources(":DATA:SOURCE:AVAILABLE CH4,CH1"),
            vec!["CH4", "CH1"]
        );
        assert!(parse_sources("").is_empty());
    }

    #[test]
    fn setup_writes_in_order() {
        let scope = sim().with_samples(vec![0; 50]);
        let mut ch = CommandChannel::new(Box::new(scope.clone()));
        let config = TransferConfig::new("CH2")
            .with_encoding(Encoding::RiBinary, ByteWidth::One)
            .with_window(10, Some(20));
        assert_eq!(ch.setup(&config).unwrap(), 20);
        assert_eq!(
            scope.commands(),
            vec![
                "DATa:SOUrce:AVAILable?",
                "HORizontal:RECORDLength?",
                "DATa:SOUrce CH2",
                "DATa:ENCdg RIBinary",
                "WFMOutpre:BYT_Nr 1",
                "DATa:STARt 10",
                "DATa:STOP 20",
            ]
        );
    }

    #[test]
    fn rejects_window_past_record() {
        let scope = sim().with_samples(vec![0; 50]);
        let mut ch = CommandChannel::new(Box::new(scope.clone()));
        for (start, end) in [(0, Some(10)), (20, Some(10)), (1, Some(51))] {
            let err = ch
                .setup(&TransferConfig::new("CH1").with_window(start, end))
                .unwrap_err();
            assert!(matches!(err, Error::InvalidTransferWindow { .. }), "{:?}", err);
        }
        assert!(scope.commands().iter().all(|c| c.ends_with('?')));
    }

    #[test]
    fn fetch_reads_curve_then_scalars() {
        let scope = sim().with_samples(vec![100, -50, 0]);
        let mut ch = CommandChannel::new(Box::new(scope.clone()));
        let fetched = ch.fetch("CH1").unwrap();
        assert_eq!(fetched.samples, vec![100, -50, 0]);
        assert_eq!(fetched.record_length, 3);
        assert_eq!(fetched.scalars.pre_trigger_offset, 500);
        let commands = scope.commands();
        let curve = commands.iter().position(|c| c == "CURVe?").unwrap();
        assert_eq!(commands[curve - 1], "*CLS");
        assert_eq!(commands[curve + 1], "WFMOutpre:YMUlt?");
        assert_eq!(commands.last().unwrap(), "WFMOutpre:PT_Off?");
    }

    #[test]
    fn fetch_decodes_the_configured_layout() {
        let scope = sim().with_samples(vec![0x1234, -0x0100, 7, 0]);
        let mut ch = CommandChannel::new(Box::new(scope.clone()));

        let big = TransferConfig::new("CH1").with_encoding(Encoding::RiBinary, ByteWidth::Two);
        assert_eq!(ch.fetch_with(&big).unwrap().samples, vec![0x1234, -0x0100, 7, 0]);

        let narrow = TransferConfig::new("CH1")
            .with_encoding(Encoding::SriBinary, ByteWidth::One)
            .with_window(1, Some(2));
        let fetched = ch.fetch_with(&narrow).unwrap();
        assert_eq!(fetched.samples, vec![0x12, -1]);
        assert_eq!(fetched.record_length, 2);
    }

    #[test]
    fn undecodable_encodings_are_refused_before_any_command() {
        let scope = sim();
        let mut ch = CommandChannel::new(Box::new(scope.clone()));
        for encoding in [Encoding::Ascii, Encoding::RpBinary, Encoding::SrpBinary] {
            let config = TransferConfig::new("CH1").with_encoding(encoding, ByteWidth::Two);
            assert!(matches!(
                ch.fetch_with(&config),
                Err(Error::UnsupportedEncoding(e)) if e == encoding
            ));
        }
        assert!(scope.commands().is_empty());
    }
}
