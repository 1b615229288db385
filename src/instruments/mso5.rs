//! Tektronix 5 Series MSO (MSO54, MSO56, MSO58, MSO58LP).
//!
//! Only the subset of the programmer manual needed for single-sequence capture and curve
//! transfer is covered.

use std::fmt;

use super::Model;
use crate::scpi::{ByteWidth, Command, Endianness, ToCommand};

#[derive(Debug, Default, Clone, Copy)]
pub struct Mso5;

impl Model for Mso5 {
    const NAME_TOKEN: &'static str = "MSO";
}

/// Curve transfer encodings (`DATa:ENCdg`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Ascii,
    /// Signed, big endian.
    RiBinary,
    /// Unsigned, big endian.
    RpBinary,
    /// Signed, little endian.
    SriBinary,
    /// Unsigned, little endian.
    SrpBinary,
}

impl Encoding {
    pub fn token(&self) -> &'static str {
        match self {
            Encoding::Ascii => "ASCii",
            Encoding::RiBinary => "RIBinary",
            Encoding::RpBinary => "RPBinary",
            Encoding::SriBinary => "SRIbinary",
            Encoding::SrpBinary => "SRPbinary",
        }
    }

    /// Byte order of the binary encodings, `None` for ASCII.
    pub fn endianness(&self) -> Option<Endianness> {
        match self {
            Encoding::Ascii => None,
            Encoding::RiBinary | Encoding::RpBinary => Some(Endianness::Big),
            Encoding::SriBinary | Encoding::SrpBinary => Some(Endianness::Little),
        }
    }

    pub fn is_signed(&self) -> bool {
        matches!(self, Encoding::RiBinary | Encoding::SriBinary)
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// `ACQuire:STOPAfter` modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopAfter {
    RunStop,
    Sequence,
}

impl StopAfter {
    pub fn token(&self) -> &'static str {
        match self {
            StopAfter::RunStop => "RUNSTop",
            StopAfter::Sequence => "SEQuence",
        }
    }

    /// Whether an `ACQuire:STOPAfter?` reply names this mode. The instrument answers in
    /// either short or long form, with or without a header.
    pub fn matches(&self, reply: &str) -> bool {
        let reply = crate::scpi::last_field(reply).to_ascii_lowercase();
        match self {
            StopAfter::Sequence => reply == "sequence" || reply == "seq",
            StopAfter::RunStop => reply == "runstop" || reply == "runst",
        }
    }
}

pub enum Query {
    StopAfter,
    AvailableSources,
    RecordLength,
    Curve,
    YMultiplier,
    YZero,
    XIncrement,
    XZero,
    PreTriggerOffset,
}

impl ToCommand for Query {
    fn to_command(&self) -> Command {
        Command::new(match self {
            Query::StopAfter => "ACQuire:STOPAfter",
            Query::AvailableSources => "DATa:SOUrce:AVAILable",
            Query::RecordLength => "HORizontal:RECORDLength",
            Query::Curve => "CURVe",
            Query::YMultiplier => "WFMOutpre:YMUlt",
            Query::YZero => "WFMOutpre:YZEro",
            Query::XIncrement => "WFMOutpre:XINcr",
            Query::XZero => "WFMOutpre:XZEro",
            Query::PreTriggerOffset => "WFMOutpre:PT_Off",
        })
        .query()
    }
}

pub enum Set {
    StopAfter(StopAfter),
    AcquisitionState(bool),
    /// Device event status enable register.
    DeviceEventEnable(u8),
    Source(String),
    Encoding(Encoding),
    ByteWidth(ByteWidth),
    StartSample(u32),
    StopSample(u32),
}

impl ToCommand for Set {
    fn to_command(&self) -> Command {
        match self {
            Set::StopAfter(mode) => Command::new("ACQuire:STOPAfter").para(mode.token()),
            Set::AcquisitionState(on) => {
                Command::new("ACQuire:STATE").para(if *on { "ON" } else { "OFF" })
            }
            Set::DeviceEventEnable(mask) => Command::new("DESE").para(mask.to_string()),
            Set::Source(channel) => Command::new("DATa:SOUrce").para(channel),
            Set::Encoding(encoding) => Command::new("DATa:ENCdg").para(encoding.token()),
            Set::ByteWidth(width) => {
                Command::new("WFMOutpre:BYT_Nr").para(width.bytes().to_string())
            }
            Set::StartSample(n) => Command::new("DATa:STARt").para(n.to_string()),
            Set::StopSample(n) => Command::new("DATa:STOP").para(n.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_text() {
        assert_eq!(Query::Curve.to_command().to_string(), "CURVe?");
        assert_eq!(
            Query::AvailableSources.to_command().to_string(),
            "DATa:SOUrce:AVAILable?"
        );
        assert_eq!(
            Set::StopAfter(StopAfter::Sequence).to_command().to_string(),
            "ACQuire:STOPAfter SEQuence"
        );
        assert_eq!(
            Set::Encoding(Encoding::SriBinary).to_command().to_string(),
            "DATa:ENCdg SRIbinary"
        );
        assert_eq!(
            Set::ByteWidth(ByteWidth::Two).to_command().to_string(),
            "WFMOutpre:BYT_Nr 2"
        );
        assert_eq!(
            Set::AcquisitionState(true).to_command().to_string(),
            "ACQuire:STATE ON"
        );
    }

    #[test]
    fn stop_after_reply_forms() {
        assert!(StopAfter::Sequence.matches("SEQUENCE\n"));
        assert!(StopAfter::Sequence.matches(":ACQUIRE:STOPAFTER SEQ"));
        assert!(!StopAfter::Sequence.matches("RUNSTOP"));
        assert!(StopAfter::RunStop.matches("RUNST"));
    }

    #[test]
    fn encoding_byte_order() {
        assert_eq!(Encoding::SriBinary.endianness(), Some(Endianness::Little));
        assert_eq!(Encoding::RiBinary.endianness(), Some(Endianness::Big));
        assert_eq!(Encoding::Ascii.endianness(), None);
        assert!(!Encoding::SrpBinary.is_signed());
    }
}
