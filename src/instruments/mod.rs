pub mod acquisition;
pub mod mso5;
pub mod session;
pub mod transfer;

pub use self::acquisition::{CancelToken, Completion, SingleSequence, WaitPolicy};
pub use self::mso5::{Encoding, Mso5, StopAfter};
pub use self::session::{ConnectionEvent, ConnectionState, InstrumentSession, SessionOptions};
pub use self::transfer::{Fetched, TransferConfig, WaveformTransfer};

pub trait Model {
    /// Substring of the `*IDN?` reply that identifies this model family.
    const NAME_TOKEN: &'static str;
}
