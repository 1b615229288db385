use super::{Command, ToCommand};

/// IEEE 488.2 common commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Common {
    ///Identification query
    Identify,
    ///Clear status
    ClearStatus,
    ///Operation complete
    OperationComplete,
    ///Event status enable
    EventStatusEnable,
    ///Event status register query
    EventStatusRegister,
    ///Service request enable
    ServiceRequestEnable,
}

impl ToCommand for Common {
    fn to_command(&self) -> Command {
        Command::new(match self {
            Common::Identify => "*IDN?",
            Common::ClearStatus => "*CLS",
            Common::OperationComplete => "*OPC",
            Common::EventStatusEnable => "*ESE",
            Common::EventStatusRegister => "*ESR?",
            Common::ServiceRequestEnable => "*SRE",
        })
    }
}
