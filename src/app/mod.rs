//! DNP3 application layer: request/response fragment grammar.
//!
//! Best-effort by design: the header octets and function code are
//! authoritative, object headers are walked structurally, and object data
//! stays opaque wherever the variation does not imply a fixed width.

mod objects;

pub use objects::{ObjectHeader, Range};

use std::fmt;

use serde::Serialize;

/// Application-layer control octet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AppControl {
    pub fir: bool,
    pub fin: bool,
    pub con: bool,
    pub uns: bool,
    pub seq: u8,
}

impl AppControl {
    pub fn from_octet(value: u8) -> Self {
        Self {
            fir: value & 0x80 != 0,
            fin: value & 0x40 != 0,
            con: value & 0x20 != 0,
            uns: value & 0x10 != 0,
            seq: value & 0x0f,
        }
    }
}

impl fmt::Display for AppControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut sep = "";
        write!(f, "(")?;
        for (set, name) in [
            (self.fir, "fir"),
            (self.fin, "fin"),
            (self.con, "con"),
            (self.uns, "uns"),
        ] {
            if set {
                write!(f, "{}{}", sep, name)?;
                sep = ",";
            }
        }
        write!(f, ")")
    }
}

const REQUEST_NAMES: [&str; 0x22] = [
    "CONFIRM",
    "READ",
    "WRITE",
    "SELECT",
    "OPERATE",
    "DIRECT_OPERATE",
    "DIRECT_OPERATE_NR",
    "IMMED_FREEZE",
    "IMMED_FREEZE_NR",
    "FREEZE_CLEAR",
    "FREEZE_CLEAR_NR",
    "FREEZE_AT_TIME",
    "FREEZE_AT_TIME_NR",
    "COLD_RESTART",
    "WARM_RESTART",
    "INITIALIZE_DATA",
    "INITIALIZE_APPL",
    "START_APPL",
    "STOP_APPL",
    "SAVE_CONFIG",
    "ENABLE_UNSOLICITED",
    "DISABLE_UNSOLICITED",
    "ASSIGN_CLASS",
    "DELAY_MEASURE",
    "RECORD_CURRENT_TIME",
    "OPEN_FILE",
    "CLOSE_FILE",
    "DELETE_FILE",
    "GET_FILE_INFO",
    "AUTHENTICATE_FILE",
    "ABORT_FILE",
    "ACTIVATE_CONFIG",
    "AUTHENTICATE_REQ",
    "AUTH_REQ_NO_ACK",
];

const RESPONSE_NAMES: [&str; 3] = ["RESPONSE", "UNSOLICITED_RESPONSE", "AUTHENTICATE_RESP"];

/// Application function code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FunctionCode(pub u8);

impl FunctionCode {
    pub fn is_request(self) -> bool {
        self.0 <= 0x21
    }

    pub fn is_response(self) -> bool {
        (0x81..=0x83).contains(&self.0)
    }

    pub fn name(self) -> Option<&'static str> {
        if self.is_request() {
            Some(REQUEST_NAMES[self.0 as usize])
        } else if self.is_response() {
            Some(RESPONSE_NAMES[(self.0 - 0x81) as usize])
        } else {
            None
        }
    }
}

impl fmt::Display for FunctionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "FUNC_{:#04x}", self.0),
        }
    }
}

/// Internal indications (responses only); low octet is IIN1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Iin(pub u16);

impl Iin {
    pub fn broadcast(self) -> bool {
        self.0 & 0x0001 != 0
    }
    pub fn class1_events(self) -> bool {
        self.0 & 0x0002 != 0
    }
    pub fn class2_events(self) -> bool {
        self.0 & 0x0004 != 0
    }
    pub fn class3_events(self) -> bool {
        self.0 & 0x0008 != 0
    }
    pub fn need_time(self) -> bool {
        self.0 & 0x0010 != 0
    }
    pub fn local_control(self) -> bool {
        self.0 & 0x0020 != 0
    }
    pub fn device_trouble(self) -> bool {
        self.0 & 0x0040 != 0
    }
    pub fn device_restart(self) -> bool {
        self.0 & 0x0080 != 0
    }
    pub fn func_not_supported(self) -> bool {
        self.0 & 0x0100 != 0
    }
    pub fn obj_unknown(self) -> bool {
        self.0 & 0x0200 != 0
    }
    pub fn param_error(self) -> bool {
        self.0 & 0x0400 != 0
    }
    pub fn buffer_overflow(self) -> bool {
        self.0 & 0x0800 != 0
    }
    pub fn already_executing(self) -> bool {
        self.0 & 0x1000 != 0
    }
    pub fn config_corrupt(self) -> bool {
        self.0 & 0x2000 != 0
    }
}

impl fmt::Display for Iin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bits = [
            (self.broadcast(), "broadcast"),
            (self.class1_events(), "class1"),
            (self.class2_events(), "class2"),
            (self.class3_events(), "class3"),
            (self.need_time(), "need_time"),
            (self.local_control(), "local_ctrl"),
            (self.device_trouble(), "trouble"),
            (self.device_restart(), "restart"),
            (self.func_not_supported(), "func_not_supp"),
            (self.obj_unknown(), "obj_unknown"),
            (self.param_error(), "param_error"),
            (self.buffer_overflow(), "overflow"),
            (self.already_executing(), "already_exec"),
            (self.config_corrupt(), "config_corrupt"),
        ];
        let mut sep = "";
        write!(f, "[")?;
        for (set, name) in bits {
            if set {
                write!(f, "{}{}", sep, name)?;
                sep = ",";
            }
        }
        write!(f, "]")
    }
}

/// A request or response fragment, as reassembled from one segment series
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fragment {
    pub control: AppControl,
    pub function: FunctionCode,
    /// Present on responses only
    pub iin: Option<Iin>,
    pub objects: Vec<ObjectHeader>,
}

impl fmt::Display for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} {}", self.control.seq, self.control, self.function)?;
        if let Some(iin) = self.iin {
            write!(f, " {}", iin)?;
        }
        for header in &self.objects {
            write!(f, " {}", header)?;
        }
        Ok(())
    }
}

/// Diagnostic token for a fragment that parsed but is semantically invalid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AppError {
    FuncNotSupported,
    ObjUnknown,
    ParamError,
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::FuncNotSupported => write!(f, "function not supported"),
            AppError::ObjUnknown => write!(f, "unknown object"),
            AppError::ParamError => write!(f, "parameter error"),
        }
    }
}

/// Result of the best-effort application parse
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppMessage {
    Fragment(Fragment),
    Invalid(AppError),
}

/// Parse a reassembled payload as a request fragment.
pub fn parse_request(input: &[u8]) -> Option<AppMessage> {
    if input.len() < 2 {
        return None;
    }
    let control = AppControl::from_octet(input[0]);
    let function = FunctionCode(input[1]);
    if !function.is_request() {
        return Some(AppMessage::Invalid(AppError::FuncNotSupported));
    }
    Some(assemble(control, function, None, &input[2..]))
}

/// Parse a reassembled payload as a response fragment.
pub fn parse_response(input: &[u8]) -> Option<AppMessage> {
    if input.len() < 4 {
        return None;
    }
    let control = AppControl::from_octet(input[0]);
    let function = FunctionCode(input[1]);
    if !function.is_response() {
        return Some(AppMessage::Invalid(AppError::FuncNotSupported));
    }
    let iin = Iin(u16::from_le_bytes([input[2], input[3]]));
    Some(assemble(control, function, Some(iin), &input[4..]))
}

/// Combined request/response parser, dispatching on the function code.
pub fn parse_message(input: &[u8]) -> Option<AppMessage> {
    if input.len() < 2 {
        return None;
    }
    if FunctionCode(input[1]).is_response() {
        parse_response(input)
    } else {
        parse_request(input)
    }
}

fn assemble(
    control: AppControl,
    function: FunctionCode,
    iin: Option<Iin>,
    body: &[u8],
) -> AppMessage {
    match objects::walk_objects(body) {
        Ok(headers) => AppMessage::Fragment(Fragment {
            control,
            function,
            iin,
            objects: headers,
        }),
        Err(error) => AppMessage::Invalid(error),
    }
}
