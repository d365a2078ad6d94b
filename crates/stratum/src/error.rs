use super::*;

#[derive(Debug, Snafu, PartialEq, Eq)]
#[snafu(visibility(pub))]
pub enum InternalError {
    #[snafu(display("parse error: {message}"))]
    Parse { message: String },

    #[snafu(display("invalid value: {reason}"))]
    InvalidValue { reason: String },

    #[snafu(display("invalid hex integer '{input}': {source}"))]
    ParseHexInt {
        input: String,
        source: std::num::ParseIntError,
    },
}

pub type Result<T, E = InternalError> = std::result::Result<T, E>;

/// The 20-series error codes a downstream session can send back to a miner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StratumErrorCode {
    Unknown = 20,
    JobNotFound = 21,
    DuplicateShare = 22,
    LowDifficulty = 23,
    Unauthorized = 24,
    NotSubscribed = 25,
    IllegalMethod = 26,
    IllegalParams = 27,
    IpBanned = 28,
    InvalidUsername = 29,
    InternalErrorCode = 30,
    TimeTooOld = 31,
    TimeTooNew = 32,
}

impl StratumErrorCode {
    pub fn message(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::JobNotFound => "job not found",
            Self::DuplicateShare => "duplicate share",
            Self::LowDifficulty => "low difficulty share",
            Self::Unauthorized => "unauthorized worker",
            Self::NotSubscribed => "not subscribed",
            Self::IllegalMethod => "illegal method",
            Self::IllegalParams => "illegal params",
            Self::IpBanned => "ip banned",
            Self::InvalidUsername => "invalid username",
            Self::InternalErrorCode => "internal error",
            Self::TimeTooOld => "time too old",
            Self::TimeTooNew => "time too new",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StratumError {
    pub code: StratumErrorCode,
    pub message: String,
}

impl StratumError {
    pub fn new(code: StratumErrorCode) -> Self {
        Self {
            code,
            message: code.message().to_string(),
        }
    }

    pub fn with_message(code: StratumErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn into_response(self, id: Id) -> Message {
        Message::Response {
            id,
            result: None,
            error: Some(JsonRpcError {
                error_code: self.code as i32,
                message: self.message,
                traceback: None,
            }),
            reject_reason: None,
        }
    }
}

#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct JsonRpcError {
    pub error_code: i32,
    pub message: String,
    pub traceback: Option<Value>,
}

impl Serialize for JsonRpcError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (&self.error_code, &self.message, &self.traceback).serialize(serializer)
    }
}

impl fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.traceback {
            Some(traceback) => write!(
                f,
                "Stratum error {}: {} (traceback: {})",
                self.error_code,
                self.message,
                serde_json::to_string(traceback).unwrap_or_else(|_| "<invalid traceback>".into())
            ),
            None => write!(f, "Stratum error {}: {}", self.error_code, self.message),
        }
    }
}
