//! Bybit-specific error handling.
//!
//! Maps V5 `retCode` values from REST responses and websocket op replies to
//! the streamx error taxonomy. Messages keep the server text as
//! `"[code] message"`.

use serde_json::Value;
use streamx_core::error::{Error, Result};

/// Bybit error code families.
///
/// Reference: https://bybit-exchange.github.io/docs/v5/error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BybitErrorCode {
    /// Request expired or timestamp out of window (-1, 10002).
    Expired,
    /// Server timeout (10000).
    ServerTimeout,
    /// Bad or missing parameter value.
    ParamInvalid,
    /// Invalid API key (10003).
    AccKeyError,
    /// Invalid signature (10004).
    SignFail,
    /// Permission denied (10005, 10007).
    Unauthorized,
    /// Rate limited or overloaded (10006, 10429).
    SystemBusy,
    /// IP, region or account restrictions (10010 and friends).
    Forbidden,
    /// Request not valid in the current state.
    InvalidRequest,
    /// Server-side failure (10016).
    ServerError,
    /// Trading restriction or insufficient balance.
    NoTrade,
    /// Requested entity not found (110001).
    DataNotFound,
    /// Required parameter missing (3100181).
    ParamRequired,
    /// Anything else.
    Unknown(i64),
}

impl BybitErrorCode {
    /// Classifies a numeric code.
    pub fn from_code(code: i64) -> Self {
        match code {
            -1 | 10002 => Self::Expired,
            10000 => Self::ServerTimeout,
            10001 | 10029 | 110003 | 110017 | 110018 | 110019 | 110032 | 110049 | 110072
            | 110092 | 110093 | 110094 | 110108 | 110109 | 110120 | 110121 => Self::ParamInvalid,
            10003 | 33004 | -2015 => Self::AccKeyError,
            10004 => Self::SignFail,
            10005 | 10007 => Self::Unauthorized,
            10006 | 10429 | 20003 | 429 => Self::SystemBusy,
            10008 | 10009 | 10010 | 10024 | 10028 | 100028 => Self::Forbidden,
            10014 | 10017 | 10404 | 20006 | 110005 | 110008 | 110009 | 110010 | 110015
            | 110024 | 110028 | 110029 | 110033 | 110036 | 110038 | 110041 | 110043 => {
                Self::InvalidRequest
            }
            10016 => Self::ServerError,
            10027 | 110004 | 110006 | 110007 | 110011 | 110012 | 110013 | 110014 | 110016
            | 110020 | 110021 | 110022 | 110023 | 110039 | 110040 | 110044 | 110045 | 110046
            | 110047 | 110048 | 110051 | 110052 | 110053 | 110066 | 110070 | 110074 | 170346
            | 170360 => Self::NoTrade,
            110001 | 110031 | 110034 => Self::DataNotFound,
            3100181 | 3100326 => Self::ParamRequired,
            n => Self::Unknown(n),
        }
    }
}

/// Converts a non-zero `retCode` and its message into an [`Error`].
///
/// ```rust
/// use streamx_exchanges::bybit::error::map_ret_code;
///
/// let err = map_ret_code(10006, "Too many visits");
/// assert!(err.is_retryable());
/// assert!(err.to_string().contains("[10006] Too many visits"));
/// ```
pub fn map_ret_code(code: i64, message: &str) -> Error {
    let text = format!("[{code}] {message}");
    let code_str = code.to_string();
    match BybitErrorCode::from_code(code) {
        BybitErrorCode::Expired
        | BybitErrorCode::AccKeyError
        | BybitErrorCode::Unauthorized
        | BybitErrorCode::Forbidden => Error::authentication(text),
        BybitErrorCode::ServerTimeout => Error::timeout(text),
        BybitErrorCode::SignFail => Error::sign_fail(text),
        BybitErrorCode::SystemBusy => Error::exchange_busy(code_str, message),
        BybitErrorCode::ParamInvalid | BybitErrorCode::InvalidRequest => {
            Error::param_invalid(text)
        }
        BybitErrorCode::ParamRequired => Error::param_required(text),
        BybitErrorCode::ServerError | BybitErrorCode::NoTrade | BybitErrorCode::DataNotFound => {
            Error::exchange(code_str, message)
        }
        BybitErrorCode::Unknown(_) => Error::runtime(text),
    }
}

/// Reads `retCode` from a REST envelope, 0 when absent.
pub fn ret_code(response: &Value) -> i64 {
    response.get("retCode").and_then(Value::as_i64).unwrap_or(0)
}

/// Reads `retMsg` from a REST envelope.
pub fn ret_msg(response: &Value) -> &str {
    response
        .get("retMsg")
        .and_then(Value::as_str)
        .unwrap_or("Unknown error")
}

/// Returns the `result` object of a successful REST envelope, or the mapped
/// error.
pub fn check_response(response: &Value) -> Result<&Value> {
    let code = ret_code(response);
    if code != 0 {
        return Err(map_ret_code(code, ret_msg(response)));
    }
    response
        .get("result")
        .ok_or_else(|| Error::from(streamx_core::ParseError::missing_field("result")))
}
