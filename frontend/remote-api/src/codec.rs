use ciborium::Value;
use serde::{Deserialize, Serialize};
use crate::error::{RemoteApiError, Result};

#[derive(Serialize, Debug)]
struct Request<'a> {
    func: &'a str,
    args: Vec<Value>,
}

#[derive(Deserialize, Debug)]
struct Reply {
    success: Option<bool>,
    ret: Option<Vec<Value>>,
    error: Option<Value>,
    err: Option<Value>,
}

pub fn encode_request(func: &str, args: Vec<Value>) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    ciborium::into_writer(&Request { func, args }, &mut buffer)
        .map_err(|err| RemoteApiError::Encode {
            func: func.to_owned(),
            message: err.to_string(),
        })?;

    Ok(buffer)
}

/// Decodes a reply and returns its return values.
///
/// A reply counts as failed when `success` is false, or when `success` is
/// missing and the server attached an error.
pub fn decode_reply(func: &str, bytes: &[u8]) -> Result<Vec<Value>> {
    let reply: Reply = ciborium::from_reader(bytes)
        .map_err(|err| RemoteApiError::Decode {
            func: func.to_owned(),
            message: err.to_string(),
        })?;

    let failure = reply.error.or(reply.err);

    match (reply.success, failure) {
        (Some(false), failure) => Err(RemoteApiError::Call {
            func: func.to_owned(),
            message: failure.map(describe).unwrap_or_else(|| "unknown error".to_owned()),
        }),
        (None, Some(failure)) => Err(RemoteApiError::Call {
            func: func.to_owned(),
            message: describe(failure),
        }),
        _ => Ok(reply.ret.unwrap_or_default()),
    }
}

fn describe(value: Value) -> String {
    match value {
        Value::Text(text) => text,
        other => format!("{:?}", other),
    }
}

pub fn unexpected(func: &str, detail: impl Into<String>) -> RemoteApiError {
    RemoteApiError::UnexpectedReturn {
        func: func.to_owned(),
        detail: detail.into(),
    }
}

pub fn integer(func: &str, value: &Value) -> Result<i64> {
    match value {
        Value::Integer(int) => i64::try_from(i128::from(*int))
            .map_err(|_| unexpected(func, "an integer out of range")),
        Value::Float(float) if float.fract() == 0.0 => Ok(*float as i64),
        other => Err(unexpected(func, format!("{:?} where an integer was expected", other))),
    }
}

pub fn bytes<'a>(func: &str, value: &'a Value) -> Result<&'a [u8]> {
    match value {
        Value::Bytes(bytes) => Ok(bytes),
        Value::Text(text) => Ok(text.as_bytes()),
        other => Err(unexpected(func, format!("{:?} where a byte string was expected", other))),
    }
}

pub fn array<'a>(func: &str, value: &'a Value) -> Result<&'a [Value]> {
    value.as_array()
        .map(Vec::as_slice)
        .ok_or_else(|| unexpected(func, format!("{:?} where an array was expected", value)))
}

#[cfg(test)]
pub(crate) fn encode_reply(entries: Vec<(&str, Value)>) -> Vec<u8> {
    let map = Value::Map(entries.into_iter()
        .map(|(key, value)| (Value::Text(key.to_owned()), value))
        .collect());

    let mut buffer = Vec::new();
    ciborium::into_writer(&map, &mut buffer).unwrap();
    buffer
}
