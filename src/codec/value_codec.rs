//! Encoding of slot values.
//!
//! A slot record is `NullValue` alone, or `Value` followed by the payload
//! for the slot's declared kind. Composite temporal kinds are written as
//! sequences of 32-bit components, never as an epoch offset. The stream does
//! not describe the kind; the reader is told what to expect by the shape.

use bytes::Bytes;
use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Timelike};

use super::value::{Decimal, ExtensionValue, Value, ValueKind};
use crate::error::{Result, TaskwireError};
use crate::protocol::{Tag, WireReader, WireWriter};

const MILLIS_PER_SECOND: i64 = 1_000;
const MILLIS_PER_MINUTE: i64 = 60 * MILLIS_PER_SECOND;
const MILLIS_PER_HOUR: i64 = 60 * MILLIS_PER_MINUTE;
const MILLIS_PER_DAY: i64 = 24 * MILLIS_PER_HOUR;

/// Escape hatch for kinds outside the closed set.
///
/// One hook is registered per serializer. Returning `Ok(false)` /
/// `Ok(None)` declines the value and the call fails with
/// `UnsupportedValueKind`.
pub trait ExtensionHook: Send + Sync {
    /// Write the payload of `value`. Return `false` if not handled.
    fn encode(&self, kind: &str, value: &ExtensionValue, out: &mut WireWriter) -> Result<bool>;

    /// Read a payload of `kind`. Return `None` if not handled.
    fn decode(&self, kind: &str, input: &mut WireReader<'_>) -> Result<Option<Value>>;
}

fn unsupported(kind: impl ToString) -> TaskwireError {
    TaskwireError::UnsupportedValueKind {
        target: String::new(),
        slot: String::new(),
        kind: kind.to_string(),
    }
}

fn component(value: i64, what: &str) -> Result<i32> {
    i32::try_from(value).map_err(|_| unsupported(format!("{} (component out of range)", what)))
}

/// Value encoder/decoder bound to an optional extension hook.
#[derive(Clone, Copy)]
pub struct ValueCodec<'h> {
    hook: Option<&'h dyn ExtensionHook>,
}

impl<'h> ValueCodec<'h> {
    /// Codec without an extension hook.
    pub fn new() -> Self {
        Self { hook: None }
    }

    /// Codec that defers unknown kinds to `hook`.
    pub fn with_hook(hook: Option<&'h dyn ExtensionHook>) -> Self {
        Self { hook }
    }

    /// Write one slot value declared as `kind`.
    ///
    /// `UnsupportedValueKind` errors leave `target`/`slot` empty; callers
    /// fill them with [`TaskwireError::for_slot`].
    pub fn encode(&self, out: &mut WireWriter, kind: &ValueKind, value: Option<&Value>) -> Result<()> {
        let Some(value) = value else {
            out.put_tag(Tag::NullValue);
            return Ok(());
        };
        if !value.matches(kind) {
            return Err(unsupported(format!("{} (declared {})", value.kind(), kind)));
        }

        let mark = out.mark();
        out.put_tag(Tag::Value);
        let written = self.encode_payload(out, kind, value);
        if written.is_err() {
            out.truncate(mark);
        }
        written
    }

    fn encode_payload(&self, out: &mut WireWriter, kind: &ValueKind, value: &Value) -> Result<()> {
        match value {
            Value::U8(v) => out.put_u8(*v),
            Value::U16(v) => out.put_u16(*v),
            Value::U32(v) => out.put_u32(*v),
            Value::U64(v) => out.put_u64(*v),
            Value::I8(v) => out.put_i8(*v),
            Value::I16(v) => out.put_i16(*v),
            Value::I32(v) => out.put_i32(*v),
            Value::I64(v) => out.put_i64(*v),
            Value::F32(v) => out.put_f32(*v),
            Value::F64(v) => out.put_f64(*v),
            Value::Decimal(d) => {
                for word in d.to_words() {
                    out.put_u32(word);
                }
            }
            Value::String(s) => out.put_string(s),
            Value::DateTime(dt) => {
                write_date(out, &dt.date());
                write_time(out, &dt.time());
            }
            Value::Date(d) => write_date(out, d),
            Value::Time(t) => write_time(out, t),
            Value::Duration(d) => write_duration(out, d)?,
            Value::Extension(ext) => {
                let handled = match self.hook {
                    Some(hook) => hook.encode(ext.kind(), ext, out)?,
                    None => false,
                };
                if !handled {
                    return Err(unsupported(kind));
                }
            }
        }
        Ok(())
    }

    /// Read one slot value declared as `kind`.
    ///
    /// A `NullValue` tag yields `None` whatever the declared kind.
    pub fn decode(&self, input: &mut WireReader<'_>, kind: &ValueKind) -> Result<Option<Value>> {
        let start = input.position();
        match input.read_tag()? {
            Tag::NullValue => return Ok(None),
            Tag::Value => {}
            other => {
                return Err(TaskwireError::malformed(
                    start,
                    "value",
                    format!("expected Value or NullValue tag, found {}", other),
                ))
            }
        }

        let payload_start = input.position();
        let value = match kind {
            ValueKind::U8 => Value::U8(input.read_u8()?),
            ValueKind::U16 => Value::U16(input.read_u16()?),
            ValueKind::U32 => Value::U32(input.read_u32()?),
            ValueKind::U64 => Value::U64(input.read_u64()?),
            ValueKind::I8 => Value::I8(input.read_i8()?),
            ValueKind::I16 => Value::I16(input.read_i16()?),
            ValueKind::I32 => Value::I32(input.read_i32()?),
            ValueKind::I64 => Value::I64(input.read_i64()?),
            ValueKind::F32 => Value::F32(input.read_f32()?),
            ValueKind::F64 => Value::F64(input.read_f64()?),
            ValueKind::Decimal => {
                let words = [
                    input.read_u32()?,
                    input.read_u32()?,
                    input.read_u32()?,
                    input.read_u32()?,
                ];
                Value::Decimal(Decimal::from_words(words).ok_or_else(|| {
                    TaskwireError::malformed(payload_start, "decimal", "invalid decimal flags")
                })?)
            }
            ValueKind::String => Value::String(input.read_string()?),
            ValueKind::DateTime => {
                let date = read_date(input)?;
                let time = read_time(input)?;
                match (date, time) {
                    (Some(d), Some(t)) => Value::DateTime(NaiveDateTime::new(d, t)),
                    _ => return Err(invalid_calendar(payload_start, "timestamp")),
                }
            }
            ValueKind::Date => Value::Date(
                read_date(input)?.ok_or_else(|| invalid_calendar(payload_start, "date"))?,
            ),
            ValueKind::Time => Value::Time(
                read_time(input)?.ok_or_else(|| invalid_calendar(payload_start, "time"))?,
            ),
            ValueKind::Duration => Value::Duration(
                read_duration(input)?.ok_or_else(|| invalid_calendar(payload_start, "duration"))?,
            ),
            ValueKind::Extension(name) => {
                let decoded = match self.hook {
                    Some(hook) => hook.decode(name, input)?,
                    None => None,
                };
                match decoded {
                    Some(value) if value.matches(kind) => value,
                    Some(value) => {
                        return Err(TaskwireError::malformed(
                            payload_start,
                            "value",
                            format!("extension hook produced {} for declared {}", value.kind(), kind),
                        ))
                    }
                    None => return Err(unsupported(kind)),
                }
            }
        };
        Ok(Some(value))
    }
}

impl Default for ValueCodec<'_> {
    fn default() -> Self {
        Self::new()
    }
}

fn invalid_calendar(offset: usize, what: &str) -> TaskwireError {
    TaskwireError::malformed(offset, what, format!("components do not form a valid {}", what))
}

fn write_date(out: &mut WireWriter, date: &NaiveDate) {
    out.put_i32(date.year());
    out.put_i32(date.month() as i32);
    out.put_i32(date.day() as i32);
}

fn write_time(out: &mut WireWriter, time: &NaiveTime) {
    out.put_i32(time.hour() as i32);
    out.put_i32(time.minute() as i32);
    out.put_i32(time.second() as i32);
    out.put_i32((time.nanosecond() / 1_000_000) as i32);
}

fn write_duration(out: &mut WireWriter, duration: &TimeDelta) -> Result<()> {
    // Truncating division keeps every component on the sign of the whole.
    let total = duration.num_milliseconds();
    let days = component(total / MILLIS_PER_DAY, "duration days")?;
    let hours = (total % MILLIS_PER_DAY) / MILLIS_PER_HOUR;
    let minutes = (total % MILLIS_PER_HOUR) / MILLIS_PER_MINUTE;
    let seconds = (total % MILLIS_PER_MINUTE) / MILLIS_PER_SECOND;
    let millis = total % MILLIS_PER_SECOND;
    out.put_i32(days);
    out.put_i32(hours as i32);
    out.put_i32(minutes as i32);
    out.put_i32(seconds as i32);
    out.put_i32(millis as i32);
    Ok(())
}

fn read_u32_component(input: &mut WireReader<'_>) -> Result<Option<u32>> {
    Ok(u32::try_from(input.read_i32()?).ok())
}

fn read_date(input: &mut WireReader<'_>) -> Result<Option<NaiveDate>> {
    let year = input.read_i32()?;
    let month = read_u32_component(input)?;
    let day = read_u32_component(input)?;
    Ok(month
        .zip(day)
        .and_then(|(m, d)| NaiveDate::from_ymd_opt(year, m, d)))
}

fn read_time(input: &mut WireReader<'_>) -> Result<Option<NaiveTime>> {
    let hour = read_u32_component(input)?;
    let minute = read_u32_component(input)?;
    let second = read_u32_component(input)?;
    let milli = read_u32_component(input)?;
    Ok(match (hour, minute, second, milli) {
        (Some(h), Some(m), Some(s), Some(ms)) => NaiveTime::from_hms_milli_opt(h, m, s, ms),
        _ => None,
    })
}

fn read_duration(input: &mut WireReader<'_>) -> Result<Option<TimeDelta>> {
    let days = i64::from(input.read_i32()?);
    let hours = i64::from(input.read_i32()?);
    let minutes = i64::from(input.read_i32()?);
    let seconds = i64::from(input.read_i32()?);
    let millis = i64::from(input.read_i32()?);
    let total = days * MILLIS_PER_DAY
        + hours * MILLIS_PER_HOUR
        + minutes * MILLIS_PER_MINUTE
        + seconds * MILLIS_PER_SECOND
        + millis;
    Ok(TimeDelta::try_milliseconds(total))
}

/// Copy a hook-read payload into an owned extension value.
pub(crate) fn extension_from_slice(kind: &str, data: &[u8]) -> Value {
    Value::Extension(ExtensionValue::new(kind, Bytes::copy_from_slice(data)))
}
