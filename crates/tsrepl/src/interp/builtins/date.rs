//! A UTC-only `Date`. Local time is treated as UTC.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, SecondsFormat, Timelike, Utc};

use super::{Installer, arg};
use crate::interp::{
    Interp, JsResult,
    object::{Class, ObjRef},
    realm::Intrinsics,
    value::Value,
};

const MS_PER_DAY: f64 = 86_400_000.0;
/// Largest absolute time value a `Date` can hold.
const MAX_TIME: f64 = 8.64e15;

pub(super) fn install(installer: &Installer<'_>, intrinsics: &Intrinsics, global: &ObjRef) {
    let proto = &intrinsics.date_proto;
    let ctor = installer.constructor("Date", 7, Some(date_call), date_construct, proto);
    installer.method(&ctor, "now", 0, |_, _, _| Ok(Value::Number(now())));
    installer.method(&ctor, "parse", 1, parse);
    installer.method(&ctor, "UTC", 7, utc);
    global.define_hidden("Date", ctor);

    installer.method(proto, "getTime", 0, get_time);
    installer.method(proto, "valueOf", 0, get_time);
    installer.method(proto, "toISOString", 0, to_iso_string);
    installer.method(proto, "toJSON", 1, to_json);
    installer.method(proto, "toString", 0, to_string);
    let fields: [(&str, &str, super::Builtin); 8] = [
        ("getFullYear", "getUTCFullYear", |i, t, _| field(i, t, |c| c.year)),
        ("getMonth", "getUTCMonth", |i, t, _| field(i, t, |c| c.month - 1.0)),
        ("getDate", "getUTCDate", |i, t, _| field(i, t, |c| c.day)),
        ("getDay", "getUTCDay", |i, t, _| field(i, t, |c| c.weekday)),
        ("getHours", "getUTCHours", |i, t, _| field(i, t, |c| c.hours)),
        ("getMinutes", "getUTCMinutes", |i, t, _| field(i, t, |c| c.minutes)),
        ("getSeconds", "getUTCSeconds", |i, t, _| field(i, t, |c| c.seconds)),
        ("getMilliseconds", "getUTCMilliseconds", |i, t, _| field(i, t, |c| c.millis)),
    ];
    for (local, utc, f) in fields {
        installer.method(proto, local, 0, f);
        installer.method(proto, utc, 0, f);
    }
    installer.method(proto, "getTimezoneOffset", 0, |interp, this, _| {
        this_time(interp, this)?;
        Ok(Value::Number(0.0))
    });
}

fn now() -> f64 {
    Utc::now().timestamp_millis() as f64
}

fn time_clip(time: f64) -> f64 {
    if !time.is_finite() || time.abs() > MAX_TIME {
        f64::NAN
    } else {
        time.trunc() + 0.0
    }
}

/// The UTC date-time of a time value, `None` for NaN or beyond the calendar range.
fn date_time(time: f64) -> Option<DateTime<Utc>> {
    if !time.is_finite() {
        return None;
    }
    #[expect(clippy::cast_possible_truncation, reason = "clipped time values fit in i64")]
    DateTime::<Utc>::from_timestamp_millis(time as i64)
}

/// Calendar fields of a time value.
struct Civil {
    year: f64,
    month: f64,
    day: f64,
    weekday: f64,
    hours: f64,
    minutes: f64,
    seconds: f64,
    millis: f64,
}

impl Civil {
    fn from_time(time: f64) -> Option<Self> {
        let at = date_time(time)?;
        Some(Self {
            year: f64::from(at.year()),
            month: f64::from(at.month()),
            day: f64::from(at.day()),
            weekday: f64::from(at.weekday().num_days_from_sunday()),
            hours: f64::from(at.hour()),
            minutes: f64::from(at.minute()),
            seconds: f64::from(at.second()),
            millis: f64::from(at.timestamp_subsec_millis()),
        })
    }
}

/// `MakeDate(MakeDay(year, month, day), MakeTime(...))` over `[year, month, day, h, m, s, ms]`.
/// Months past December and out-of-range days roll over into the following fields.
fn make_time(parts: &[f64]) -> f64 {
    let get = |i: usize, default: f64| parts.get(i).copied().unwrap_or(default);
    let (year, month, day) = (get(0, f64::NAN), get(1, 0.0), get(2, 1.0));
    if !(year.is_finite() && month.is_finite() && day.is_finite()) {
        return f64::NAN;
    }
    let year = year.trunc() + (month.trunc() / 12.0).floor();
    let month = month.trunc().rem_euclid(12.0);
    if year.abs() > 400_000.0 {
        return f64::NAN;
    }
    #[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss, reason = "range checked above")]
    let first_of_month = NaiveDate::from_ymd_opt(year as i32, month as u32 + 1, 1)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc().timestamp_millis() as f64);
    let Some(first_of_month) = first_of_month else {
        return f64::NAN;
    };
    let ms = get(3, 0.0) * 3_600_000.0 + get(4, 0.0) * 60_000.0 + get(5, 0.0) * 1000.0 + get(6, 0.0);
    first_of_month + (day.trunc() - 1.0) * MS_PER_DAY + ms
}

/// `Date.prototype.toISOString` text, `None` for an invalid date.
pub(crate) fn iso_string(time: f64) -> Option<String> {
    let at = date_time(time)?;
    let year = at.year();
    if (0..=9999).contains(&year) {
        return Some(at.to_rfc3339_opts(SecondsFormat::Millis, true));
    }
    // expanded years carry a sign and six digits
    let sign = if year < 0 { '-' } else { '+' };
    Some(format!("{sign}{:06}{}", year.unsigned_abs(), at.format("-%m-%dT%H:%M:%S%.3fZ")))
}

/// Parses RFC 3339 text, plus the date-only, year-month and offset-less forms
/// `Date.parse` accepts. Text without an offset is read as UTC.
fn parse_iso(text: &str) -> f64 {
    let text = text.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(text) {
        return time_clip(at.timestamp_millis() as f64);
    }
    let date = match text.len() {
        4 => NaiveDate::parse_from_str(&format!("{text}-01-01"), "%Y-%m-%d"),
        7 => NaiveDate::parse_from_str(&format!("{text}-01"), "%Y-%m-%d"),
        _ => NaiveDate::parse_from_str(text, "%Y-%m-%d"),
    };
    let naive = match date {
        Ok(date) => date.and_hms_opt(0, 0, 0),
        Err(_) => ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M"]
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(text.trim_end_matches('Z'), format).ok()),
    };
    naive.map_or(f64::NAN, |naive| time_clip(naive.and_utc().timestamp_millis() as f64))
}

fn this_time(interp: &Interp, this: &Value) -> JsResult<f64> {
    match this.as_object().map(|obj| match obj.borrow().class {
        Class::Date(time) => Some(time),
        _ => None,
    }) {
        Some(Some(time)) => Ok(time),
        _ => Err(interp.type_error("this is not a Date object.")),
    }
}

fn field(interp: &mut Interp, this: &Value, pick: fn(&Civil) -> f64) -> JsResult<Value> {
    let time = this_time(interp, this)?;
    Ok(Value::Number(Civil::from_time(time).as_ref().map_or(f64::NAN, pick)))
}

fn date_call(_interp: &mut Interp, _this: &Value, _args: &[Value]) -> JsResult<Value> {
    Ok(Value::from(display_string(now())))
}

fn date_construct(interp: &mut Interp, this: &Value, args: &[Value]) -> JsResult<Value> {
    let time = match args {
        [] => now(),
        [single] => match single {
            Value::Object(obj) if matches!(obj.borrow().class, Class::Date(_)) => this_time(interp, single)?,
            other => match interp.to_primitive(other, crate::interp::convert::Hint::Default)? {
                Value::String(text) => parse_iso(&text),
                primitive => time_clip(interp.to_number(&primitive)?),
            },
        },
        many => {
            let mut parts = Vec::with_capacity(many.len());
            for value in many.iter().take(7) {
                parts.push(interp.to_number(value)?);
            }
            if let Some(year) = parts.first_mut() {
                if (0.0..=99.0).contains(year) && year.fract() == 0.0 {
                    *year += 1900.0;
                }
            }
            time_clip(make_time(&parts))
        }
    };
    if let Value::Object(obj) = this {
        obj.borrow_mut().class = Class::Date(time);
    }
    Ok(this.clone())
}

fn parse(interp: &mut Interp, _this: &Value, args: &[Value]) -> JsResult<Value> {
    let text = interp.to_string(&arg(args, 0))?;
    Ok(Value::Number(parse_iso(&text)))
}

fn utc(interp: &mut Interp, _this: &Value, args: &[Value]) -> JsResult<Value> {
    let mut parts = Vec::with_capacity(args.len());
    for value in args.iter().take(7) {
        parts.push(interp.to_number(value)?);
    }
    Ok(Value::Number(time_clip(make_time(&parts))))
}

fn get_time(interp: &mut Interp, this: &Value, _args: &[Value]) -> JsResult<Value> {
    this_time(interp, this).map(Value::Number)
}

fn to_iso_string(interp: &mut Interp, this: &Value, _args: &[Value]) -> JsResult<Value> {
    let time = this_time(interp, this)?;
    match iso_string(time) {
        Some(text) => Ok(Value::from(text)),
        None => Err(interp.range_error("Invalid time value")),
    }
}

fn to_json(interp: &mut Interp, this: &Value, _args: &[Value]) -> JsResult<Value> {
    let time = this_time(interp, this)?;
    Ok(iso_string(time).map_or(Value::Null, Value::from))
}

fn display_string(time: f64) -> String {
    match date_time(time) {
        Some(at) => at
            .format("%a %b %d %Y %H:%M:%S GMT+0000 (Coordinated Universal Time)")
            .to_string(),
        None => "Invalid Date".to_owned(),
    }
}

fn to_string(interp: &mut Interp, this: &Value, _args: &[Value]) -> JsResult<Value> {
    let time = this_time(interp, this)?;
    Ok(Value::from(display_string(time)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iso_round_trip_of_known_dates() {
        assert_eq!(iso_string(0.0).as_deref(), Some("1970-01-01T00:00:00.000Z"));
        assert_eq!(
            iso_string(1_700_000_000_123.0).as_deref(),
            Some("2023-11-14T22:13:20.123Z")
        );
        assert_eq!(parse_iso("2023-11-14T22:13:20.123Z"), 1_700_000_000_123.0);
        assert_eq!(parse_iso("2023-11-14T23:13:20.123+01:00"), 1_700_000_000_123.0);
        assert_eq!(parse_iso("1970-01-02"), MS_PER_DAY);
        assert_eq!(parse_iso("1970-02"), 31.0 * MS_PER_DAY);
        assert_eq!(parse_iso("1970-01-01T00:01"), 60_000.0);
        assert!(parse_iso("not a date").is_nan());
    }

    #[test]
    fn expanded_years_are_signed() {
        assert_eq!(iso_string(make_time(&[10_000.0, 0.0, 1.0])).as_deref(), Some("+010000-01-01T00:00:00.000Z"));
        assert_eq!(iso_string(make_time(&[-1.0, 0.0, 1.0])).as_deref(), Some("-000001-01-01T00:00:00.000Z"));
        assert_eq!(iso_string(f64::NAN), None);
    }

    #[test]
    fn fields_roll_over() {
        // month 12 is January of the next year, day 0 the last day of the previous month
        assert_eq!(make_time(&[1969.0, 12.0, 1.0]), 0.0);
        assert_eq!(make_time(&[1970.0, 1.0, 0.0]), 30.0 * MS_PER_DAY);
        assert!(make_time(&[f64::NAN, 0.0]).is_nan());
    }

    #[test]
    fn weekday_of_epoch_is_thursday() {
        assert_eq!(Civil::from_time(0.0).map(|c| c.weekday), Some(4.0));
        assert_eq!(display_string(0.0), "Thu Jan 01 1970 00:00:00 GMT+0000 (Coordinated Universal Time)");
        assert_eq!(display_string(f64::NAN), "Invalid Date");
    }
}
