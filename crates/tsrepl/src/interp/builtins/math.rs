use std::rc::Rc;

use rand::Rng;

use super::{Installer, arg};
use crate::interp::{
    Interp, JsResult,
    convert::{to_int32, to_uint32},
    eval::js_pow,
    function::{NativeFn, native_function},
    object::{Class, JsObject, ObjRef},
    realm::Intrinsics,
    value::Value,
};

pub(super) fn install(installer: &Installer<'_>, intrinsics: &Intrinsics, global: &ObjRef) {
    let math = ObjRef::new(JsObject::new(Class::Ordinary, Some(intrinsics.object_proto.clone())));
    let constants = [
        ("E", std::f64::consts::E),
        ("LN10", std::f64::consts::LN_10),
        ("LN2", std::f64::consts::LN_2),
        ("LOG10E", std::f64::consts::LOG10_E),
        ("LOG2E", std::f64::consts::LOG2_E),
        ("PI", std::f64::consts::PI),
        ("SQRT1_2", std::f64::consts::FRAC_1_SQRT_2),
        ("SQRT2", std::f64::consts::SQRT_2),
    ];
    for (name, value) in constants {
        math.define(name, super::frozen(Value::Number(value)));
    }

    let unary: [(&str, fn(f64) -> f64); 26] = [
        ("abs", f64::abs),
        ("acos", f64::acos),
        ("acosh", f64::acosh),
        ("asin", f64::asin),
        ("asinh", f64::asinh),
        ("atan", f64::atan),
        ("atanh", f64::atanh),
        ("cbrt", f64::cbrt),
        ("ceil", f64::ceil),
        ("cos", f64::cos),
        ("cosh", f64::cosh),
        ("exp", f64::exp),
        ("expm1", f64::exp_m1),
        ("floor", f64::floor),
        ("fround", fround),
        ("log", f64::ln),
        ("log10", f64::log10),
        ("log1p", f64::ln_1p),
        ("log2", f64::log2),
        ("sign", sign),
        ("sin", f64::sin),
        ("sinh", f64::sinh),
        ("sqrt", f64::sqrt),
        ("tan", f64::tan),
        ("tanh", f64::tanh),
        ("trunc", f64::trunc),
    ];
    for (name, f) in unary {
        let call: NativeFn = Rc::new(move |interp: &mut Interp, _this: &Value, args: &[Value]| {
            Ok(Value::Number(f(interp.to_number(&arg(args, 0))?)))
        });
        math.define_hidden(name, native_function(installer.function_proto, name, 1, Some(call), None));
    }
    installer.method(&math, "round", 1, |interp, _, args| {
        Ok(Value::Number(round(interp.to_number(&arg(args, 0))?)))
    });
    installer.method(&math, "clz32", 1, |interp, _, args| {
        Ok(Value::from(f64::from(to_uint32(interp.to_number(&arg(args, 0))?).leading_zeros())))
    });
    installer.method(&math, "imul", 2, |interp, _, args| {
        let a = to_int32(interp.to_number(&arg(args, 0))?);
        let b = to_int32(interp.to_number(&arg(args, 1))?);
        Ok(Value::from(f64::from(a.wrapping_mul(b))))
    });
    installer.method(&math, "atan2", 2, |interp, _, args| {
        let y = interp.to_number(&arg(args, 0))?;
        let x = interp.to_number(&arg(args, 1))?;
        Ok(Value::Number(y.atan2(x)))
    });
    installer.method(&math, "pow", 2, |interp, _, args| {
        let base = interp.to_number(&arg(args, 0))?;
        let exponent = interp.to_number(&arg(args, 1))?;
        Ok(Value::Number(js_pow(base, exponent)))
    });
    installer.method(&math, "max", 2, |interp, _, args| extremum(interp, args, true));
    installer.method(&math, "min", 2, |interp, _, args| extremum(interp, args, false));
    installer.method(&math, "hypot", 2, |interp, _, args| {
        let mut sum = 0.0f64;
        let mut nan = false;
        for value in args {
            let n = interp.to_number(value)?;
            if n.is_infinite() {
                return Ok(Value::Number(f64::INFINITY));
            }
            nan |= n.is_nan();
            sum += n * n;
        }
        Ok(Value::Number(if nan { f64::NAN } else { sum.sqrt() }))
    });
    installer.method(&math, "random", 0, |_, _, _| Ok(Value::Number(rand::thread_rng().r#gen::<f64>())));
    global.define_hidden("Math", math);
}

fn round(n: f64) -> f64 {
    if !n.is_finite() || n.fract() == 0.0 {
        return n;
    }
    // halves round towards +Infinity; keep the sign of negative results near zero
    let rounded = (n + 0.5).floor();
    if rounded == 0.0 && n < 0.0 { -0.0 } else { rounded }
}

fn sign(n: f64) -> f64 {
    if n.is_nan() || n == 0.0 { n } else { n.signum() }
}

fn fround(n: f64) -> f64 {
    #[expect(clippy::cast_possible_truncation, reason = "rounding to single precision is the point")]
    let single = n as f32;
    f64::from(single)
}

fn extremum(interp: &mut Interp, args: &[Value], max: bool) -> JsResult<Value> {
    let mut best = if max { f64::NEG_INFINITY } else { f64::INFINITY };
    let mut nan = false;
    for value in args {
        let n = interp.to_number(value)?;
        if n.is_nan() {
            nan = true;
            continue;
        }
        let better = if max {
            n > best || (n == 0.0 && best == 0.0 && best.is_sign_negative())
        } else {
            n < best || (n == 0.0 && best == 0.0 && n.is_sign_negative())
        };
        if better {
            best = n;
        }
    }
    Ok(Value::Number(if nan { f64::NAN } else { best }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_matches_script_semantics() {
        assert_eq!(round(2.5).to_bits(), 3.0f64.to_bits());
        assert_eq!(round(-2.5).to_bits(), (-2.0f64).to_bits());
        assert_eq!(round(-0.4).to_bits(), (-0.0f64).to_bits());
        assert_eq!(round(7.0).to_bits(), 7.0f64.to_bits());
    }

    #[test]
    fn sign_keeps_negative_zero() {
        assert_eq!(sign(-0.0).to_bits(), (-0.0f64).to_bits());
        assert_eq!(sign(-3.0).to_bits(), (-1.0f64).to_bits());
        assert!(sign(f64::NAN).is_nan());
    }
}
