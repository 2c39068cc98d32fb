use super::{FormatError, TypedEditor};
use crate::encoding::TypeClassification;
use crate::policy::EditorKind;
use crate::runtime::ReferenceResolver;
use crate::utils::ParseError;
use crate::value::{signed_range, unsigned_max, Value};

/// 整数编辑器：十进制显示，输入接受十进制或 `0x` 十六进制
pub struct IntegerEditor;

impl TypedEditor for IntegerEditor {
    fn kind(&self) -> EditorKind {
        EditorKind::Integer
    }

    fn format(&self, ty: &TypeClassification, value: &Value) -> Result<String, FormatError> {
        if !value.conforms_to(ty) {
            return Err(FormatError::new(ty, value));
        }
        match value {
            Value::Int(v) => Ok(v.to_string()),
            Value::UInt(v) => Ok(v.to_string()),
            _ => Err(FormatError::new(ty, value)),
        }
    }

    fn parse(
        &self,
        ty: &TypeClassification,
        text: &str,
        _resolver: &dyn ReferenceResolver,
    ) -> Result<Value, ParseError> {
        let TypeClassification::Integer { width, signed } = *ty else {
            return Err(ParseError::new(ty.to_string(), text, "not an integer type"));
        };
        let fail = |detail: &str| ParseError::new(ty.to_string(), text, detail);

        let trimmed = text.trim();
        let (negative, body) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
        };
        let (radix, digits) = match body.strip_prefix("0x").or_else(|| body.strip_prefix("0X")) {
            Some(hex) => (16, hex),
            None => (10, body),
        };

        if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
            return Err(fail("not a number"));
        }

        let magnitude = u128::from_str_radix(digits, radix).map_err(|_| fail("out of range"))?;
        if magnitude > u64::MAX as u128 + 1 {
            return Err(fail("out of range"));
        }
        let value = if negative { -(magnitude as i128) } else { magnitude as i128 };

        if signed {
            let (min, max) = signed_range(width);
            if value < min || value > max {
                return Err(fail(&format!("must be between {} and {}", min, max)));
            }
            Ok(Value::Int(value as i64))
        } else {
            let max = unsigned_max(width);
            if value < 0 || value as u128 > max {
                return Err(fail(&format!("must be between 0 and {}", max)));
            }
            Ok(Value::UInt(value as u64))
        }
    }
}

/// 浮点编辑器：最短可往返的十进制表示
pub struct FloatEditor;

impl TypedEditor for FloatEditor {
    fn kind(&self) -> EditorKind {
        EditorKind::FloatingPoint
    }

    fn format(&self, ty: &TypeClassification, value: &Value) -> Result<String, FormatError> {
        match (ty, value) {
            (TypeClassification::FloatingPoint { width: 32 }, Value::Float(v)) => Ok((*v as f32).to_string()),
            (TypeClassification::FloatingPoint { .. }, Value::Float(v)) => Ok(v.to_string()),
            _ => Err(FormatError::new(ty, value)),
        }
    }

    fn parse(
        &self,
        ty: &TypeClassification,
        text: &str,
        _resolver: &dyn ReferenceResolver,
    ) -> Result<Value, ParseError> {
        let trimmed = text.trim();
        let parsed = match ty {
            TypeClassification::FloatingPoint { width: 32 } => trimmed.parse::<f32>().map(f64::from),
            TypeClassification::FloatingPoint { .. } => trimmed.parse::<f64>(),
            _ => return Err(ParseError::new(ty.to_string(), text, "not a floating point type")),
        };

        let value = parsed.map_err(|_| ParseError::new(ty.to_string(), text, "not a number"))?;

        // 有限的文本溢出为无穷大时视为越界，只有显式的 inf 字面量才能得到无穷大
        if value.is_infinite() && !is_infinity_literal(trimmed) {
            return Err(ParseError::new(ty.to_string(), text, "out of range"));
        }
        Ok(Value::Float(value))
    }
}

fn is_infinity_literal(text: &str) -> bool {
    let unsigned = text.trim_start_matches(['+', '-']);
    unsigned.eq_ignore_ascii_case("inf") || unsigned.eq_ignore_ascii_case("infinity")
}

/// 布尔编辑器：显示 YES / NO
pub struct BooleanEditor;

impl TypedEditor for BooleanEditor {
    fn kind(&self) -> EditorKind {
        EditorKind::Boolean
    }

    fn format(&self, ty: &TypeClassification, value: &Value) -> Result<String, FormatError> {
        match value {
            Value::Bool(true) => Ok("YES".to_string()),
            Value::Bool(false) => Ok("NO".to_string()),
            _ => Err(FormatError::new(ty, value)),
        }
    }

    fn parse(
        &self,
        ty: &TypeClassification,
        text: &str,
        _resolver: &dyn ReferenceResolver,
    ) -> Result<Value, ParseError> {
        match text.trim().to_ascii_lowercase().as_str() {
            "yes" | "true" | "1" => Ok(Value::Bool(true)),
            "no" | "false" | "0" => Ok(Value::Bool(false)),
            _ => Err(ParseError::new(ty.to_string(), text, "expected YES or NO")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editors::test_support::FixedResolver;
    use crate::encoding::resolve;

    fn parse_int(encoding: &str, text: &str) -> Result<Value, ParseError> {
        IntegerEditor.parse(&resolve(encoding), text, &FixedResolver::default())
    }

    #[test]
    fn test_integer_parse() {
        assert_eq!(parse_int("q", "42").unwrap(), Value::Int(42));
        assert_eq!(parse_int("q", " -7 ").unwrap(), Value::Int(-7));
        assert_eq!(parse_int("i", "0x2A").unwrap(), Value::Int(42));
        assert_eq!(parse_int("Q", "+18446744073709551615").unwrap(), Value::UInt(u64::MAX));
        assert_eq!(parse_int("q", "-9223372036854775808").unwrap(), Value::Int(i64::MIN));
    }

    #[test]
    fn test_integer_rejects() {
        for (encoding, text) in [
            ("q", "not-a-number"),
            ("q", ""),
            ("q", "4 2"),
            ("q", "1.5"),
            ("c", "128"),
            ("C", "-1"),
            ("S", "0x10000"),
            ("Q", "18446744073709551616"),
            ("q", "0x"),
            ("q", "--1"),
        ] {
            assert!(parse_int(encoding, text).is_err(), "{} should reject {:?}", encoding, text);
        }
    }

    #[test]
    fn test_integer_format() {
        let ty = resolve("q");
        assert_eq!(IntegerEditor.format(&ty, &Value::Int(-12)).unwrap(), "-12");
        assert!(IntegerEditor.format(&ty, &Value::Bool(true)).is_err());
        assert!(IntegerEditor.format(&resolve("c"), &Value::Int(300)).is_err());
    }

    #[test]
    fn test_float() {
        let resolver = FixedResolver::default();
        let ty = resolve("f");
        assert_eq!(FloatEditor.format(&ty, &Value::Float(0.1f32 as f64)).unwrap(), "0.1");
        assert_eq!(FloatEditor.parse(&ty, "0.1", &resolver).unwrap(), Value::Float(0.1f32 as f64));

        let ty = resolve("d");
        assert_eq!(FloatEditor.format(&ty, &Value::Float(2.0)).unwrap(), "2");
        assert_eq!(FloatEditor.parse(&ty, "1e-3", &resolver).unwrap(), Value::Float(0.001));
        assert!(FloatEditor.parse(&ty, "one", &resolver).is_err());
        assert!(FloatEditor.parse(&ty, "", &resolver).is_err());
    }

    #[test]
    fn test_float_overflow_is_rejected() {
        let resolver = FixedResolver::default();

        let ty = resolve("f");
        let err = FloatEditor.parse(&ty, "1e39", &resolver).unwrap_err();
        assert_eq!(err.detail, "out of range");
        assert!(FloatEditor.parse(&ty, "-1e39", &resolver).is_err());
        assert_eq!(FloatEditor.parse(&ty, "3.4e38", &resolver).unwrap(), Value::Float(3.4e38f32 as f64));

        let ty = resolve("d");
        assert_eq!(FloatEditor.parse(&ty, "1e400", &resolver).unwrap_err().detail, "out of range");
        assert_eq!(FloatEditor.parse(&ty, "1e39", &resolver).unwrap(), Value::Float(1e39));

        // 显式的无穷大字面量照常接受
        assert_eq!(FloatEditor.parse(&ty, "inf", &resolver).unwrap(), Value::Float(f64::INFINITY));
        assert_eq!(FloatEditor.parse(&ty, "-Infinity", &resolver).unwrap(), Value::Float(f64::NEG_INFINITY));
    }

    #[test]
    fn test_boolean() {
        let resolver = FixedResolver::default();
        let ty = resolve("B");
        assert_eq!(BooleanEditor.format(&ty, &Value::Bool(false)).unwrap(), "NO");
        assert_eq!(BooleanEditor.parse(&ty, "yes", &resolver).unwrap(), Value::Bool(true));
        assert_eq!(BooleanEditor.parse(&ty, "FALSE", &resolver).unwrap(), Value::Bool(false));
        assert!(BooleanEditor.parse(&ty, "maybe", &resolver).is_err());
    }
}
