//! Display formats
//!
//! Minimal value-to-string conversion for scalar values in each of the
//! formats a front end can select per object.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::types::{check_typedef, TypeKind};
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayFormat {
    #[default]
    Natural,
    Binary,
    Decimal,
    Hexadecimal,
    Octal,
    Unsigned,
}

impl DisplayFormat {
    pub const ALL: [DisplayFormat; 6] = [
        DisplayFormat::Natural,
        DisplayFormat::Binary,
        DisplayFormat::Decimal,
        DisplayFormat::Hexadecimal,
        DisplayFormat::Octal,
        DisplayFormat::Unsigned,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DisplayFormat::Natural => "natural",
            DisplayFormat::Binary => "binary",
            DisplayFormat::Decimal => "decimal",
            DisplayFormat::Hexadecimal => "hexadecimal",
            DisplayFormat::Octal => "octal",
            DisplayFormat::Unsigned => "unsigned",
        }
    }
}

impl fmt::Display for DisplayFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DisplayFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DisplayFormat::ALL
            .iter()
            .copied()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| format!("Unknown display format: {}", s))
    }
}

/// Format a scalar value. Returns `None` for aggregates and values whose
/// contents are not available.
pub fn format_value(value: &Value, format: DisplayFormat) -> Option<String> {
    let ty = check_typedef(value.ty());
    if !ty.is_scalar() {
        return None;
    }
    let size = value.contents()?.len() as u32;

    if format != DisplayFormat::Natural {
        if matches!(ty.kind(), TypeKind::Float) && format == DisplayFormat::Decimal {
            return value.as_f64().map(format_float);
        }
        let bits = value.raw_bits()?;
        return Some(format_bits(bits, size, value.as_i128()?, format));
    }

    let text = match ty.kind() {
        TypeKind::Int { .. } => value.as_i128()?.to_string(),
        TypeKind::Char { .. } => {
            let n = value.as_i128()?;
            format!("{} {}", n, char_literal(n))
        }
        TypeKind::Bool => {
            if value.raw_bits()? != 0 {
                "true".to_string()
            } else {
                "false".to_string()
            }
        }
        TypeKind::Float => format_float(value.as_f64()?),
        TypeKind::Enum { enumerators } => {
            let n = value.as_i128()?;
            enumerators
                .iter()
                .find(|(_, v)| *v as i128 == n)
                .map(|(name, _)| name.clone())
                .unwrap_or_else(|| n.to_string())
        }
        TypeKind::Pointer(_) | TypeKind::Reference(_) => {
            format!("0x{:x}", value.as_address()?)
        }
        _ => return None,
    };
    Some(text)
}

fn format_bits(bits: u128, size: u32, signed: i128, format: DisplayFormat) -> String {
    let mask = if size >= 16 {
        u128::MAX
    } else {
        (1u128 << (size * 8)) - 1
    };
    let bits = bits & mask;
    match format {
        DisplayFormat::Binary => format!("{:b}", bits),
        DisplayFormat::Hexadecimal => format!("0x{:x}", bits),
        DisplayFormat::Octal if bits == 0 => "0".to_string(),
        DisplayFormat::Octal => format!("0{:o}", bits),
        DisplayFormat::Unsigned => bits.to_string(),
        DisplayFormat::Decimal | DisplayFormat::Natural => signed.to_string(),
    }
}

fn format_float(f: f64) -> String {
    if f.fract() == 0.0 && f.is_finite() {
        format!("{}", f as i64)
    } else {
        format!("{}", f)
    }
}

fn char_literal(n: i128) -> String {
    let c = (n as u8) as char;
    match c {
        '\0' => "'\\000'".to_string(),
        '\n' => "'\\n'".to_string(),
        '\t' => "'\\t'".to_string(),
        '\'' => "'\\''".to_string(),
        '\\' => "'\\\\'".to_string(),
        c if c.is_ascii_graphic() || c == ' ' => format!("'{}'", c),
        _ => format!("'\\{:03o}'", n as u8),
    }
}
