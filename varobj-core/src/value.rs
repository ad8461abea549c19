//! Value handles
//!
//! A value is a typed view of target data. It may live at an address
//! (an lvalue) and its contents may not have been fetched yet (lazy).

use crate::types::{check_typedef, TypeKind, TypeRef};

#[derive(Debug, Clone)]
pub struct Value {
    ty: TypeRef,
    address: Option<u64>,
    contents: Option<Vec<u8>>,
}

impl Value {
    /// A value that is not backed by target memory.
    pub fn from_bytes(ty: TypeRef, bytes: Vec<u8>) -> Self {
        Self {
            ty,
            address: None,
            contents: Some(bytes),
        }
    }

    /// A scalar value, truncated to the size of `ty`.
    pub fn from_i128(ty: TypeRef, value: i128) -> Self {
        let size = ty.size() as usize;
        let bytes = value.to_le_bytes()[..size.min(16)].to_vec();
        Self::from_bytes(ty, bytes)
    }

    pub fn from_f64(ty: TypeRef, value: f64) -> Self {
        let bytes = if ty.size() == 4 {
            (value as f32).to_le_bytes().to_vec()
        } else {
            value.to_le_bytes().to_vec()
        };
        Self::from_bytes(ty, bytes)
    }

    /// An lvalue whose contents have not been read yet.
    pub fn lazy(ty: TypeRef, address: u64) -> Self {
        Self {
            ty,
            address: Some(address),
            contents: None,
        }
    }

    /// An lvalue with known contents.
    pub fn at(ty: TypeRef, address: u64, bytes: Vec<u8>) -> Self {
        Self {
            ty,
            address: Some(address),
            contents: Some(bytes),
        }
    }

    pub fn ty(&self) -> &TypeRef {
        &self.ty
    }

    pub fn address(&self) -> Option<u64> {
        self.address
    }

    pub fn is_lazy(&self) -> bool {
        self.contents.is_none()
    }

    pub fn contents(&self) -> Option<&[u8]> {
        self.contents.as_deref()
    }

    pub fn set_contents(&mut self, bytes: Vec<u8>) {
        self.contents = Some(bytes);
    }

    /// The same data viewed as another type.
    pub fn with_type(&self, ty: TypeRef) -> Self {
        Self {
            ty,
            address: self.address,
            contents: self.contents.clone(),
        }
    }

    /// Raw little-endian bits of the contents, zero-extended.
    pub fn raw_bits(&self) -> Option<u128> {
        let bytes = self.contents.as_deref()?;
        let mut buf = [0u8; 16];
        let n = bytes.len().min(16);
        buf[..n].copy_from_slice(&bytes[..n]);
        Some(u128::from_le_bytes(buf))
    }

    /// Decode a scalar as an integer, honouring the signedness of its type.
    pub fn as_i128(&self) -> Option<i128> {
        let ty = check_typedef(&self.ty);
        let bits = self.raw_bits()?;
        let size = self.contents.as_ref()?.len().min(16) as u32;
        let signed = match ty.kind() {
            TypeKind::Int { signed } | TypeKind::Char { signed } => *signed,
            TypeKind::Enum { .. } => true,
            TypeKind::Bool | TypeKind::Pointer(_) | TypeKind::Reference(_) => false,
            TypeKind::Float => return self.as_f64().map(|f| f as i128),
            _ => return None,
        };
        Some(if signed { sign_extend(bits, size) } else { bits as i128 })
    }

    /// Decode a floating point scalar.
    pub fn as_f64(&self) -> Option<f64> {
        let ty = check_typedef(&self.ty);
        if !matches!(ty.kind(), TypeKind::Float) {
            return None;
        }
        let bytes = self.contents.as_deref()?;
        match bytes.len() {
            4 => Some(f32::from_le_bytes(bytes.try_into().ok()?) as f64),
            8 => Some(f64::from_le_bytes(bytes.try_into().ok()?)),
            _ => None,
        }
    }

    /// Decode a pointer or reference as a target address.
    pub fn as_address(&self) -> Option<u64> {
        let ty = check_typedef(&self.ty);
        if !ty.is_pointer_or_reference() {
            return None;
        }
        self.raw_bits().map(|bits| bits as u64)
    }
}

/// Sign-extend the low `size` bytes of `bits`.
pub fn sign_extend(bits: u128, size: u32) -> i128 {
    if size == 0 || size >= 16 {
        return bits as i128;
    }
    let shift = 128 - size * 8;
    ((bits << shift) as i128) >> shift
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Type;

    #[test]
    fn test_scalar_roundtrip() {
        let int = Type::int("int", 4, true);
        let v = Value::from_i128(int.clone(), -5);
        assert_eq!(v.contents().unwrap().len(), 4);
        assert_eq!(v.as_i128(), Some(-5));

        let uint = Type::int("unsigned int", 4, false);
        let v = Value::from_i128(uint, -1);
        assert_eq!(v.as_i128(), Some(0xffff_ffff));
    }

    #[test]
    fn test_lazy_value() {
        let int = Type::int("int", 4, true);
        let mut v = Value::lazy(int, 0x1000);
        assert!(v.is_lazy());
        assert_eq!(v.as_i128(), None);
        v.set_contents(vec![7, 0, 0, 0]);
        assert!(!v.is_lazy());
        assert_eq!(v.as_i128(), Some(7));
        assert_eq!(v.address(), Some(0x1000));
    }

    #[test]
    fn test_pointer_address() {
        let int = Type::int("int", 4, true);
        let ptr = Type::pointer_to(&int);
        let v = Value::from_i128(ptr, 0x2000);
        assert_eq!(v.as_address(), Some(0x2000));
        assert_eq!(Value::from_i128(int, 3).as_address(), None);
    }

    #[test]
    fn test_float() {
        let double = Type::float("double", 8);
        let v = Value::from_f64(double, 2.5);
        assert_eq!(v.as_f64(), Some(2.5));
        assert_eq!(v.as_i128(), Some(2));
    }

    #[test]
    fn test_sign_extend() {
        assert_eq!(sign_extend(0xff, 1), -1);
        assert_eq!(sign_extend(0x7f, 1), 127);
        assert_eq!(sign_extend(0xfffe, 2), -2);
    }
}
