//! The hash-consed type algebra.
//!
//! A [`Type`] is a cheap `Copy` handle into a [`TypeInterner`]. Two handles
//! compare equal iff the structural data they point to (variant, children,
//! and the mutability bit) is identical; the interner guarantees this by
//! hash-consing on construction, so `Type` never needs a custom `PartialEq`
//! that walks children.

use std::collections::HashMap;
use talonc_base::{Interner, Symbol};

/// The size of an `Array` type: either a compile-time constant or unsized
/// (as in a bare `T[]` parameter/return position).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArraySize {
    Fixed(i64),
    Unsized,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Basic {
        name: Symbol,
        generic_args: Vec<Type>,
    },
    Pointer {
        pointee: Type,
        is_reference: bool,
    },
    Array {
        element: Type,
        size: ArraySize,
    },
    Range {
        element: Type,
        inclusive: bool,
    },
    Function {
        ret: Type,
        params: Vec<Type>,
    },
    Tuple {
        subtypes: Vec<Type>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TypeData {
    kind: TypeKind,
    mutable: bool,
}

/// A hash-consed handle into a [`TypeInterner`]. Cheap to copy, compare, and
/// hash; never mutated after construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Type(u32);

macro_rules! builtin_scalars {
    ($($name:ident => $str:expr),+ $(,)?) => {
        pub const BUILTIN_SCALAR_NAMES: &[&str] = &[$($str),+];
    };
}

builtin_scalars! {
    Int => "int", Int8 => "int8", Int16 => "int16", Int32 => "int32", Int64 => "int64",
    UInt => "uint", UInt8 => "uint8", UInt16 => "uint16", UInt32 => "uint32", UInt64 => "uint64",
    Float => "float", Float64 => "float64", Bool => "bool", Char => "char",
    StringTy => "string", Void => "void", Null => "null",
}

const SIGNED_INTS: &[&str] = &["int", "int8", "int16", "int32", "int64"];
const UNSIGNED_INTS: &[&str] = &["uint", "uint8", "uint16", "uint32", "uint64"];
const FLOATS: &[&str] = &["float", "float64"];

/// Owns the canonical, hash-consed storage for every `Type` constructed
/// during a compilation, plus the name interner shared with type/decl names.
pub struct TypeInterner {
    names: Interner,
    map: HashMap<TypeData, Type>,
    data: Vec<TypeData>,
}

impl TypeInterner {
    pub fn new() -> Self {
        Self {
            names: Interner::new(),
            map: HashMap::new(),
            data: Vec::new(),
        }
    }

    pub fn names(&mut self) -> &mut Interner {
        &mut self.names
    }

    pub fn name_str(&self, symbol: Symbol) -> &str {
        self.names.resolve(symbol)
    }

    fn intern(&mut self, kind: TypeKind, mutable: bool) -> Type {
        let data = TypeData { kind, mutable };
        if let Some(&ty) = self.map.get(&data) {
            return ty;
        }
        let id = Type(self.data.len() as u32);
        self.data.push(data.clone());
        self.map.insert(data, id);
        id
    }

    fn data(&self, ty: Type) -> &TypeData {
        &self.data[ty.0 as usize]
    }

    pub fn kind(&self, ty: Type) -> &TypeKind {
        &self.data(ty).kind
    }

    pub fn is_mutable(&self, ty: Type) -> bool {
        self.data(ty).mutable
    }

    /// Re-interns the same structural type with a different mutability bit.
    /// Never mutates the existing interned value.
    pub fn set_mutable(&mut self, ty: Type, mutable: bool) -> Type {
        let kind = self.data(ty).kind.clone();
        self.intern(kind, mutable)
    }

    pub fn as_mutable(&mut self, ty: Type) -> Type {
        self.set_mutable(ty, true)
    }

    pub fn as_immutable(&mut self, ty: Type) -> Type {
        self.set_mutable(ty, false)
    }

    pub fn basic(&mut self, name: &str, generic_args: Vec<Type>, mutable: bool) -> Type {
        let sym = self.names.intern(name);
        self.intern(
            TypeKind::Basic {
                name: sym,
                generic_args,
            },
            mutable,
        )
    }

    pub fn basic_sym(&mut self, name: Symbol, generic_args: Vec<Type>, mutable: bool) -> Type {
        self.intern(
            TypeKind::Basic {
                name,
                generic_args,
            },
            mutable,
        )
    }

    pub fn pointer(&mut self, pointee: Type, is_reference: bool, mutable: bool) -> Type {
        self.intern(
            TypeKind::Pointer {
                pointee,
                is_reference,
            },
            mutable,
        )
    }

    pub fn array(&mut self, element: Type, size: ArraySize, mutable: bool) -> Type {
        self.intern(TypeKind::Array { element, size }, mutable)
    }

    pub fn range(&mut self, element: Type, inclusive: bool, mutable: bool) -> Type {
        self.intern(TypeKind::Range { element, inclusive }, mutable)
    }

    pub fn function(&mut self, ret: Type, params: Vec<Type>, mutable: bool) -> Type {
        self.intern(TypeKind::Function { ret, params }, mutable)
    }

    pub fn tuple(&mut self, subtypes: Vec<Type>, mutable: bool) -> Type {
        self.intern(TypeKind::Tuple { subtypes }, mutable)
    }

    pub fn int(&mut self) -> Type {
        self.basic("int", vec![], false)
    }

    pub fn int64(&mut self) -> Type {
        self.basic("int64", vec![], false)
    }

    pub fn float64(&mut self) -> Type {
        self.basic("float64", vec![], false)
    }

    pub fn bool(&mut self) -> Type {
        self.basic("bool", vec![], false)
    }

    pub fn string(&mut self) -> Type {
        self.basic("string", vec![], false)
    }

    pub fn void(&mut self) -> Type {
        self.basic("void", vec![], false)
    }

    pub fn null(&mut self) -> Type {
        self.basic("null", vec![], false)
    }

    pub fn char_ty(&mut self) -> Type {
        self.basic("char", vec![], false)
    }

    pub fn uint64(&mut self) -> Type {
        self.basic("uint64", vec![], false)
    }
}

impl Default for TypeInterner {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether `name` is one of the closed set of builtin scalar type names.
pub fn is_builtin_scalar(name: &str) -> bool {
    BUILTIN_SCALAR_NAMES.contains(&name)
}

impl Type {
    pub fn name<'a>(self, interner: &'a TypeInterner) -> Option<&'a str> {
        match interner.kind(self) {
            TypeKind::Basic { name, .. } => Some(interner.name_str(*name)),
            _ => None,
        }
    }

    pub fn generic_args(self, interner: &TypeInterner) -> &[Type] {
        match interner.kind(self) {
            TypeKind::Basic { generic_args, .. } => generic_args,
            _ => &[],
        }
    }

    pub fn is_basic_named(self, interner: &TypeInterner, name: &str) -> bool {
        self.name(interner) == Some(name)
    }

    pub fn is_integer(self, interner: &TypeInterner) -> bool {
        self.name(interner)
            .map(|n| SIGNED_INTS.contains(&n) || UNSIGNED_INTS.contains(&n))
            .unwrap_or(false)
    }

    pub fn is_signed(self, interner: &TypeInterner) -> bool {
        self.name(interner).map(|n| SIGNED_INTS.contains(&n)).unwrap_or(false)
    }

    pub fn is_floating_point(self, interner: &TypeInterner) -> bool {
        self.name(interner).map(|n| FLOATS.contains(&n)).unwrap_or(false)
    }

    pub fn is_bool(self, interner: &TypeInterner) -> bool {
        self.is_basic_named(interner, "bool")
    }

    pub fn is_void(self, interner: &TypeInterner) -> bool {
        self.is_basic_named(interner, "void")
    }

    pub fn is_null(self, interner: &TypeInterner) -> bool {
        self.is_basic_named(interner, "null")
    }

    pub fn is_string(self, interner: &TypeInterner) -> bool {
        self.is_basic_named(interner, "string")
    }

    pub fn is_pointer(self, interner: &TypeInterner) -> bool {
        matches!(interner.kind(self), TypeKind::Pointer { .. })
    }

    pub fn is_reference(self, interner: &TypeInterner) -> bool {
        matches!(interner.kind(self), TypeKind::Pointer { is_reference: true, .. })
    }

    pub fn is_nullable_pointer(self, interner: &TypeInterner) -> bool {
        matches!(interner.kind(self), TypeKind::Pointer { is_reference: false, .. })
    }

    pub fn is_array(self, interner: &TypeInterner) -> bool {
        matches!(interner.kind(self), TypeKind::Array { .. })
    }

    pub fn is_range(self, interner: &TypeInterner) -> bool {
        matches!(interner.kind(self), TypeKind::Range { .. })
    }

    pub fn is_function(self, interner: &TypeInterner) -> bool {
        matches!(interner.kind(self), TypeKind::Function { .. })
    }

    pub fn is_tuple(self, interner: &TypeInterner) -> bool {
        matches!(interner.kind(self), TypeKind::Tuple { .. })
    }

    pub fn pointee(self, interner: &TypeInterner) -> Option<Type> {
        match interner.kind(self) {
            TypeKind::Pointer { pointee, .. } => Some(*pointee),
            _ => None,
        }
    }

    pub fn element_type(self, interner: &TypeInterner) -> Option<Type> {
        match interner.kind(self) {
            TypeKind::Array { element, .. } => Some(*element),
            TypeKind::Range { element, .. } => Some(*element),
            _ => None,
        }
    }

    pub fn array_size(self, interner: &TypeInterner) -> Option<ArraySize> {
        match interner.kind(self) {
            TypeKind::Array { size, .. } => Some(*size),
            _ => None,
        }
    }

    pub fn range_inclusive(self, interner: &TypeInterner) -> Option<bool> {
        match interner.kind(self) {
            TypeKind::Range { inclusive, .. } => Some(*inclusive),
            _ => None,
        }
    }

    pub fn param_types(self, interner: &TypeInterner) -> &[Type] {
        match interner.kind(self) {
            TypeKind::Function { params, .. } => params,
            _ => &[],
        }
    }

    pub fn return_type(self, interner: &TypeInterner) -> Option<Type> {
        match interner.kind(self) {
            TypeKind::Function { ret, .. } => Some(*ret),
            _ => None,
        }
    }

    pub fn tuple_subtypes(self, interner: &TypeInterner) -> &[Type] {
        match interner.kind(self) {
            TypeKind::Tuple { subtypes } => subtypes,
            _ => &[],
        }
    }

    pub fn is_mutable(self, interner: &TypeInterner) -> bool {
        interner.is_mutable(self)
    }

    /// The bare type name of a `Basic` type, if any, regardless of whether
    /// it is a builtin scalar. Whether a named type has value semantics
    /// (`struct`) or reference semantics (`class`) is recorded on its
    /// `TypeDecl`, not on `Type` itself, since `Type` has no access to the
    /// declaration table; the type checker consults that table directly.
    pub fn named(self, interner: &TypeInterner) -> Option<Symbol> {
        match interner.kind(self) {
            TypeKind::Basic { name, .. } => Some(*name),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_structure_and_mutability_interns_to_same_handle() {
        let mut interner = TypeInterner::new();
        let a = interner.basic("int", vec![], false);
        let b = interner.basic("int", vec![], false);
        assert_eq!(a, b);
    }

    #[test]
    fn different_mutability_interns_to_different_handle() {
        let mut interner = TypeInterner::new();
        let immutable = interner.basic("int", vec![], false);
        let mutable = interner.basic("int", vec![], true);
        assert_ne!(immutable, mutable);
    }

    #[test]
    fn set_mutable_round_trips() {
        let mut interner = TypeInterner::new();
        let t = interner.basic("int", vec![], true);
        let back = interner.as_immutable(t);
        let original_immutable = interner.basic("int", vec![], false);
        assert_eq!(back, original_immutable);
        assert!(!interner.is_mutable(back));
    }

    #[test]
    fn as_mutable_then_as_immutable_is_idempotent() {
        let mut interner = TypeInterner::new();
        let t = interner.int();
        let round = interner.as_mutable(interner.as_immutable(t));
        let expected = interner.as_mutable(t);
        assert_eq!(round, expected);
    }

    #[test]
    fn pointer_predicates() {
        let mut interner = TypeInterner::new();
        let int = interner.int();
        let nullable = interner.pointer(int, false, false);
        let reference = interner.pointer(int, true, false);
        assert!(nullable.is_pointer(&interner));
        assert!(nullable.is_nullable_pointer(&interner));
        assert!(!nullable.is_reference(&interner));
        assert!(reference.is_reference(&interner));
        assert!(!reference.is_nullable_pointer(&interner));
        assert_eq!(nullable.pointee(&interner), Some(int));
    }

    #[test]
    fn array_element_and_size() {
        let mut interner = TypeInterner::new();
        let int = interner.int();
        let arr = interner.array(int, ArraySize::Fixed(3), false);
        assert!(arr.is_array(&interner));
        assert_eq!(arr.element_type(&interner), Some(int));
        assert_eq!(arr.array_size(&interner), Some(ArraySize::Fixed(3)));
    }

    #[test]
    fn integer_and_float_predicates_cover_all_widths() {
        let mut interner = TypeInterner::new();
        for name in ["int", "int8", "int64", "uint", "uint64"] {
            let t = interner.basic(name, vec![], false);
            assert!(t.is_integer(&interner), "{name} should be integer");
        }
        for name in ["float", "float64"] {
            let t = interner.basic(name, vec![], false);
            assert!(t.is_floating_point(&interner), "{name} should be float");
        }
        let b = interner.bool();
        assert!(!b.is_integer(&interner));
    }

    #[test]
    fn signed_vs_unsigned() {
        let mut interner = TypeInterner::new();
        let i = interner.basic("int32", vec![], false);
        let u = interner.basic("uint32", vec![], false);
        assert!(i.is_signed(&interner));
        assert!(!u.is_signed(&interner));
    }

    #[test]
    fn function_params_and_return() {
        let mut interner = TypeInterner::new();
        let int = interner.int();
        let b = interner.bool();
        let f = interner.function(b, vec![int, int], false);
        assert_eq!(f.param_types(&interner), &[int, int]);
        assert_eq!(f.return_type(&interner), Some(b));
    }

    #[test]
    fn tuple_subtypes_accessor() {
        let mut interner = TypeInterner::new();
        let int = interner.int();
        let b = interner.bool();
        let t = interner.tuple(vec![int, b], false);
        assert_eq!(t.tuple_subtypes(&interner), &[int, b]);
    }

    #[test]
    fn generic_args_round_trip() {
        let mut interner = TypeInterner::new();
        let int = interner.int();
        let array_ty = interner.basic("Array", vec![int], false);
        assert_eq!(array_ty.generic_args(&interner), &[int]);
    }
}
