//! C types and their binary layout
//!
//! Types are immutable and shared through [`TypeRef`]. Every complete type
//! has a fixed size; record fields are laid out back to back with no padding.
//!
//! # Records
//!
//! A record name can be used before its definition is complete (a struct
//! holding a pointer to itself, or a forward declaration). The name is first
//! registered as a placeholder [`RecordDecl`] with no layout. Every type that
//! mentions the record shares the placeholder, and completing it fills in the
//! layout exactly once, so earlier references see the completed record.

use crate::interpreter::constants::{FUNCTION_POINTER_SIZE, POINTER_SIZE};
use std::cell::OnceCell;
use std::fmt;
use std::rc::Rc;

pub type TypeRef = Rc<Type>;

/// Scalar representations with their fixed sizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scalar {
    Char,
    UChar,
    Short,
    UShort,
    Int,
    UInt,
    Long,
    ULong,
    LongLong,
    ULongLong,
    Float,
    Double,
}

impl Scalar {
    pub fn size(self) -> usize {
        match self {
            Scalar::Char | Scalar::UChar => 1,
            Scalar::Short | Scalar::UShort => 2,
            Scalar::Int | Scalar::UInt | Scalar::Long | Scalar::ULong | Scalar::Float => 4,
            Scalar::LongLong | Scalar::ULongLong | Scalar::Double => 8,
        }
    }

    pub fn bits(self) -> u32 {
        self.size() as u32 * 8
    }

    pub fn is_signed(self) -> bool {
        matches!(
            self,
            Scalar::Char
                | Scalar::Short
                | Scalar::Int
                | Scalar::Long
                | Scalar::LongLong
                | Scalar::Float
                | Scalar::Double
        )
    }

    pub fn is_floating(self) -> bool {
        matches!(self, Scalar::Float | Scalar::Double)
    }

    pub fn name(self) -> &'static str {
        match self {
            Scalar::Char => "char",
            Scalar::UChar => "unsigned char",
            Scalar::Short => "short",
            Scalar::UShort => "unsigned short",
            Scalar::Int => "int",
            Scalar::UInt => "unsigned int",
            Scalar::Long => "long",
            Scalar::ULong => "unsigned long",
            Scalar::LongLong => "long long",
            Scalar::ULongLong => "unsigned long long",
            Scalar::Float => "float",
            Scalar::Double => "double",
        }
    }

    /// Parse a builtin type name, accepting the usual spellings
    pub fn from_name(name: &str) -> Option<Scalar> {
        Some(match name {
            "char" | "signed char" => Scalar::Char,
            "unsigned char" | "_Bool" | "bool" => Scalar::UChar,
            "short" | "short int" | "signed short" => Scalar::Short,
            "unsigned short" | "unsigned short int" => Scalar::UShort,
            "int" | "signed int" | "signed" => Scalar::Int,
            "unsigned int" | "unsigned" => Scalar::UInt,
            "long" | "long int" | "signed long" => Scalar::Long,
            "unsigned long" | "unsigned long int" => Scalar::ULong,
            "long long" | "long long int" | "signed long long" => Scalar::LongLong,
            "unsigned long long" | "unsigned long long int" => Scalar::ULongLong,
            "float" => Scalar::Float,
            "double" | "long double" => Scalar::Double,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone)]
pub struct PointerType {
    pub pointee: TypeRef,
    /// Array or function type this pointer decayed from
    pub orig: Option<TypeRef>,
}

impl PointerType {
    pub fn new(pointee: TypeRef) -> Self {
        PointerType {
            pointee,
            orig: None,
        }
    }

    pub fn size(&self) -> usize {
        match *self.pointee {
            Type::Function(_) => FUNCTION_POINTER_SIZE,
            _ => POINTER_SIZE,
        }
    }
}

// `orig` only affects display and sizeof of the decayed expression.
impl PartialEq for PointerType {
    fn eq(&self, other: &Self) -> bool {
        self.pointee == other.pointee
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArrayType {
    pub elem: TypeRef,
    /// Element count; `None` for an incomplete array
    pub count: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: TypeRef,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionType {
    pub result: TypeRef,
    pub params: Vec<Param>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub ty: TypeRef,
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordLayout {
    pub fields: Vec<Field>,
    pub size: usize,
}

impl RecordLayout {
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// A named record; the layout is filled in once when the definition completes
pub struct RecordDecl {
    pub name: String,
    layout: OnceCell<RecordLayout>,
}

impl RecordDecl {
    /// A placeholder with no layout yet
    pub fn forward(name: impl Into<String>) -> Rc<RecordDecl> {
        Rc::new(RecordDecl {
            name: name.into(),
            layout: OnceCell::new(),
        })
    }

    pub fn complete(name: impl Into<String>, layout: RecordLayout) -> Rc<RecordDecl> {
        let decl = RecordDecl::forward(name);
        let _ = decl.layout.set(layout);
        decl
    }

    /// Fill in the layout of a placeholder; false if it was already complete
    pub fn define(&self, layout: RecordLayout) -> bool {
        self.layout.set(layout).is_ok()
    }

    pub fn layout(&self) -> Option<&RecordLayout> {
        self.layout.get()
    }

    pub fn is_complete(&self) -> bool {
        self.layout.get().is_some()
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.layout()?.field(name)
    }
}

// Records are nominal. Comparing by name also keeps a self-referential
// record from recursing forever.
impl PartialEq for RecordDecl {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl fmt::Debug for RecordDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "struct {}", self.name)?;
        if !self.is_complete() {
            write!(f, " (incomplete)")?;
        }
        Ok(())
    }
}

/// C types
#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    Void,
    Scalar(Scalar),
    Pointer(PointerType),
    Array(ArrayType),
    Record(Rc<RecordDecl>),
    Function(FunctionType),
}

impl Type {
    pub fn scalar(scalar: Scalar) -> TypeRef {
        Rc::new(Type::Scalar(scalar))
    }

    pub fn int() -> TypeRef {
        Type::scalar(Scalar::Int)
    }

    pub fn void() -> TypeRef {
        Rc::new(Type::Void)
    }

    pub fn pointer_to(pointee: TypeRef) -> TypeRef {
        Rc::new(Type::Pointer(PointerType::new(pointee)))
    }

    pub fn array_of(elem: TypeRef, count: Option<usize>) -> TypeRef {
        Rc::new(Type::Array(ArrayType { elem, count }))
    }

    /// Size in bytes; zero for void and incomplete types
    pub fn size(&self) -> usize {
        match self {
            Type::Void => 0,
            Type::Scalar(s) => s.size(),
            Type::Pointer(p) => p.size(),
            Type::Array(a) => a.count.map_or(0, |n| n * a.elem.size()),
            Type::Record(decl) => decl.layout().map_or(0, |l| l.size),
            Type::Function(_) => FUNCTION_POINTER_SIZE,
        }
    }

    /// Whether storage of this type has a known size
    pub fn is_complete(&self) -> bool {
        match self {
            Type::Void => false,
            Type::Array(a) => a.count.is_some() && a.elem.is_complete(),
            Type::Record(decl) => decl.is_complete(),
            _ => true,
        }
    }

    pub fn is_composite(&self) -> bool {
        matches!(self, Type::Array(_) | Type::Record(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Type::Array(_))
    }

    pub fn as_pointer(&self) -> Option<&PointerType> {
        match self {
            Type::Pointer(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_scalar(&self) -> Option<Scalar> {
        match self {
            Type::Scalar(s) => Some(*s),
            _ => None,
        }
    }
}

/// Array to pointer-to-element, function to pointer-to-function; other
/// types are returned unchanged
pub fn decay(ty: &TypeRef) -> TypeRef {
    match &**ty {
        Type::Array(a) => Rc::new(Type::Pointer(PointerType {
            pointee: a.elem.clone(),
            orig: Some(ty.clone()),
        })),
        Type::Function(_) => Rc::new(Type::Pointer(PointerType {
            pointee: ty.clone(),
            orig: Some(ty.clone()),
        })),
        _ => ty.clone(),
    }
}

/// Sequential field offsets with no padding
pub fn layout_record(fields: &[Param]) -> RecordLayout {
    let mut size = 0;
    let fields = fields
        .iter()
        .map(|param| {
            let field = Field {
                name: param.name.clone(),
                ty: param.ty.clone(),
                offset: size,
            };
            size += param.ty.size();
            field
        })
        .collect();
    RecordLayout { fields, size }
}

/// Fill absent array counts rank by rank from an initializer shape
///
/// `dims[0]` is the outermost dimension. Declared counts win over the
/// initializer's.
pub fn resolve_incomplete_array(ty: &TypeRef, dims: &[usize]) -> TypeRef {
    fn resolve(ty: &TypeRef, dims: &[usize], rank: usize) -> TypeRef {
        match &**ty {
            Type::Array(a) if rank < dims.len() => {
                let elem = resolve(&a.elem, dims, rank + 1);
                Type::array_of(elem, Some(a.count.unwrap_or(dims[rank])))
            }
            _ => ty.clone(),
        }
    }
    resolve(ty, dims, 0)
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Void => write!(f, "void"),
            Type::Scalar(s) => write!(f, "{}", s.name()),
            Type::Pointer(p) => write!(f, "{}*", p.pointee),
            Type::Array(a) => match a.count {
                Some(n) => write!(f, "{}[{}]", a.elem, n),
                None => write!(f, "{}[]", a.elem),
            },
            Type::Record(decl) => write!(f, "struct {}", decl.name),
            Type::Function(func) => {
                write!(f, "{}(", func.result)?;
                for (i, param) in func.params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", param.ty)?;
                }
                write!(f, ")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_sizes() {
        let sizes: Vec<usize> = [
            Scalar::Char,
            Scalar::UChar,
            Scalar::Short,
            Scalar::UShort,
            Scalar::Int,
            Scalar::UInt,
            Scalar::Long,
            Scalar::ULong,
            Scalar::LongLong,
            Scalar::ULongLong,
            Scalar::Float,
            Scalar::Double,
        ]
        .iter()
        .map(|s| s.size())
        .collect();
        assert_eq!(sizes, vec![1, 1, 2, 2, 4, 4, 4, 4, 8, 8, 4, 8]);
    }

    #[test]
    fn test_pointer_size_depends_on_pointee() {
        let func = Rc::new(Type::Function(FunctionType {
            result: Type::int(),
            params: vec![],
        }));
        assert_eq!(Type::pointer_to(Type::int()).size(), 4);
        assert_eq!(Type::pointer_to(func.clone()).size(), 2);
        assert_eq!(func.size(), 2);
    }

    #[test]
    fn test_decay_remembers_original() {
        let array = Type::array_of(Type::scalar(Scalar::Short), Some(5));
        assert_eq!(array.size(), 10);

        let decayed = decay(&array);
        let pointer = decayed.as_pointer().unwrap();
        assert_eq!(*pointer.pointee, Type::Scalar(Scalar::Short));
        assert_eq!(pointer.orig.as_ref(), Some(&array));
        assert_eq!(decayed.size(), 4);

        let int = Type::int();
        assert_eq!(decay(&int), int);
    }

    #[test]
    fn test_layout_record_is_packed() {
        let layout = layout_record(&[
            Param {
                name: "c".into(),
                ty: Type::scalar(Scalar::Char),
            },
            Param {
                name: "n".into(),
                ty: Type::int(),
            },
            Param {
                name: "d".into(),
                ty: Type::scalar(Scalar::Double),
            },
        ]);
        let offsets: Vec<usize> = layout.fields.iter().map(|f| f.offset).collect();
        assert_eq!(offsets, vec![0, 1, 5]);
        assert_eq!(layout.size, 13);
    }

    #[test]
    fn test_resolve_incomplete_array() {
        let row = Type::array_of(Type::int(), Some(2));
        let matrix = Type::array_of(row, None);
        let resolved = resolve_incomplete_array(&matrix, &[3, 5]);
        // the declared inner count wins over the initializer's
        assert_eq!(resolved.to_string(), "int[2][3]");
        assert_eq!(resolved.size(), 24);

        let flat = Type::array_of(Type::int(), None);
        assert!(!flat.is_complete());
        assert_eq!(resolve_incomplete_array(&flat, &[3]).size(), 12);
    }

    #[test]
    fn test_forward_record_completed_later() {
        let node = RecordDecl::forward("node");
        let next = Type::pointer_to(Rc::new(Type::Record(node.clone())));
        assert_eq!(next.size(), 4);
        assert!(!Type::Record(node.clone()).is_complete());

        let layout = layout_record(&[
            Param {
                name: "value".into(),
                ty: Type::int(),
            },
            Param {
                name: "next".into(),
                ty: next.clone(),
            },
        ]);
        assert!(node.define(layout.clone()));
        assert!(!node.define(layout));

        // the pointer made before completion sees the layout
        let pointee = &next.as_pointer().unwrap().pointee;
        assert_eq!(pointee.size(), 8);
        assert_eq!(node.field("next").map(|f| f.offset), Some(4));
        assert_eq!(format!("{:?}", node), "struct node");
    }

    #[test]
    fn test_scalar_names() {
        assert_eq!(Scalar::from_name("unsigned"), Some(Scalar::UInt));
        assert_eq!(Scalar::from_name("long long int"), Some(Scalar::LongLong));
        assert_eq!(Scalar::from_name("wchar"), None);
        assert_eq!(Scalar::ULong.name(), "unsigned long");
    }
}
