//! Type references and type descriptors.
//!
//! A [`TypeRef`] is a syntactic reference to a type as it appears in a field or handler
//! signature (`Vec<User>`, `Option<String>`, `Page<Order>`). A [`TypeDescriptor`] is the
//! registered definition behind a name: a composite with members, an enum, or an opaque
//! type. The [`TypeRegistry`] maps names to descriptors and is the only thing the
//! [`walker`](crate::walker) needs to know about the program's types, so it can be filled
//! either by hand or from parsed source (see [`source`](crate::source)).

use crate::error::{Error, Result};
use log::debug;
use std::collections::HashMap;
use std::fmt;

/// Name used for a type that cannot be resolved statically (`_`, unbound generic parameters).
pub const INFERRED: &str = "_";

/// A reference to a type: base name plus generic arguments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeRef {
    /// The base type name (e.g. "Vec", "User", "i32")
    pub name: String,
    /// Generic type arguments in declaration order
    pub args: Vec<TypeRef>,
}

impl TypeRef {
    /// Create a reference to a non-generic type
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }

    /// Create a reference to a generic type with arguments
    pub fn generic(name: impl Into<String>, args: Vec<TypeRef>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }

    /// The statically unresolvable type
    pub fn inferred() -> Self {
        Self::named(INFERRED)
    }

    pub fn is_inferred(&self) -> bool {
        self.name == INFERRED
    }

    pub fn is_option(&self) -> bool {
        self.name == "Option" && self.args.len() == 1
    }

    pub fn first_arg(&self) -> Option<&TypeRef> {
        self.args.first()
    }

    /// Parse a Rust type expression such as `"Vec<Option<User>>"`.
    pub fn parse(src: &str) -> Result<TypeRef> {
        let ty: syn::Type = syn::parse_str(src)
            .map_err(|e| Error::InvalidArgument(format!("invalid type `{}`: {}", src, e)))?;
        Ok(Self::from_syn(&ty))
    }

    /// Convert a parsed `syn::Type` into a reference.
    ///
    /// Only the last path segment is kept (`web::Json<T>` becomes `Json<T>`). References
    /// and parentheses are looked through, slices and arrays become `Vec<T>`.
    pub fn from_syn(ty: &syn::Type) -> TypeRef {
        match ty {
            syn::Type::Path(type_path) => match type_path.path.segments.last() {
                Some(segment) => {
                    let mut args = Vec::new();
                    if let syn::PathArguments::AngleBracketed(generic) = &segment.arguments {
                        for arg in &generic.args {
                            if let syn::GenericArgument::Type(inner) = arg {
                                args.push(Self::from_syn(inner));
                            }
                        }
                    }
                    TypeRef::generic(segment.ident.to_string(), args)
                }
                None => TypeRef::named("Unknown"),
            },
            syn::Type::Reference(reference) => Self::from_syn(&reference.elem),
            syn::Type::Paren(paren) => Self::from_syn(&paren.elem),
            syn::Type::Group(group) => Self::from_syn(&group.elem),
            syn::Type::Slice(slice) => TypeRef::generic("Vec", vec![Self::from_syn(&slice.elem)]),
            syn::Type::Array(array) => TypeRef::generic("Vec", vec![Self::from_syn(&array.elem)]),
            syn::Type::Infer(_) => TypeRef::inferred(),
            syn::Type::Tuple(tuple) => {
                let parts: Vec<String> = tuple
                    .elems
                    .iter()
                    .map(|elem| Self::from_syn(elem).to_string())
                    .collect();
                TypeRef::named(format!("({})", parts.join(", ")))
            }
            syn::Type::ImplTrait(impl_trait) => {
                let bounds: Vec<String> = impl_trait
                    .bounds
                    .iter()
                    .filter_map(|bound| match bound {
                        syn::TypeParamBound::Trait(trait_bound) => trait_bound
                            .path
                            .segments
                            .last()
                            .map(|s| s.ident.to_string()),
                        _ => None,
                    })
                    .collect();
                TypeRef::named(format!("impl {}", bounds.join(" + ")))
            }
            _ => TypeRef::named("Unknown"),
        }
    }

    /// Replace generic parameter names with their bound arguments.
    pub fn substitute(&self, bindings: &HashMap<String, TypeRef>) -> TypeRef {
        if self.args.is_empty() {
            if let Some(bound) = bindings.get(&self.name) {
                return bound.clone();
            }
        }
        TypeRef {
            name: self.name.clone(),
            args: self.args.iter().map(|arg| arg.substitute(bindings)).collect(),
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.args.is_empty() {
            let args: Vec<String> = self.args.iter().map(|a| a.to_string()).collect();
            write!(f, "<{}>", args.join(", "))?;
        }
        Ok(())
    }
}

/// Leaf kinds that never recurse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveKind {
    Text,
    Boolean,
    Integer,
    Float,
    Date,
    DateTime,
    Time,
    Uuid,
    Decimal,
    Void,
    Bytes,
}

impl PrimitiveKind {
    /// Classify a type reference by name. Registered enums are classified by the walker.
    pub fn classify(ty: &TypeRef) -> Option<PrimitiveKind> {
        if ty.name == "Vec" && ty.args.len() == 1 && ty.args[0].name == "u8" {
            return Some(PrimitiveKind::Bytes);
        }
        let kind = match ty.name.as_str() {
            "String" | "str" | "char" => PrimitiveKind::Text,
            "bool" => PrimitiveKind::Boolean,
            "i8" | "i16" | "i32" | "i64" | "i128" | "isize" | "u8" | "u16" | "u32" | "u64"
            | "u128" | "usize" => PrimitiveKind::Integer,
            "f32" | "f64" => PrimitiveKind::Float,
            "NaiveDate" | "Date" => PrimitiveKind::Date,
            "DateTime" | "NaiveDateTime" | "OffsetDateTime" | "PrimitiveDateTime"
            | "SystemTime" | "Timestamp" => PrimitiveKind::DateTime,
            "NaiveTime" | "Time" | "Duration" => PrimitiveKind::Time,
            "Uuid" => PrimitiveKind::Uuid,
            "Decimal" | "BigDecimal" | "BigInt" | "BigUint" => PrimitiveKind::Decimal,
            "()" => PrimitiveKind::Void,
            "Bytes" => PrimitiveKind::Bytes,
            _ => return None,
        };
        Some(kind)
    }

    /// Schema format implied by the kind alone
    pub fn implied_format(self) -> Option<&'static str> {
        match self {
            PrimitiveKind::Date => Some("date"),
            PrimitiveKind::DateTime => Some("date-time"),
            PrimitiveKind::Uuid => Some("uuid"),
            _ => None,
        }
    }
}

/// Declarative validation marker attached to a member.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationMarker {
    NotNull,
    NotBlank,
    NotEmpty,
    Length { min: Option<u64>, max: Option<u64> },
    Range { min: Option<f64>, max: Option<f64> },
    /// Email format, optionally carrying the pattern it validates against
    Email { pattern: Option<String> },
    Url,
    Pattern(String),
}

impl ValidationMarker {
    /// Whether the marker demands the member be present
    pub fn is_presence(&self) -> bool {
        matches!(
            self,
            ValidationMarker::NotNull | ValidationMarker::NotBlank | ValidationMarker::NotEmpty
        )
    }
}

/// A declared member of a composite type
#[derive(Debug, Clone, PartialEq)]
pub struct MemberDescriptor {
    pub name: String,
    pub ty: TypeRef,
    pub markers: Vec<ValidationMarker>,
}

impl MemberDescriptor {
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            ty,
            markers: Vec::new(),
        }
    }

    pub fn with_marker(mut self, marker: ValidationMarker) -> Self {
        self.markers.push(marker);
        self
    }
}

/// What kind of definition sits behind a registered name
#[derive(Debug, Clone, PartialEq)]
pub enum DescriptorKind {
    Composite {
        /// Generic parameter names, bound positionally to a reference's arguments
        generics: Vec<String>,
        members: Vec<MemberDescriptor>,
    },
    Enum {
        variants: Vec<String>,
    },
    /// Known to exist but not introspectable
    Opaque,
}

/// A registered type definition
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDescriptor {
    pub name: String,
    pub kind: DescriptorKind,
}

impl TypeDescriptor {
    pub fn composite(name: impl Into<String>, members: Vec<MemberDescriptor>) -> Self {
        Self {
            name: name.into(),
            kind: DescriptorKind::Composite {
                generics: Vec::new(),
                members,
            },
        }
    }

    /// Declare generic parameters on a composite; no effect on other kinds.
    pub fn with_generics(mut self, params: &[&str]) -> Self {
        if let DescriptorKind::Composite { generics, .. } = &mut self.kind {
            *generics = params.iter().map(|p| p.to_string()).collect();
        }
        self
    }

    pub fn enumeration(name: impl Into<String>, variants: Vec<String>) -> Self {
        Self {
            name: name.into(),
            kind: DescriptorKind::Enum { variants },
        }
    }

    pub fn opaque(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: DescriptorKind::Opaque,
        }
    }
}

/// Name-indexed collection of type descriptors
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types: HashMap<String, TypeDescriptor>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a descriptor. The first registration of a name wins.
    pub fn register(&mut self, descriptor: TypeDescriptor) {
        if self.types.contains_key(&descriptor.name) {
            debug!("Type {} already registered, keeping the first definition", descriptor.name);
            return;
        }
        self.types.insert(descriptor.name.clone(), descriptor);
    }

    /// Builder-style variant of [`register`](Self::register)
    pub fn with(mut self, descriptor: TypeDescriptor) -> Self {
        self.register(descriptor);
        self
    }

    pub fn get(&self, name: &str) -> Option<&TypeDescriptor> {
        self.types.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
