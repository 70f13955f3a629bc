//! Recursive type introspection.
//!
//! [`TypeGraphWalker`] turns a [`TypeRef`] into a finite [`TypeNode`] tree using the
//! definitions in a [`TypeRegistry`]. Type graphs may be self- or mutually-referential;
//! cycles are cut with [`TypeNode::CircularRef`] using a visited set that is scoped to the
//! current path, so two sibling fields referencing the same type both expand fully.
//!
//! The walker never fails: anything it cannot introspect becomes a primitive leaf named
//! after the type.

use crate::constraints::ConstraintExtractor;
use crate::model::{FieldNode, TypeNode};
use crate::types::{DescriptorKind, MemberDescriptor, PrimitiveKind, TypeRef, TypeRegistry};
use log::debug;
use std::collections::{HashMap, HashSet};

/// Leaf name for statically unresolvable types
pub const OBJECT: &str = "Object";

/// Wrappers that are looked through to their first argument
const TRANSPARENT_WRAPPERS: &[&str] = &["Option", "Box", "Rc", "Arc", "Cow", "RefCell"];

/// Sequence and set types rendered as arrays of their first argument
const COLLECTIONS: &[&str] = &[
    "Vec",
    "VecDeque",
    "LinkedList",
    "HashSet",
    "BTreeSet",
    "BinaryHeap",
    "IndexSet",
];

/// Walks type references into schema trees. Cheap to construct; holds no mutable state.
#[derive(Debug, Clone, Copy)]
pub struct TypeGraphWalker<'r> {
    registry: &'r TypeRegistry,
    constraints: ConstraintExtractor,
}

impl<'r> TypeGraphWalker<'r> {
    pub fn new(registry: &'r TypeRegistry) -> Self {
        Self {
            registry,
            constraints: ConstraintExtractor::new(),
        }
    }

    /// Walk a type starting from an empty path
    pub fn walk(&self, ty: &TypeRef) -> TypeNode {
        self.walk_with(ty, &HashSet::new())
    }

    /// Walk a type with `visited` holding the composite names of its ancestors.
    pub fn walk_with(&self, ty: &TypeRef, visited: &HashSet<String>) -> TypeNode {
        if ty.is_inferred() {
            return TypeNode::primitive(OBJECT);
        }

        if TRANSPARENT_WRAPPERS.contains(&ty.name.as_str()) {
            if let Some(inner) = ty.first_arg() {
                return self.walk_with(inner, visited);
            }
        }

        // a user struct named like a well-known scalar (Date, Duration...) is still a struct
        if PrimitiveKind::classify(ty).is_some() && !self.is_registered_composite(&ty.name) {
            return TypeNode::primitive(ty.to_string());
        }

        if COLLECTIONS.contains(&ty.name.as_str()) {
            let item = match ty.first_arg() {
                Some(element) if !element.is_inferred() => self.walk_with(element, visited),
                _ => TypeNode::primitive(OBJECT),
            };
            return TypeNode::array(item);
        }

        let Some(descriptor) = self.registry.get(&ty.name) else {
            debug!("Type {} is not registered, treating it as opaque", ty);
            return TypeNode::primitive(ty.to_string());
        };

        match &descriptor.kind {
            DescriptorKind::Enum { .. } => TypeNode::primitive(ty.name.clone()),
            DescriptorKind::Opaque => TypeNode::primitive(ty.to_string()),
            DescriptorKind::Composite { generics, members } => {
                if visited.contains(&ty.name) {
                    debug!("Circular reference to {}", ty.name);
                    return TypeNode::CircularRef(ty.name.clone());
                }
                self.walk_composite(ty, generics, members, visited)
            }
        }
    }

    fn is_registered_composite(&self, name: &str) -> bool {
        matches!(
            self.registry.get(name).map(|descriptor| &descriptor.kind),
            Some(DescriptorKind::Composite { .. })
        )
    }

    fn walk_composite(
        &self,
        ty: &TypeRef,
        generics: &[String],
        members: &[MemberDescriptor],
        visited: &HashSet<String>,
    ) -> TypeNode {
        let mut path = visited.clone();
        path.insert(ty.name.clone());

        let bindings: HashMap<String, TypeRef> = generics
            .iter()
            .enumerate()
            .map(|(i, param)| {
                let bound = ty.args.get(i).cloned().unwrap_or_else(TypeRef::inferred);
                (param.clone(), bound)
            })
            .collect();

        let mut fields = Vec::with_capacity(members.len());
        let mut required = Vec::new();
        for member in members {
            let member_ty = member.ty.substitute(&bindings);
            // each member descends with its own copy of the path
            let node = self.walk_with(&member_ty, &path);
            if self.constraints.is_required(member) {
                required.push(member.name.clone());
            }
            fields.push(FieldNode {
                name: member.name.clone(),
                node,
                constraints: self.constraints.extract(member),
            });
        }

        TypeNode::Object {
            class_name: ty.name.clone(),
            fields,
            required,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Constraints;
    use crate::types::{TypeDescriptor, ValidationMarker};
    use pretty_assertions::assert_eq;

    fn ty(src: &str) -> TypeRef {
        TypeRef::parse(src).unwrap()
    }

    fn member(name: &str, src: &str) -> MemberDescriptor {
        MemberDescriptor::new(name, ty(src))
    }

    fn depth(node: &TypeNode) -> usize {
        match node {
            TypeNode::Object { fields, .. } => {
                1 + fields.iter().map(|f| depth(&f.node)).max().unwrap_or(0)
            }
            TypeNode::Array(item) => 1 + depth(item),
            TypeNode::Primitive(_) | TypeNode::CircularRef(_) => 0,
        }
    }

    fn field<'a>(node: &'a TypeNode, name: &str) -> &'a TypeNode {
        match node {
            TypeNode::Object { fields, .. } => {
                &fields
                    .iter()
                    .find(|f| f.name == name)
                    .unwrap_or_else(|| panic!("no field {}", name))
                    .node
            }
            other => panic!("expected object, got {:?}", other),
        }
    }

    fn shop_registry() -> TypeRegistry {
        TypeRegistry::new()
            .with(TypeDescriptor::composite(
                "Order",
                vec![
                    member("id", "u64"),
                    member("customer", "Customer"),
                    member("lines", "Vec<OrderLine>"),
                    member("status", "Status"),
                ],
            ))
            .with(TypeDescriptor::composite(
                "Customer",
                vec![member("name", "String"), member("address", "Address")],
            ))
            .with(TypeDescriptor::composite(
                "Address",
                vec![member("street", "String"), member("zip", "Option<String>")],
            ))
            .with(TypeDescriptor::composite(
                "OrderLine",
                vec![member("sku", "String"), member("quantity", "u32")],
            ))
            .with(TypeDescriptor::enumeration(
                "Status",
                vec!["Open".into(), "Closed".into()],
            ))
    }

    #[test]
    fn test_primitives_short_circuit() {
        let registry = TypeRegistry::new();
        let walker = TypeGraphWalker::new(&registry);
        assert_eq!(walker.walk(&ty("String")), TypeNode::primitive("String"));
        assert_eq!(walker.walk(&ty("Uuid")), TypeNode::primitive("Uuid"));
        assert_eq!(walker.walk(&ty("Vec<u8>")), TypeNode::primitive("Vec<u8>"));
        assert_eq!(walker.walk(&ty("()")), TypeNode::primitive("()"));
    }

    #[test]
    fn test_registered_struct_named_like_a_scalar_is_expanded() {
        let registry = TypeRegistry::new()
            .with(TypeDescriptor::composite(
                "Date",
                vec![member("day", "u8"), member("month", "u8")],
            ))
            .with(TypeDescriptor::composite("Event", vec![member("on", "Date")]));
        let walker = TypeGraphWalker::new(&registry);

        let date = field(&walker.walk(&ty("Event")), "on").clone();
        match date {
            TypeNode::Object { class_name, fields, .. } => {
                assert_eq!(class_name, "Date");
                assert_eq!(fields.len(), 2);
            }
            other => panic!("expected object, got {:?}", other),
        }

        // unregistered it stays a scalar
        let empty = TypeRegistry::new();
        assert_eq!(
            TypeGraphWalker::new(&empty).walk(&ty("Date")),
            TypeNode::primitive("Date")
        );
    }

    #[test]
    fn test_acyclic_depth_matches_structure() {
        let registry = shop_registry();
        let walker = TypeGraphWalker::new(&registry);
        let node = walker.walk(&ty("Order"));

        // Order -> Customer -> Address -> String
        assert_eq!(depth(&node), 3);
        assert_eq!(field(&node, "status"), &TypeNode::primitive("Status"));
        assert_eq!(
            field(field(&node, "customer"), "address"),
            &TypeNode::Object {
                class_name: "Address".to_string(),
                fields: vec![
                    FieldNode {
                        name: "street".to_string(),
                        node: TypeNode::primitive("String"),
                        constraints: None,
                    },
                    FieldNode {
                        name: "zip".to_string(),
                        node: TypeNode::primitive("String"),
                        constraints: None,
                    },
                ],
                required: vec![],
            }
        );
        match field(&node, "lines") {
            TypeNode::Array(item) => assert!(matches!(**item, TypeNode::Object { .. })),
            other => panic!("expected array, got {:?}", other),
        }
    }

    #[test]
    fn test_walk_is_idempotent() {
        let registry = shop_registry();
        let walker = TypeGraphWalker::new(&registry);
        assert_eq!(walker.walk(&ty("Order")), walker.walk(&ty("Order")));
    }

    #[test]
    fn test_self_reference_becomes_circular_ref() {
        let registry = TypeRegistry::new().with(TypeDescriptor::composite(
            "A",
            vec![member("value", "i32"), member("next", "Option<Box<A>>")],
        ));
        let walker = TypeGraphWalker::new(&registry);
        let node = walker.walk(&ty("A"));
        assert_eq!(field(&node, "next"), &TypeNode::CircularRef("A".to_string()));
    }

    #[test]
    fn test_mutual_reference_breaks_at_back_edge() {
        let registry = TypeRegistry::new()
            .with(TypeDescriptor::composite("A", vec![member("b", "B")]))
            .with(TypeDescriptor::composite("B", vec![member("a", "A")]));
        let walker = TypeGraphWalker::new(&registry);
        let node = walker.walk(&ty("A"));
        let b = field(&node, "b");
        assert!(matches!(b, TypeNode::Object { class_name, .. } if class_name == "B"));
        assert_eq!(field(b, "a"), &TypeNode::CircularRef("A".to_string()));
    }

    #[test]
    fn test_self_reference_through_collection() {
        let registry = TypeRegistry::new().with(TypeDescriptor::composite(
            "Category",
            vec![member("name", "String"), member("children", "Vec<Category>")],
        ));
        let walker = TypeGraphWalker::new(&registry);
        let node = walker.walk(&ty("Category"));
        assert_eq!(
            field(&node, "children"),
            &TypeNode::array(TypeNode::CircularRef("Category".to_string()))
        );
    }

    #[test]
    fn test_siblings_expand_same_type_independently() {
        let registry = TypeRegistry::new()
            .with(TypeDescriptor::composite(
                "Shipment",
                vec![member("from", "Address"), member("to", "Address")],
            ))
            .with(TypeDescriptor::composite("Address", vec![member("city", "String")]));
        let walker = TypeGraphWalker::new(&registry);
        let node = walker.walk(&ty("Shipment"));
        assert!(matches!(field(&node, "from"), TypeNode::Object { .. }));
        assert!(matches!(field(&node, "to"), TypeNode::Object { .. }));
    }

    #[test]
    fn test_generic_composite_binds_arguments() {
        let registry = TypeRegistry::new()
            .with(
                TypeDescriptor::composite(
                    "Page",
                    vec![member("items", "Vec<T>"), member("total", "u64")],
                )
                .with_generics(&["T"]),
            )
            .with(TypeDescriptor::composite("User", vec![member("name", "String")]));
        let walker = TypeGraphWalker::new(&registry);

        let node = walker.walk(&ty("Page<User>"));
        match field(&node, "items") {
            TypeNode::Array(item) => {
                assert!(matches!(&**item, TypeNode::Object { class_name, .. } if class_name == "User"))
            }
            other => panic!("expected array, got {:?}", other),
        }

        let unbound = walker.walk(&ty("Page"));
        assert_eq!(
            field(&unbound, "items"),
            &TypeNode::array(TypeNode::primitive(OBJECT))
        );
    }

    #[test]
    fn test_unresolvable_collection_element() {
        let registry = TypeRegistry::new();
        let walker = TypeGraphWalker::new(&registry);
        assert_eq!(
            walker.walk(&ty("Vec<_>")),
            TypeNode::array(TypeNode::primitive(OBJECT))
        );
        assert_eq!(
            walker.walk(&TypeRef::named("HashSet")),
            TypeNode::array(TypeNode::primitive(OBJECT))
        );
    }

    #[test]
    fn test_unknown_and_exotic_types_degrade() {
        let registry = TypeRegistry::new().with(TypeDescriptor::opaque("Secret"));
        let walker = TypeGraphWalker::new(&registry);
        assert_eq!(walker.walk(&ty("Mystery")), TypeNode::primitive("Mystery"));
        assert_eq!(walker.walk(&ty("Secret")), TypeNode::primitive("Secret"));
        assert_eq!(
            walker.walk(&ty("HashMap<String, i32>")),
            TypeNode::primitive("HashMap<String, i32>")
        );
        assert_eq!(
            walker.walk(&ty("(u32, String)")),
            TypeNode::primitive("(u32, String)")
        );
    }

    #[test]
    fn test_required_fields_and_constraints() {
        let registry = TypeRegistry::new().with(TypeDescriptor::composite(
            "CreateUser",
            vec![
                member("name", "String")
                    .with_marker(ValidationMarker::NotNull)
                    .with_marker(ValidationMarker::Length {
                        min: None,
                        max: Some(50),
                    }),
                member("nickname", "Option<String>"),
            ],
        ));
        let walker = TypeGraphWalker::new(&registry);
        match walker.walk(&ty("CreateUser")) {
            TypeNode::Object {
                fields, required, ..
            } => {
                assert_eq!(required, vec!["name".to_string()]);
                assert_eq!(
                    fields[0].constraints,
                    Some(Constraints {
                        max_length: Some(50),
                        ..Default::default()
                    })
                );
                assert_eq!(fields[1].constraints, None);
            }
            other => panic!("expected object, got {:?}", other),
        }
    }
}
