//! Type registration from parsed source.
//!
//! Named-field structs become composites, tuple and unit structs become opaque types and
//! enums become enumerations. Field attributes understood:
//!
//! - `#[serde(rename = "..")]`, `#[serde(skip)]` and the container-level `rename_all`
//! - `#[validate(required, not_blank, not_empty, length(..), range(..), email, url, regex = "..")]`

use super::scanner::ParsedFile;
use crate::types::{
    DescriptorKind, MemberDescriptor, TypeDescriptor, TypeRef, TypeRegistry, ValidationMarker,
};
use log::debug;
use syn::meta::ParseNestedMeta;
use syn::visit::Visit;
use syn::{Attribute, Expr, Lit, LitStr, Token, UnOp};

/// Register every struct and enum found in the files
pub fn collect_types(files: &[ParsedFile], registry: &mut TypeRegistry) {
    let mut collector = TypeCollector { registry };
    for file in files {
        collector.visit_file(&file.syntax_tree);
    }
}

struct TypeCollector<'a> {
    registry: &'a mut TypeRegistry,
}

impl<'ast> Visit<'ast> for TypeCollector<'_> {
    fn visit_item_struct(&mut self, item: &'ast syn::ItemStruct) {
        self.registry.register(struct_descriptor(item));
        syn::visit::visit_item_struct(self, item);
    }

    fn visit_item_enum(&mut self, item: &'ast syn::ItemEnum) {
        let variants = item
            .variants
            .iter()
            .map(|v| v.ident.to_string())
            .collect();
        self.registry
            .register(TypeDescriptor::enumeration(item.ident.to_string(), variants));
        syn::visit::visit_item_enum(self, item);
    }
}

fn struct_descriptor(item: &syn::ItemStruct) -> TypeDescriptor {
    let name = item.ident.to_string();
    let syn::Fields::Named(named) = &item.fields else {
        debug!("{} has no named fields, registering as opaque", name);
        return TypeDescriptor::opaque(name);
    };

    let rename_all = container_rename_all(&item.attrs);
    let members: Vec<MemberDescriptor> = named
        .named
        .iter()
        .filter_map(|field| member(field, rename_all.as_deref()))
        .collect();
    let generics: Vec<String> = item
        .generics
        .type_params()
        .map(|p| p.ident.to_string())
        .collect();

    debug!("Registering {} with {} members", name, members.len());
    TypeDescriptor {
        name,
        kind: DescriptorKind::Composite { generics, members },
    }
}

fn member(field: &syn::Field, rename_all: Option<&str>) -> Option<MemberDescriptor> {
    let ident = field.ident.as_ref()?.to_string();
    let ident = ident.strip_prefix("r#").unwrap_or(&ident).to_string();
    let serde = SerdeField::parse(&field.attrs);
    if serde.skip {
        return None;
    }

    let name = match (serde.rename, rename_all) {
        (Some(rename), _) => rename,
        (None, Some(rule)) => apply_rename_rule(&ident, rule),
        (None, None) => ident,
    };

    Some(MemberDescriptor {
        name,
        ty: TypeRef::from_syn(&field.ty),
        markers: validation_markers(&field.attrs),
    })
}

#[derive(Default)]
struct SerdeField {
    rename: Option<String>,
    skip: bool,
}

impl SerdeField {
    fn parse(attrs: &[Attribute]) -> Self {
        let mut parsed = SerdeField::default();
        for attr in attrs.iter().filter(|a| a.path().is_ident("serde")) {
            let result = attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("rename") {
                    if meta.input.peek(Token![=]) {
                        parsed.rename = Some(meta.value()?.parse::<LitStr>()?.value());
                    } else {
                        // rename(serialize = "..", deserialize = "..")
                        meta.parse_nested_meta(|inner| {
                            if inner.path.is_ident("serialize") {
                                parsed.rename = Some(inner.value()?.parse::<LitStr>()?.value());
                                Ok(())
                            } else {
                                skip_meta(&inner)
                            }
                        })?;
                    }
                    Ok(())
                } else if meta.path.is_ident("skip") || meta.path.is_ident("skip_serializing") {
                    parsed.skip = true;
                    Ok(())
                } else {
                    skip_meta(&meta)
                }
            });
            if let Err(e) = result {
                debug!("Ignoring malformed serde attribute: {}", e);
            }
        }
        parsed
    }
}

fn container_rename_all(attrs: &[Attribute]) -> Option<String> {
    let mut rule = None;
    for attr in attrs.iter().filter(|a| a.path().is_ident("serde")) {
        let result = attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename_all") && meta.input.peek(Token![=]) {
                rule = Some(meta.value()?.parse::<LitStr>()?.value());
                Ok(())
            } else {
                skip_meta(&meta)
            }
        });
        if let Err(e) = result {
            debug!("Ignoring malformed serde container attribute: {}", e);
        }
    }
    rule
}

/// Rename a snake_case field according to a serde `rename_all` rule
fn apply_rename_rule(field: &str, rule: &str) -> String {
    let words: Vec<&str> = field.split('_').filter(|w| !w.is_empty()).collect();
    let capitalize = |w: &str| {
        let mut chars = w.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
            None => String::new(),
        }
    };
    match rule {
        "camelCase" => words
            .iter()
            .enumerate()
            .map(|(i, w)| if i == 0 { w.to_string() } else { capitalize(*w) })
            .collect(),
        "PascalCase" => words.iter().map(|w| capitalize(*w)).collect(),
        "kebab-case" => words.join("-"),
        "SCREAMING_SNAKE_CASE" => field.to_uppercase(),
        "SCREAMING-KEBAB-CASE" => words.join("-").to_uppercase(),
        "lowercase" => field.to_lowercase(),
        "UPPERCASE" => field.to_uppercase(),
        _ => field.to_string(),
    }
}

fn validation_markers(attrs: &[Attribute]) -> Vec<ValidationMarker> {
    let mut markers = Vec::new();
    for attr in attrs.iter().filter(|a| a.path().is_ident("validate")) {
        let result = attr.parse_nested_meta(|meta| {
            let Some(ident) = meta.path.get_ident().map(|i| i.to_string()) else {
                return skip_meta(&meta);
            };
            match ident.as_str() {
                "required" => markers.push(ValidationMarker::NotNull),
                "not_blank" => markers.push(ValidationMarker::NotBlank),
                "not_empty" => markers.push(ValidationMarker::NotEmpty),
                "email" => {
                    markers.push(ValidationMarker::Email { pattern: None });
                    skip_meta(&meta)?;
                }
                "url" => {
                    markers.push(ValidationMarker::Url);
                    skip_meta(&meta)?;
                }
                "length" => {
                    let (mut min, mut max) = (None, None);
                    meta.parse_nested_meta(|bound| {
                        let value = expr_to_f64(&bound.value()?.parse::<Expr>()?);
                        let value = value.filter(|v| *v >= 0.0).map(|v| v as u64);
                        if bound.path.is_ident("min") {
                            min = value;
                        } else if bound.path.is_ident("max") {
                            max = value;
                        } else if bound.path.is_ident("equal") {
                            min = value;
                            max = value;
                        }
                        Ok(())
                    })?;
                    markers.push(ValidationMarker::Length { min, max });
                }
                "range" => {
                    let (mut min, mut max) = (None, None);
                    meta.parse_nested_meta(|bound| {
                        let value = expr_to_f64(&bound.value()?.parse::<Expr>()?);
                        if bound.path.is_ident("min") {
                            min = value;
                        } else if bound.path.is_ident("max") {
                            max = value;
                        }
                        Ok(())
                    })?;
                    markers.push(ValidationMarker::Range { min, max });
                }
                "regex" => {
                    if meta.input.peek(Token![=]) {
                        let pattern = meta.value()?.parse::<LitStr>()?.value();
                        markers.push(ValidationMarker::Pattern(pattern));
                    } else {
                        meta.parse_nested_meta(|inner| {
                            if inner.path.is_ident("pattern") {
                                let pattern = inner.value()?.parse::<LitStr>()?.value();
                                markers.push(ValidationMarker::Pattern(pattern));
                                Ok(())
                            } else {
                                skip_meta(&inner)
                            }
                        })?;
                    }
                }
                _ => skip_meta(&meta)?,
            }
            Ok(())
        });
        if let Err(e) = result {
            debug!("Stopped reading validate attribute: {}", e);
        }
    }
    markers
}

/// Consume an entry we do not interpret: `name`, `name = expr` or `name(...)`
fn skip_meta(meta: &ParseNestedMeta) -> syn::Result<()> {
    if meta.input.peek(Token![=]) {
        meta.value()?.parse::<Expr>()?;
    } else if meta.input.peek(syn::token::Paren) {
        meta.parse_nested_meta(|inner| skip_meta(&inner))?;
    }
    Ok(())
}

/// Numeric value of an integer or float literal, possibly negated
fn expr_to_f64(expr: &Expr) -> Option<f64> {
    match expr {
        Expr::Lit(lit) => match &lit.lit {
            Lit::Int(int) => int.base10_parse::<f64>().ok(),
            Lit::Float(float) => float.base10_parse::<f64>().ok(),
            _ => None,
        },
        Expr::Unary(unary) if matches!(unary.op, UnOp::Neg(_)) => {
            expr_to_f64(&unary.expr).map(|v| -v)
        }
        Expr::Paren(paren) => expr_to_f64(&paren.expr),
        Expr::Group(group) => expr_to_f64(&group.expr),
        _ => None,
    }
}
