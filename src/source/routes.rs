//! Route collection from parsed source.
//!
//! Two routing styles are recognized:
//!
//! - Attribute routes (`#[get("/users/{id}")]`, `#[route("/x", method = "GET")]`) on free
//!   functions and on methods of `impl` blocks. An `impl` block is a route group named after
//!   its self type; `#[scope("/base")]` on the block sets the group's base path.
//! - Router chains (`Router::new().route("/users/:id", get(get_user).put(update_user))`),
//!   including `.nest("/prefix", ...)` with an inline router or a router-building function.
//!
//! Free handler functions are grouped per file, named after the file stem.

use super::scanner::ParsedFile;
use crate::endpoint::{HandlerMeta, ParamBinding, ParamMeta, RouteGroup};
use crate::model::{HttpVerb, ServerInfo};
use crate::types::TypeRef;
use indexmap::IndexMap;
use log::{debug, warn};
use std::collections::HashMap;
use syn::punctuated::Punctuated;
use syn::visit::Visit;
use syn::{Attribute, Expr, ExprMethodCall, FnArg, Lit, LitStr, Meta, Pat, ReturnType, Token};

/// Nesting deeper than this is treated as a cycle
const MAX_NEST_DEPTH: usize = 16;

/// Routes and servers found in a project
#[derive(Debug, Default)]
pub struct RouteCollection {
    pub groups: Vec<RouteGroup>,
    pub servers: Vec<ServerInfo>,
}

/// Collect route groups and declared servers from all files
pub fn collect_routes(files: &[ParsedFile]) -> RouteCollection {
    let mut visitor = RouteVisitor::default();
    for file in files {
        visitor.stem = file.stem();
        visitor.servers.extend(api_servers(&file.syntax_tree.attrs));
        visitor.visit_file(&file.syntax_tree);
    }
    visitor.finish()
}

/// A `.route(path, method_router)` entry, resolved once all files are visited
struct RouterRoute {
    stem: String,
    owner: Option<String>,
    path: String,
    verb: HttpVerb,
    handler: String,
}

/// Where a router is nested.
///
/// Routers are keyed by the function that builds them, or `fn::var` for a `let`-bound one.
struct NestLink {
    prefix: String,
    parent: Option<String>,
}

#[derive(Default)]
struct RouteVisitor {
    stem: String,
    impl_groups: Vec<RouteGroup>,
    file_groups: IndexMap<String, RouteGroup>,
    functions: HashMap<String, (String, syn::Signature)>,
    router_routes: Vec<RouterRoute>,
    nests: HashMap<String, NestLink>,
    current_fn: Option<String>,
    current_router: Option<String>,
    current_prefix: String,
    servers: Vec<ServerInfo>,
}

impl RouteVisitor {
    fn file_group(&mut self, stem: &str) -> &mut RouteGroup {
        self.file_groups
            .entry(stem.to_string())
            .or_insert_with(|| RouteGroup::new(stem, ""))
    }

    fn finish(mut self) -> RouteCollection {
        let router_routes = std::mem::take(&mut self.router_routes);
        for route in router_routes {
            let prefix = self.router_prefix(route.owner.as_deref());
            let path = format!("{}/{}", prefix, route.path);

            let handler = match self.functions.get(&route.handler) {
                Some((stem, sig)) => {
                    let handler = handler_meta(&route.handler, Some(route.verb), &path, sig);
                    (stem.clone(), handler)
                }
                None => {
                    warn!("Unknown handler: {}", route.handler);
                    let handler = HandlerMeta::new(&route.handler, Some(route.verb), &path)
                        .returning(TypeRef::inferred());
                    (route.stem.clone(), handler)
                }
            };
            let (stem, handler) = handler;
            self.file_group(&stem).handlers.push(handler);
        }

        let mut groups = self.impl_groups;
        groups.extend(self.file_groups.into_values());
        debug!(
            "Collected {} route groups, {} servers",
            groups.len(),
            self.servers.len()
        );
        RouteCollection {
            groups,
            servers: self.servers,
        }
    }

    /// Prefix accumulated by the `.nest(..)` calls that mount `owner`'s router
    fn router_prefix(&self, owner: Option<&str>) -> String {
        let mut prefix = String::new();
        let mut current = owner;
        for _ in 0..MAX_NEST_DEPTH {
            let Some(link) = current.and_then(|name| self.nests.get(name)) else {
                return prefix;
            };
            prefix = format!("{}/{}", link.prefix, prefix);
            current = link.parent.as_deref();
        }
        warn!("Router nesting deeper than {} levels, prefix truncated", MAX_NEST_DEPTH);
        prefix
    }

    fn record_route(&mut self, node: &ExprMethodCall) {
        let (Some(path), Some(router)) = (
            node.args.first().and_then(string_literal),
            node.args.iter().nth(1),
        ) else {
            return;
        };
        for (verb, handler) in method_router(router) {
            debug!("Found route {} {} -> {}", verb, path, handler);
            self.router_routes.push(RouterRoute {
                stem: self.stem.clone(),
                owner: self.current_router.clone(),
                path: format!("{}/{}", self.current_prefix, path),
                verb,
                handler,
            });
        }
    }

    fn visit_handler_fn(&mut self, name: String, visit: impl FnOnce(&mut Self)) {
        let previous_fn = self.current_fn.replace(name.clone());
        let previous_router = self.current_router.replace(name);
        visit(self);
        self.current_fn = previous_fn;
        self.current_router = previous_router;
    }

    fn local_router_key(&self, var: &str) -> String {
        format!("{}::{}", self.current_fn.as_deref().unwrap_or_default(), var)
    }
}

impl<'ast> Visit<'ast> for RouteVisitor {
    fn visit_item(&mut self, item: &'ast syn::Item) {
        let servers = api_servers(item_attrs(item));
        self.servers.extend(servers);
        syn::visit::visit_item(self, item);
    }

    fn visit_item_fn(&mut self, node: &'ast syn::ItemFn) {
        let name = node.sig.ident.to_string();
        self.functions
            .insert(name.clone(), (self.stem.clone(), node.sig.clone()));

        let routes = route_attrs(&node.attrs);
        if !routes.is_empty() {
            let stem = self.stem.clone();
            for (verb, path) in routes {
                let handler = handler_meta(&name, Some(verb), &path, &node.sig);
                self.file_group(&stem).handlers.push(handler);
            }
        }

        self.visit_handler_fn(name, |visitor| syn::visit::visit_item_fn(visitor, node));
    }

    fn visit_item_impl(&mut self, node: &'ast syn::ItemImpl) {
        if node.trait_.is_none() {
            if let syn::Type::Path(self_ty) = &*node.self_ty {
                if let Some(segment) = self_ty.path.segments.last() {
                    let scope = scope_attr(&node.attrs);
                    let mut group =
                        RouteGroup::new(segment.ident.to_string(), scope.clone().unwrap_or_default());

                    for item in &node.items {
                        let syn::ImplItem::Fn(method) = item else {
                            continue;
                        };
                        let name = method.sig.ident.to_string();
                        let routes = route_attrs(&method.attrs);
                        if routes.is_empty() {
                            group.handlers.push(handler_meta(&name, None, "", &method.sig));
                        }
                        for (verb, path) in routes {
                            group
                                .handlers
                                .push(handler_meta(&name, Some(verb), &path, &method.sig));
                        }
                    }

                    if scope.is_some() || group.handlers.iter().any(|h| h.verb.is_some()) {
                        debug!("Found route group {}", group.name);
                        self.impl_groups.push(group);
                    }
                }
            }
        }
        syn::visit::visit_item_impl(self, node);
    }

    fn visit_impl_item_fn(&mut self, node: &'ast syn::ImplItemFn) {
        let name = node.sig.ident.to_string();
        self.visit_handler_fn(name, |visitor| syn::visit::visit_impl_item_fn(visitor, node));
    }

    fn visit_local(&mut self, node: &'ast syn::Local) {
        let var = match &node.pat {
            Pat::Ident(ident) => Some(ident.ident.to_string()),
            Pat::Type(typed) => match &*typed.pat {
                Pat::Ident(ident) => Some(ident.ident.to_string()),
                _ => None,
            },
            _ => None,
        };
        match var {
            Some(var) if node.init.is_some() => {
                let key = self.local_router_key(&var);
                let outer = self.current_router.replace(key);
                syn::visit::visit_local(self, node);
                self.current_router = outer;
            }
            _ => syn::visit::visit_local(self, node),
        }
    }

    fn visit_expr_method_call(&mut self, node: &'ast ExprMethodCall) {
        match node.method.to_string().as_str() {
            "route" => {
                // receiver first, so routes keep their source order
                self.visit_expr(&node.receiver);
                self.record_route(node);
                for arg in &node.args {
                    self.visit_expr(arg);
                }
                return;
            }
            "nest" => {
                if let Some(prefix) = node.args.first().and_then(string_literal) {
                    let nested_prefix = format!("{}/{}", self.current_prefix, prefix);

                    // a router built elsewhere: by a function or in a local binding
                    let nested_router = match node.args.iter().nth(1) {
                        Some(Expr::Call(call)) => path_name(&call.func),
                        Some(expr @ Expr::Path(_)) => {
                            path_name(expr).map(|var| self.local_router_key(&var))
                        }
                        _ => None,
                    };
                    if let Some(key) = nested_router {
                        self.nests.insert(
                            key,
                            NestLink {
                                prefix: nested_prefix.clone(),
                                parent: self.current_router.clone(),
                            },
                        );
                    }

                    self.visit_expr(&node.receiver);
                    let outer = std::mem::replace(&mut self.current_prefix, nested_prefix);
                    for arg in node.args.iter().skip(1) {
                        self.visit_expr(arg);
                    }
                    self.current_prefix = outer;
                    return;
                }
            }
            _ => {}
        }
        syn::visit::visit_expr_method_call(self, node);
    }
}

/// Verb/handler pairs of `get(a)`, `get(a).post(b)`, `routing::get(a)`
fn method_router(expr: &Expr) -> Vec<(HttpVerb, String)> {
    match expr {
        Expr::Call(call) => {
            let verb = path_name(&call.func).and_then(|name| HttpVerb::parse(&name));
            let handler = call.args.first().and_then(|arg| path_name(arg));
            match (verb, handler) {
                (Some(verb), Some(handler)) => vec![(verb, handler)],
                _ => Vec::new(),
            }
        }
        Expr::MethodCall(call) => {
            let mut routes = method_router(&call.receiver);
            let verb = HttpVerb::parse(&call.method.to_string());
            let handler = call.args.first().and_then(|arg| path_name(arg));
            if let (Some(verb), Some(handler)) = (verb, handler) {
                routes.push((verb, handler));
            }
            routes
        }
        Expr::Paren(paren) => method_router(&paren.expr),
        _ => Vec::new(),
    }
}

/// Build a handler from a function signature
fn handler_meta(
    name: &str,
    verb: Option<HttpVerb>,
    path: &str,
    sig: &syn::Signature,
) -> HandlerMeta {
    let mut handler = HandlerMeta::new(name, verb, path).returning(return_type(&sig.output));
    for input in &sig.inputs {
        if let FnArg::Typed(pat_type) = input {
            handler.params.extend(params_for(&pat_type.pat, &pat_type.ty));
        }
    }
    handler
}

/// `Result<T, E>` is reduced to `T`; no return type is `()`
fn return_type(output: &ReturnType) -> TypeRef {
    match output {
        ReturnType::Default => TypeRef::named("()"),
        ReturnType::Type(_, ty) => {
            let ty = TypeRef::from_syn(ty);
            match (ty.name.as_str(), ty.first_arg()) {
                ("Result", Some(ok)) => ok.clone(),
                _ => ty,
            }
        }
    }
}

fn params_for(pat: &Pat, ty: &syn::Type) -> Vec<ParamMeta> {
    let type_ref = TypeRef::from_syn(ty);
    let Some((binding, payload)) = binding_for(&type_ref) else {
        let name = pat_name(pat).unwrap_or_else(|| "arg".to_string());
        return vec![ParamMeta::new(name, type_ref, None)];
    };

    // Path((a, b)): Path<(A, B)> binds one parameter per tuple element
    if binding == ParamBinding::Path {
        if let (Some(syn::Type::Tuple(tuple)), Some(names)) = (extractor_arg(ty), tuple_names(pat)) {
            if tuple.elems.len() == names.len() {
                return names
                    .into_iter()
                    .zip(tuple.elems.iter())
                    .map(|(name, elem)| {
                        ParamMeta::new(name, TypeRef::from_syn(elem), Some(ParamBinding::Path))
                    })
                    .collect();
            }
        }
    }

    let name = pat_name(pat).unwrap_or_else(|| {
        match binding {
            ParamBinding::Body { .. } => "body",
            ParamBinding::Path => "path",
            ParamBinding::Query { .. } => "query",
        }
        .to_string()
    });
    vec![ParamMeta::new(name, payload, Some(binding))]
}

/// Binding and payload type of an extractor, looking through one `Option`
fn binding_for(ty: &TypeRef) -> Option<(ParamBinding, TypeRef)> {
    let (extractor, optional) = match ty.first_arg() {
        Some(inner) if ty.is_option() => (inner, true),
        _ => (ty, false),
    };
    let binding = match extractor.name.as_str() {
        "Json" | "Form" => ParamBinding::Body {
            required: !optional,
        },
        "Path" if !optional => ParamBinding::Path,
        "Query" => ParamBinding::Query {
            required: !optional,
        },
        _ => return None,
    };
    Some((binding, extractor.first_arg()?.clone()))
}

/// First type argument of the outermost path type
fn extractor_arg(ty: &syn::Type) -> Option<&syn::Type> {
    let syn::Type::Path(type_path) = ty else {
        return None;
    };
    let syn::PathArguments::AngleBracketed(args) = &type_path.path.segments.last()?.arguments else {
        return None;
    };
    args.args.iter().find_map(|arg| match arg {
        syn::GenericArgument::Type(inner) => Some(inner),
        _ => None,
    })
}

fn pat_name(pat: &Pat) -> Option<String> {
    match pat {
        Pat::Ident(ident) => Some(ident.ident.to_string()),
        Pat::TupleStruct(tuple) if tuple.elems.len() == 1 => pat_name(&tuple.elems[0]),
        Pat::Reference(reference) => pat_name(&reference.pat),
        Pat::Type(typed) => pat_name(&typed.pat),
        _ => None,
    }
}

/// Names in `Path((a, b))`
fn tuple_names(pat: &Pat) -> Option<Vec<String>> {
    let Pat::TupleStruct(outer) = pat else {
        return None;
    };
    let Some(Pat::Tuple(tuple)) = outer.elems.first() else {
        return None;
    };
    tuple.elems.iter().map(pat_name).collect()
}

/// `(verb, path)` for every route attribute on an item
fn route_attrs(attrs: &[Attribute]) -> Vec<(HttpVerb, String)> {
    let mut routes = Vec::new();
    for attr in attrs {
        let Some(name) = attr.path().segments.last().map(|s| s.ident.to_string()) else {
            continue;
        };
        let args = attr_args(attr);
        let path = args.iter().find_map(string_literal).unwrap_or_default();

        if let Some(verb) = HttpVerb::parse(&name) {
            routes.push((verb, path));
        } else if name == "route" {
            // #[route("/path", method = "GET", method = "HEAD")]
            for arg in &args {
                let Expr::Assign(assign) = arg else { continue };
                if path_name(&assign.left).as_deref() != Some("method") {
                    continue;
                }
                if let Some(verb) = string_literal(&assign.right).and_then(|m| HttpVerb::parse(&m)) {
                    routes.push((verb, path.clone()));
                }
            }
        }
    }
    routes
}

fn scope_attr(attrs: &[Attribute]) -> Option<String> {
    attrs
        .iter()
        .filter(|a| a.path().is_ident("scope"))
        .find_map(|a| attr_args(a).iter().find_map(string_literal))
}

/// `#[api_server(url = "...", description = "...")]`
fn api_servers(attrs: &[Attribute]) -> Vec<ServerInfo> {
    let mut servers = Vec::new();
    for attr in attrs.iter().filter(|a| a.path().is_ident("api_server")) {
        let mut url = None;
        let mut description = String::new();
        let result = attr.parse_nested_meta(|meta| {
            let value = meta.value()?.parse::<LitStr>()?.value();
            if meta.path.is_ident("url") {
                url = Some(value);
            } else if meta.path.is_ident("description") {
                description = value;
            }
            Ok(())
        });
        match (result, url) {
            (Ok(()), Some(url)) => servers.push(ServerInfo::new(url, description)),
            (Err(e), _) => warn!("Ignoring malformed api_server attribute: {}", e),
            (Ok(()), None) => warn!("Ignoring api_server attribute without url"),
        }
    }
    servers
}

fn attr_args(attr: &Attribute) -> Vec<Expr> {
    if !matches!(attr.meta, Meta::List(_)) {
        return Vec::new();
    }
    attr.parse_args_with(Punctuated::<Expr, Token![,]>::parse_terminated)
        .map(|args| args.into_iter().collect())
        .unwrap_or_default()
}

fn string_literal(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Lit(expr_lit) => match &expr_lit.lit {
            Lit::Str(lit_str) => Some(lit_str.value()),
            _ => None,
        },
        _ => None,
    }
}

/// Last segment of a path expression
fn path_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Path(path_expr) => path_expr.path.segments.last().map(|s| s.ident.to_string()),
        _ => None,
    }
}

fn item_attrs(item: &syn::Item) -> &[Attribute] {
    match item {
        syn::Item::Const(i) => &i.attrs,
        syn::Item::Enum(i) => &i.attrs,
        syn::Item::Fn(i) => &i.attrs,
        syn::Item::Impl(i) => &i.attrs,
        syn::Item::Mod(i) => &i.attrs,
        syn::Item::Static(i) => &i.attrs,
        syn::Item::Struct(i) => &i.attrs,
        syn::Item::Trait(i) => &i.attrs,
        syn::Item::Type(i) => &i.attrs,
        _ => &[],
    }
}
