use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::ext::IdentExt;
use syn::meta::ParseNestedMeta;
use syn::{
    Attribute, Data, DeriveInput, Fields, GenericArgument, Ident, LitStr, PathArguments, Token,
    Type,
};

/// Coercion kind computed for a single field at expansion time.
enum Kind {
    Identifier,
    Timestamp,
    Enumeration,
    Optional(Box<Kind>),
    Passthrough,
}

impl Kind {
    /// Replace the innermost kind, keeping any optional wrappers.
    fn with_leaf(self, leaf: Kind) -> Kind {
        match self {
            Kind::Optional(inner) => Kind::Optional(Box::new(inner.with_leaf(leaf))),
            _ => leaf,
        }
    }

    fn tokens(&self) -> TokenStream2 {
        match self {
            Kind::Identifier => quote! { ::outbox_relay::FieldKind::Identifier },
            Kind::Timestamp => quote! { ::outbox_relay::FieldKind::Timestamp },
            Kind::Enumeration => quote! { ::outbox_relay::FieldKind::Enumeration },
            Kind::Passthrough => quote! { ::outbox_relay::FieldKind::Passthrough },
            Kind::Optional(inner) => {
                let inner = inner.tokens();
                quote! { ::outbox_relay::FieldKind::Optional(::std::boxed::Box::new(#inner)) }
            }
        }
    }
}

#[derive(Default)]
struct FieldAttrs {
    is_id: bool,
    is_occurred_at: bool,
    force: Option<Kind>,
}

#[derive(Default)]
struct SerdeAttrs {
    skip: bool,
    rename: Option<String>,
}

/// Container-level `#[serde(rename_all = "...")]`, applied the way serde
/// applies it to snake_case field names.
#[derive(Clone, Copy)]
enum RenameRule {
    Lower,
    Upper,
    Pascal,
    Camel,
    Snake,
    ScreamingSnake,
    Kebab,
    ScreamingKebab,
}

impl RenameRule {
    fn parse(rule: &str) -> Option<Self> {
        Some(match rule {
            "lowercase" => RenameRule::Lower,
            "UPPERCASE" => RenameRule::Upper,
            "PascalCase" => RenameRule::Pascal,
            "camelCase" => RenameRule::Camel,
            "snake_case" => RenameRule::Snake,
            "SCREAMING_SNAKE_CASE" => RenameRule::ScreamingSnake,
            "kebab-case" => RenameRule::Kebab,
            "SCREAMING-KEBAB-CASE" => RenameRule::ScreamingKebab,
            _ => return None,
        })
    }

    fn apply(self, field: &str) -> String {
        match self {
            RenameRule::Lower | RenameRule::Snake => field.to_string(),
            RenameRule::Upper | RenameRule::ScreamingSnake => field.to_ascii_uppercase(),
            RenameRule::Pascal => {
                let mut pascal = String::with_capacity(field.len());
                let mut capitalize = true;
                for ch in field.chars() {
                    if ch == '_' {
                        capitalize = true;
                    } else if capitalize {
                        pascal.push(ch.to_ascii_uppercase());
                        capitalize = false;
                    } else {
                        pascal.push(ch);
                    }
                }
                pascal
            }
            RenameRule::Camel => {
                let pascal = RenameRule::Pascal.apply(field);
                let mut chars = pascal.chars();
                match chars.next() {
                    Some(first) => first.to_ascii_lowercase().to_string() + chars.as_str(),
                    None => pascal,
                }
            }
            RenameRule::Kebab => field.replace('_', "-"),
            RenameRule::ScreamingKebab => field.to_ascii_uppercase().replace('_', "-"),
        }
    }
}

pub fn derive_domain_event(input: TokenStream) -> TokenStream {
    let input = syn::parse_macro_input!(input as DeriveInput);
    match expand(&input) {
        Ok(tokens) => TokenStream::from(tokens),
        Err(err) => TokenStream::from(err.to_compile_error()),
    }
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let event_type = parse_struct_attrs(input)?.unwrap_or_else(|| name.to_string());
    let rename_all = parse_serde_container_attrs(&input.attrs)?;

    let fields = match &input.data {
        Data::Struct(data_struct) => match &data_struct.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    name,
                    "DomainEvent derive only supports structs with named fields",
                ))
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                name,
                "DomainEvent derive only supports structs",
            ))
        }
    };

    let mut id_field: Option<Ident> = None;
    let mut occurred_at_field: Option<Ident> = None;
    let mut schema_fields = Vec::new();

    for field in fields {
        let Some(ident) = field.ident.as_ref() else {
            continue;
        };
        let attrs = parse_field_attrs(&field.attrs)?;

        if attrs.is_id || (id_field.is_none() && ident == "event_id") {
            id_field = Some(ident.clone());
        }
        if attrs.is_occurred_at || (occurred_at_field.is_none() && ident == "occurred_at") {
            occurred_at_field = Some(ident.clone());
        }

        let serde = parse_serde_attrs(&field.attrs)?;
        if serde.skip {
            continue;
        }

        let mut kind = infer_kind(&field.ty);
        if let Some(leaf) = attrs.force {
            kind = kind.with_leaf(leaf);
        }

        let key = serde.rename.unwrap_or_else(|| {
            let field_name = ident.unraw().to_string();
            match rename_all {
                Some(rule) => rule.apply(&field_name),
                None => field_name,
            }
        });
        schema_fields.push((key, kind));
    }

    let id_field = id_field.ok_or_else(|| {
        syn::Error::new_spanned(
            name,
            "DomainEvent derive needs an `event_id` field or a field marked #[event(id)]",
        )
    })?;
    let occurred_at_field = occurred_at_field.ok_or_else(|| {
        syn::Error::new_spanned(
            name,
            "DomainEvent derive needs an `occurred_at` field or a field marked #[event(occurred_at)]",
        )
    })?;

    let field_calls = schema_fields.iter().map(|(key, kind)| {
        let kind = kind.tokens();
        quote! { .field(#key, #kind) }
    });

    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics ::outbox_relay::DomainEvent for #name #ty_generics #where_clause {
            const EVENT_TYPE: &'static str = #event_type;

            fn event_id(&self) -> ::outbox_relay::EventId {
                self.#id_field
            }

            fn occurred_at(&self) -> ::outbox_relay::Timestamp {
                self.#occurred_at_field
            }

            fn schema() -> ::outbox_relay::EventSchema {
                ::outbox_relay::EventSchema::new(#event_type)
                    #(#field_calls)*
            }
        }
    })
}

fn infer_kind(ty: &Type) -> Kind {
    let Type::Path(type_path) = ty else {
        return Kind::Passthrough;
    };
    if type_path.qself.is_some() {
        return Kind::Passthrough;
    }
    let Some(segment) = type_path.path.segments.last() else {
        return Kind::Passthrough;
    };

    match segment.ident.to_string().as_str() {
        "Option" => match &segment.arguments {
            PathArguments::AngleBracketed(args) => match args.args.first() {
                Some(GenericArgument::Type(inner)) => Kind::Optional(Box::new(infer_kind(inner))),
                _ => Kind::Passthrough,
            },
            _ => Kind::Passthrough,
        },
        "Uuid" | "EventId" => Kind::Identifier,
        "DateTime" | "Timestamp" => Kind::Timestamp,
        _ => Kind::Passthrough,
    }
}

fn parse_struct_attrs(input: &DeriveInput) -> syn::Result<Option<String>> {
    let mut event_type = None;

    for attr in &input.attrs {
        if !attr.path().is_ident("event") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                let value: LitStr = meta.value()?.parse()?;
                event_type = Some(value.value());
                Ok(())
            } else {
                Err(meta.error("expected `name = \"...\"`"))
            }
        })?;
    }

    Ok(event_type)
}

fn parse_field_attrs(attrs: &[Attribute]) -> syn::Result<FieldAttrs> {
    let mut parsed = FieldAttrs::default();

    for attr in attrs {
        if !attr.path().is_ident("event") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("id") {
                parsed.is_id = true;
            } else if meta.path.is_ident("occurred_at") {
                parsed.is_occurred_at = true;
            } else if meta.path.is_ident("enumeration") {
                parsed.force = Some(Kind::Enumeration);
            } else if meta.path.is_ident("identifier") {
                parsed.force = Some(Kind::Identifier);
            } else if meta.path.is_ident("timestamp") {
                parsed.force = Some(Kind::Timestamp);
            } else {
                return Err(meta.error(
                    "expected one of `id`, `occurred_at`, `enumeration`, `identifier`, `timestamp`",
                ));
            }
            Ok(())
        })?;
    }

    Ok(parsed)
}

fn parse_serde_attrs(attrs: &[Attribute]) -> syn::Result<SerdeAttrs> {
    let mut parsed = SerdeAttrs::default();

    for attr in attrs {
        if !attr.path().is_ident("serde") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("skip") || meta.path.is_ident("skip_serializing") {
                parsed.skip = true;
            } else if meta.path.is_ident("rename") {
                if let Some(name) = deserialize_name(&meta)? {
                    parsed.rename = Some(name);
                }
            } else {
                skip_meta(&meta)?;
            }
            Ok(())
        })?;
    }

    Ok(parsed)
}

fn parse_serde_container_attrs(attrs: &[Attribute]) -> syn::Result<Option<RenameRule>> {
    let mut rule = None;

    for attr in attrs {
        if !attr.path().is_ident("serde") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename_all") {
                let span = meta.path.clone();
                if let Some(name) = deserialize_name(&meta)? {
                    rule = Some(RenameRule::parse(&name).ok_or_else(|| {
                        syn::Error::new_spanned(
                            span,
                            format!("unsupported rename_all rule `{}`", name),
                        )
                    })?);
                }
            } else {
                skip_meta(&meta)?;
            }
            Ok(())
        })?;
    }

    Ok(rule)
}

/// Read `key = "..."` or the deserialize side of `key(deserialize = "...")`.
fn deserialize_name(meta: &ParseNestedMeta) -> syn::Result<Option<String>> {
    if meta.input.peek(Token![=]) {
        let value: LitStr = meta.value()?.parse()?;
        return Ok(Some(value.value()));
    }

    let mut name = None;
    if meta.input.peek(syn::token::Paren) {
        meta.parse_nested_meta(|inner| {
            if inner.path.is_ident("deserialize") {
                let value: LitStr = inner.value()?.parse()?;
                name = Some(value.value());
            } else {
                skip_meta(&inner)?;
            }
            Ok(())
        })?;
    }
    Ok(name)
}

fn skip_meta(meta: &ParseNestedMeta) -> syn::Result<()> {
    if meta.input.peek(Token![=]) {
        let _: syn::Expr = meta.value()?.parse()?;
    } else if meta.input.peek(syn::token::Paren) {
        let content;
        syn::parenthesized!(content in meta.input);
        let _: TokenStream2 = content.parse()?;
    }
    Ok(())
}
