//! Derive macro for struct-mapped tables.
//!
//! This crate provides `#[derive(Record)]`, which implements
//! `oxide_shape_core::Record` for a struct with named fields. The generated
//! impl lists every field with its value kind and tag, reads mapped fields
//! as SQL values and rebuilds the struct from a decoded row.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{
    parse_macro_input, Attribute, Data, DeriveInput, Expr, Fields, Ident, Lit, LitStr, Meta, Type,
};

/// Derives `Record` for a struct.
///
/// # Attributes
///
/// - `#[record(name = "table_name")]` - Default SQL table name (optional,
///   defaults to snake_case of the struct name)
///
/// # Field Attributes
///
/// - `#[sql("NAME=Name,NOT_NULL")]` - Maps the field with a declarative tag
/// - `#[sql]` - Maps the field with an empty tag (column named after the
///   field, type inferred)
///
/// Fields without `#[sql]` are not mapped. They are rebuilt with
/// `Default::default()` when a row is decoded.
///
/// Mapped field types must implement `SqlKind`, `ToSqlValue`,
/// `FromSqlValue` and `Clone`.
#[proc_macro_derive(Record, attributes(record, sql))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    derive_record_impl(&input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

struct FieldInfo {
    ident: Ident,
    ty: Type,
    tag: Option<String>,
}

fn derive_record_impl(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = &input.ident;
    let table_name = get_table_name(&input.attrs, struct_name)?;
    let local_name = struct_name.to_string();

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    input,
                    "Record derive only supports structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                input,
                "Record derive only supports structs",
            ));
        }
    };

    let mut infos = Vec::with_capacity(fields.len());
    for field in fields {
        let Some(ident) = field.ident.clone() else {
            return Err(syn::Error::new_spanned(field, "field must be named"));
        };
        infos.push(FieldInfo {
            ident,
            ty: field.ty.clone(),
            tag: parse_sql_tag(&field.attrs)?,
        });
    }

    let declarations: Vec<TokenStream2> = infos
        .iter()
        .map(|info| {
            let name = info.ident.to_string();
            let ty = &info.ty;
            match &info.tag {
                Some(tag) => quote! {
                    ::oxide_shape_core::record::FieldDeclaration::new(
                        #name,
                        <#ty as ::oxide_shape_core::record::SqlKind>::KIND,
                        #tag,
                    )
                },
                None => {
                    let type_str = quote!(#ty).to_string().replace(' ', "");
                    quote! {
                        ::oxide_shape_core::record::FieldDeclaration::unmapped(
                            #name,
                            ::oxide_shape_core::record::ValueKind::Unsupported(#type_str),
                        )
                    }
                }
            }
        })
        .collect();

    let value_arms: Vec<TokenStream2> = infos
        .iter()
        .filter(|info| info.tag.is_some())
        .map(|info| {
            let ident = &info.ident;
            let name = ident.to_string();
            quote! {
                #name => ::core::option::Option::Some(
                    ::oxide_shape_core::value::ToSqlValue::to_sql_value(
                        ::core::clone::Clone::clone(&self.#ident),
                    ),
                ),
            }
        })
        .collect();

    let field_inits: Vec<TokenStream2> = infos
        .iter()
        .map(|info| {
            let ident = &info.ident;
            let ty = &info.ty;
            let name = ident.to_string();
            if info.tag.is_some() {
                quote! { #ident: fields.take::<#ty>(#name)? }
            } else {
                quote! { #ident: ::core::default::Default::default() }
            }
        })
        .collect();

    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics ::oxide_shape_core::record::Record for #struct_name #ty_generics
            #where_clause
        {
            const NAME: &'static str = #local_name;
            const TABLE: &'static str = #table_name;

            fn declarations() -> ::std::vec::Vec<::oxide_shape_core::record::FieldDeclaration> {
                ::std::vec![#(#declarations),*]
            }

            fn field_value(
                &self,
                field: &str,
            ) -> ::core::option::Option<::oxide_shape_core::value::SqlValue> {
                match field {
                    #(#value_arms)*
                    _ => ::core::option::Option::None,
                }
            }

            #[allow(unused_variables)]
            fn from_fields(
                fields: &mut ::oxide_shape_core::record::FieldValues,
            ) -> ::oxide_shape_core::error::Result<Self> {
                ::core::result::Result::Ok(Self {
                    #(#field_inits),*
                })
            }
        }
    })
}

fn get_table_name(attrs: &[Attribute], struct_name: &Ident) -> syn::Result<String> {
    for attr in attrs {
        if attr.path().is_ident("record") {
            let mut table_name = None;
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("name") {
                    let value: Expr = meta.value()?.parse()?;
                    if let Expr::Lit(lit) = value {
                        if let Lit::Str(s) = lit.lit {
                            table_name = Some(s.value());
                        }
                    }
                    Ok(())
                } else {
                    Err(meta.error("unsupported record attribute"))
                }
            })?;
            if let Some(name) = table_name {
                return Ok(name);
            }
        }
    }
    Ok(to_snake_case(&struct_name.to_string()))
}

/// Reads `#[sql]`, `#[sql("TAG")]` or `#[sql = "TAG"]`.
fn parse_sql_tag(attrs: &[Attribute]) -> syn::Result<Option<String>> {
    let mut tag = None;
    for attr in attrs {
        if !attr.path().is_ident("sql") {
            continue;
        }
        if tag.is_some() {
            return Err(syn::Error::new_spanned(attr, "duplicate sql attribute"));
        }
        tag = Some(match &attr.meta {
            Meta::Path(_) => String::new(),
            Meta::List(_) => attr.parse_args::<LitStr>()?.value(),
            Meta::NameValue(nv) => match &nv.value {
                Expr::Lit(lit) => match &lit.lit {
                    Lit::Str(s) => s.value(),
                    _ => return Err(syn::Error::new_spanned(&nv.value, "expected a string tag")),
                },
                _ => return Err(syn::Error::new_spanned(&nv.value, "expected a string tag")),
            },
        });
    }
    Ok(tag)
}

fn to_snake_case(s: &str) -> String {
    let mut result = String::new();
    for (i, c) in s.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                result.push('_');
            }
            result.push(c.to_ascii_lowercase());
        } else {
            result.push(c);
        }
    }
    result
}
