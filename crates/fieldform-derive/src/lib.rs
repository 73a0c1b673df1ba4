//! Fieldform Derive - `#[derive(Record)]` for Fieldform records
//!
//! Emits the static field table and the `Record`/`Reflect` implementations
//! the engine walks. Field attributes:
//!
//! - `#[transform("trim,lowercase")]` or `#[transform(tag = "...")]`: directive tag
//! - `#[transform(rename = "displayName")]`: display name used in namespaces
//! - `#[transform(readonly)]`: the engine may read but never write the field
//! - `#[transform(skip)]`: never visit the field
//! - `#[serde(rename = "...")]` and `#[serde(skip)]` are honoured as display
//!   name and omit hints when no `transform` attribute says otherwise
//!
//! Copyright (c) 2025 Fieldform Team
//! Licensed under the Apache-2.0 license

use proc_macro::TokenStream;
use proc_macro2::{Span, TokenStream as TokenStream2};
use quote::quote;
use syn::parse::{Parse, ParseStream};
use syn::punctuated::Punctuated;
use syn::spanned::Spanned;
use syn::{
    parse_macro_input, Attribute, Data, DeriveInput, Error, Expr, ExprLit, Fields, Ident, Index,
    Lit, LitStr, Member, Meta, Result, Token,
};

#[proc_macro_derive(Record, attributes(transform))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand(input)
        .unwrap_or_else(Error::into_compile_error)
        .into()
}

/// One argument inside `#[transform(...)]`
enum TransformArg {
    Tag(LitStr),
    Flag(Ident),
    Named(Ident, LitStr),
}

impl Parse for TransformArg {
    fn parse(input: ParseStream) -> Result<Self> {
        if input.peek(LitStr) {
            return Ok(TransformArg::Tag(input.parse()?));
        }
        let ident: Ident = input.parse()?;
        if input.peek(Token![=]) {
            input.parse::<Token![=]>()?;
            Ok(TransformArg::Named(ident, input.parse()?))
        } else {
            Ok(TransformArg::Flag(ident))
        }
    }
}

#[derive(Default)]
struct FieldAttrs {
    tag: Option<String>,
    rename: Option<String>,
    serde_rename: Option<String>,
    omit: bool,
    readonly: bool,
}

impl FieldAttrs {
    fn from_attrs(attrs: &[Attribute]) -> Result<Self> {
        let mut parsed = Self::default();
        for attr in attrs {
            if attr.path().is_ident("transform") {
                parsed.parse_transform(attr)?;
            } else if attr.path().is_ident("serde") {
                parsed.parse_serde(attr);
            }
        }
        Ok(parsed)
    }

    fn parse_transform(&mut self, attr: &Attribute) -> Result<()> {
        let args = attr.parse_args_with(Punctuated::<TransformArg, Token![,]>::parse_terminated)?;
        for arg in args {
            match arg {
                TransformArg::Tag(lit) => self.set_tag(&lit)?,
                TransformArg::Named(ident, lit) if ident == "tag" => self.set_tag(&lit)?,
                TransformArg::Named(ident, lit) if ident == "rename" => {
                    self.rename = Some(lit.value());
                }
                TransformArg::Flag(ident) if ident == "readonly" => self.readonly = true,
                TransformArg::Flag(ident) if ident == "skip" => self.tag = Some("-".to_string()),
                TransformArg::Named(ident, _) | TransformArg::Flag(ident) => {
                    return Err(Error::new(
                        ident.span(),
                        format!(
                            "unknown transform option `{}`, expected a tag string, `tag`, `rename`, `readonly` or `skip`",
                            ident
                        ),
                    ));
                }
            }
        }
        Ok(())
    }

    fn set_tag(&mut self, lit: &LitStr) -> Result<()> {
        if self.tag.is_some() {
            return Err(Error::new(lit.span(), "field already has a directive tag"));
        }
        self.tag = Some(lit.value());
        Ok(())
    }

    /// Serde attributes are serde's to validate; anything unreadable is ignored
    fn parse_serde(&mut self, attr: &Attribute) {
        let Ok(metas) = attr.parse_args_with(Punctuated::<Meta, Token![,]>::parse_terminated) else {
            return;
        };
        for meta in metas {
            match meta {
                Meta::Path(path) if path.is_ident("skip") => self.omit = true,
                Meta::NameValue(nv) if nv.path.is_ident("rename") => {
                    if let Expr::Lit(ExprLit {
                        lit: Lit::Str(lit), ..
                    }) = nv.value
                    {
                        self.serde_rename = Some(lit.value());
                    }
                }
                _ => {}
            }
        }
    }

    fn display_name(&self) -> Option<&str> {
        self.rename.as_deref().or(self.serde_rename.as_deref())
    }
}

fn expand(input: DeriveInput) -> Result<TokenStream2> {
    let fields = match &input.data {
        Data::Struct(data) => &data.fields,
        _ => {
            return Err(Error::new(
                Span::call_site(),
                "Record can only be derived for structs",
            ))
        }
    };

    let members: Vec<(Member, String)> = match fields {
        Fields::Named(named) => named
            .named
            .iter()
            .filter_map(|f| f.ident.clone())
            .map(|ident| {
                let name = ident.to_string();
                (Member::Named(ident), name)
            })
            .collect(),
        Fields::Unnamed(unnamed) => (0..unnamed.unnamed.len())
            .map(|i| (Member::Unnamed(Index::from(i)), i.to_string()))
            .collect(),
        Fields::Unit => Vec::new(),
    };

    let mut infos = Vec::with_capacity(members.len());
    for (field, (_, name)) in fields.iter().zip(&members) {
        let attrs = FieldAttrs::from_attrs(&field.attrs)?;
        let mut info = quote! { ::fieldform_core::FieldInfo::new(#name) };
        if let Some(tag) = &attrs.tag {
            info = quote! { #info.tag(#tag) };
        }
        if let Some(alias) = attrs.display_name() {
            info = quote! { #info.alias(#alias) };
        }
        if attrs.omit {
            info = quote! { #info.omit() };
        }
        if attrs.readonly {
            info = quote! { #info.readonly() };
        }
        infos.push(info);
    }

    let ident = &input.ident;
    let record_name = ident.to_string();
    let indices: Vec<usize> = (0..members.len()).collect();
    let accessors: Vec<&Member> = members.iter().map(|(member, _)| member).collect();

    let mut generics = input.generics.clone();
    for param in generics.type_params_mut() {
        param.bounds.push(syn::parse_quote!(::fieldform_core::Reflect));
    }
    if let Some(lifetime) = generics.lifetimes().next() {
        return Err(Error::new(
            lifetime.span(),
            "Record cannot be derived for types with lifetime parameters",
        ));
    }
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics ::fieldform_core::Record for #ident #ty_generics #where_clause {
            fn record_name(&self) -> &'static str {
                #record_name
            }

            fn field_infos(&self) -> &'static [::fieldform_core::FieldInfo] {
                const FIELDS: &[::fieldform_core::FieldInfo] = &[#(#infos),*];
                FIELDS
            }

            fn field(&self, index: usize) -> ::core::option::Option<&dyn ::fieldform_core::Reflect> {
                match index {
                    #(#indices => ::core::option::Option::Some(&self.#accessors as &dyn ::fieldform_core::Reflect),)*
                    _ => ::core::option::Option::None,
                }
            }

            fn field_mut(&mut self, index: usize) -> ::core::option::Option<&mut dyn ::fieldform_core::Reflect> {
                match index {
                    #(#indices => ::core::option::Option::Some(&mut self.#accessors as &mut dyn ::fieldform_core::Reflect),)*
                    _ => ::core::option::Option::None,
                }
            }
        }

        impl #impl_generics ::fieldform_core::Reflect for #ident #ty_generics #where_clause {
            fn reflect_ref(&self) -> ::fieldform_core::ReflectRef<'_> {
                ::fieldform_core::ReflectRef::Record(self)
            }

            fn reflect_mut(&mut self) -> ::fieldform_core::ReflectMut<'_> {
                ::fieldform_core::ReflectMut::Record(self)
            }

            fn as_any(&self) -> &dyn ::core::any::Any {
                self
            }
        }
    })
}
