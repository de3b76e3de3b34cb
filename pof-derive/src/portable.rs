//! Derive macro implementation for `PortableObject`.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Field, Fields, LitInt};

pub fn derive_portable_impl(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

struct FieldAttrs {
    index: Option<i32>,
    skip: bool,
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    name,
                    "PortableObject only supports structs with named fields",
                ))
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                name,
                "PortableObject can only be derived for structs",
            ))
        }
    };

    let mut write_stmts = Vec::new();
    let mut read_stmts = Vec::new();
    let mut last_index: i32 = -1;

    for field in fields {
        let attrs = parse_field_attrs(field)?;
        if attrs.skip {
            continue;
        }
        let Some(field_ident) = field.ident.as_ref() else {
            continue;
        };
        let field_ty = &field.ty;

        let index = match attrs.index {
            Some(index) if index <= last_index => {
                return Err(syn::Error::new_spanned(
                    field_ident,
                    format!("property index {index} must be greater than {last_index}"),
                ));
            }
            Some(index) => index,
            None => last_index.checked_add(1).ok_or_else(|| {
                syn::Error::new_spanned(field_ident, "property index overflows i32")
            })?,
        };
        last_index = index;

        write_stmts.push(quote! {
            writer.write::<#field_ty>(#index, &self.#field_ident)?;
        });
        read_stmts.push(quote! {
            self.#field_ident = reader.read::<#field_ty>(#index)?;
        });
    }

    Ok(quote! {
        impl #impl_generics ::pof_core::PortableObject for #name #ty_generics #where_clause {
            fn read_external(
                &mut self,
                reader: &mut ::pof_core::PofReader<'_>,
            ) -> ::pof_core::Result<()> {
                #(#read_stmts)*
                Ok(())
            }

            fn write_external(
                &self,
                writer: &mut ::pof_core::PofWriter<'_>,
            ) -> ::pof_core::Result<()> {
                #(#write_stmts)*
                Ok(())
            }
        }
    })
}

fn parse_field_attrs(field: &Field) -> syn::Result<FieldAttrs> {
    let mut attrs = FieldAttrs {
        index: None,
        skip: false,
    };
    for attr in &field.attrs {
        if !attr.path().is_ident("pof") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("skip") {
                attrs.skip = true;
                Ok(())
            } else if meta.path.is_ident("index") {
                let lit: LitInt = meta.value()?.parse()?;
                let index: i32 = lit.base10_parse()?;
                if index < 0 {
                    return Err(meta.error("property index must not be negative"));
                }
                attrs.index = Some(index);
                Ok(())
            } else {
                Err(meta.error("unsupported pof attribute; expected `index = N` or `skip`"))
            }
        })?;
    }
    Ok(attrs)
}
