//! Implementation of `#[derive(Configurable)]`.
//!
//! Parses `#[property(...)]` attributes on struct fields and generates a
//! `Configurable` implementation with one match arm per bound property.

use proc_macro2::TokenStream;
use quote::quote;
use syn::meta::ParseNestedMeta;
use syn::{DeriveInput, LitStr, Result};

/// Parsed binding for a single field.
struct FieldBinding {
    field_name: syn::Ident,
    property: String,
    skip: bool,
    setter: Option<syn::Path>,
}

impl FieldBinding {
    fn parse(field: &syn::Field) -> Result<Self> {
        let field_name = field
            .ident
            .clone()
            .ok_or_else(|| syn::Error::new_spanned(field, "expected a named field"))?;
        let property = camel_case(&field_name.to_string());

        let mut binding = FieldBinding {
            field_name,
            property,
            skip: false,
            setter: None,
        };

        for attr in &field.attrs {
            if !attr.path().is_ident("property") {
                continue;
            }
            attr.parse_nested_meta(|meta| binding.parse_option(meta))?;
        }

        Ok(binding)
    }

    fn parse_option(&mut self, meta: ParseNestedMeta) -> Result<()> {
        if meta.path.is_ident("skip") {
            self.skip = true;
            return Ok(());
        }

        if meta.path.is_ident("rename") {
            let lit: LitStr = meta.value()?.parse()?;
            if lit.value().is_empty() {
                return Err(meta.error("property name must not be empty"));
            }
            self.property = lit.value();
            return Ok(());
        }

        if meta.path.is_ident("with") {
            let lit: LitStr = meta.value()?.parse()?;
            self.setter = Some(lit.parse()?);
            return Ok(());
        }

        Err(meta.error("unknown property option; expected rename, skip, or with"))
    }

    fn generate_arm(&self) -> TokenStream {
        let field_name = &self.field_name;
        let property = &self.property;

        match &self.setter {
            Some(setter) => quote! {
                #property => #setter(self, value),
            },
            None => quote! {
                #property => {
                    self.#field_name =
                        ::termbank_core::FromPropertyValue::from_property(value)?;
                    ::std::result::Result::Ok(())
                }
            },
        }
    }
}

/// `login_timeout` → `loginTimeout`.
fn camel_case(name: &str) -> String {
    let name = name.strip_prefix("r#").unwrap_or(name);
    let mut out = String::with_capacity(name.len());
    let mut upper_next = false;
    for ch in name.chars() {
        if ch == '_' {
            upper_next = !out.is_empty();
            continue;
        }
        if upper_next {
            out.extend(ch.to_uppercase());
            upper_next = false;
        } else {
            out.push(ch);
        }
    }
    out
}

pub fn expand(input: DeriveInput) -> Result<TokenStream> {
    let name = &input.ident;

    let fields = match &input.data {
        syn::Data::Struct(data) => match &data.fields {
            syn::Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    name,
                    "Configurable only supports structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                name,
                "Configurable can only be derived for structs",
            ));
        }
    };

    let mut bindings = Vec::new();
    for field in fields {
        let binding = FieldBinding::parse(field)?;
        if binding.skip {
            continue;
        }
        if let Some(previous) = bindings
            .iter()
            .find(|b: &&FieldBinding| b.property == binding.property)
        {
            return Err(syn::Error::new_spanned(
                &binding.field_name,
                format!(
                    "property `{}` is already bound to field `{}`",
                    binding.property, previous.field_name
                ),
            ));
        }
        bindings.push(binding);
    }

    let arms: Vec<_> = bindings.iter().map(FieldBinding::generate_arm).collect();
    let names: Vec<_> = bindings.iter().map(|b| b.property.as_str()).collect();

    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    let value = if bindings.is_empty() {
        quote!(_value)
    } else {
        quote!(value)
    };

    Ok(quote! {
        impl #impl_generics ::termbank_core::Configurable for #name #ty_generics #where_clause {
            fn property_names(&self) -> &'static [&'static str] {
                &[#(#names),*]
            }

            fn set_property(
                &mut self,
                name: &str,
                #value: &::termbank_core::PropertyValue,
            ) -> ::std::result::Result<(), ::termbank_core::PropertyError> {
                match name {
                    #(#arms)*
                    _ => ::std::result::Result::Err(::termbank_core::PropertyError::Unknown),
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::camel_case;

    #[test]
    fn test_camel_case() {
        assert_eq!(camel_case("path"), "path");
        assert_eq!(camel_case("login_timeout"), "loginTimeout");
        assert_eq!(camel_case("busy_timeout_ms"), "busyTimeoutMs");
        assert_eq!(camel_case("_hidden"), "hidden");
        assert_eq!(camel_case("r#type"), "type");
    }
}
