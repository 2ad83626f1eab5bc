use proc_macro::TokenStream;
use quote::quote;
use syn::ext::IdentExt;
use syn::{Data, DeriveInput, Fields, LitStr, parse_macro_input, parse_quote};

#[proc_macro_derive(March, attributes(march, tag))]
pub fn derive_march(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    derive_march_expand(input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn derive_march_expand(input: DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;

    match &input.data {
        Data::Struct(data_struct) => impl_march_struct(&input, data_struct),
        Data::Enum(_) => Err(syn::Error::new_spanned(
            name,
            "Enums are not supported, use a struct with named fields",
        )),
        Data::Union(_) => Err(syn::Error::new_spanned(
            name,
            "Union types are not supported",
        )),
    }
}

struct FieldTags {
    ident: syn::Ident,
    tags: Vec<(String, String)>,
}

fn container_is_custom(input: &DeriveInput) -> syn::Result<bool> {
    let mut custom = false;
    for attr in &input.attrs {
        if !attr.path().is_ident("march") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("custom") {
                custom = true;
                Ok(())
            } else {
                Err(meta.error("unsupported march attribute, expected `custom`"))
            }
        })?;
    }
    Ok(custom)
}

fn field_is_skipped(field: &syn::Field) -> syn::Result<bool> {
    let mut skip = false;
    for attr in &field.attrs {
        if !attr.path().is_ident("march") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("skip") {
                skip = true;
                Ok(())
            } else {
                Err(meta.error("unsupported march attribute, expected `skip`"))
            }
        })?;
    }
    Ok(skip)
}

fn field_tags(field: &syn::Field) -> syn::Result<Vec<(String, String)>> {
    let mut tags: Vec<(String, String)> = Vec::new();
    for attr in &field.attrs {
        if !attr.path().is_ident("tag") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            let key = meta
                .path
                .get_ident()
                .map(|ident| ident.unraw().to_string())
                .ok_or_else(|| meta.error("tag keys must be plain identifiers"))?;
            if tags.iter().any(|(k, _)| *k == key) {
                return Err(meta.error(format!("Duplicate tag key: {key}")));
            }
            let value: LitStr = meta.value()?.parse()?;
            tags.push((key, value.value()));
            Ok(())
        })?;
    }
    Ok(tags)
}

fn impl_march_struct(
    input: &DeriveInput,
    data: &syn::DataStruct,
) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;
    let fields = match &data.fields {
        Fields::Named(fields) => &fields.named,
        _ => {
            return Err(syn::Error::new_spanned(
                name,
                "Only named fields are supported",
            ));
        }
    };

    let mut field_info = Vec::new();
    for field in fields {
        if field_is_skipped(field)? {
            continue;
        }
        let Some(ident) = field.ident.clone() else {
            return Err(syn::Error::new_spanned(field, "Only named fields are supported"));
        };
        field_info.push(FieldTags {
            ident,
            tags: field_tags(field)?,
        });
    }

    let field_count = field_info.len();
    let infos = field_info.iter().map(|info| {
        let ident = info.ident.unraw().to_string();
        let keys = info.tags.iter().map(|(key, _)| key);
        let values = info.tags.iter().map(|(_, value)| value);
        quote! {
            march::FieldInfo::new(#ident, &[#((#keys, #values)),*])
        }
    });
    let indices: Vec<_> = (0..field_count).collect();
    let idents: Vec<_> = field_info.iter().map(|info| &info.ident).collect();

    let custom_methods = if container_is_custom(input)? {
        quote! {
            fn custom(&self) -> ::core::option::Option<&dyn march::Custom> {
                ::core::option::Option::Some(self as &dyn march::Custom)
            }

            fn custom_mut(&mut self) -> ::core::option::Option<&mut dyn march::Custom> {
                ::core::option::Option::Some(self as &mut dyn march::Custom)
            }
        }
    } else {
        quote! {}
    };

    let mut generics = input.generics.clone();
    for param in generics.type_params_mut() {
        param.bounds.push(parse_quote!(march::Reflect));
        param.bounds.push(parse_quote!(::core::default::Default));
    }
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    let expanded = quote! {
        impl #impl_generics march::Reflect for #name #ty_generics #where_clause {
            fn kind(&self) -> march::Kind {
                march::Kind::Record
            }

            fn reflect_ref(&self) -> march::ReflectRef<'_> {
                march::ReflectRef::Record(self)
            }

            fn reflect_mut(&mut self) -> march::ReflectMut<'_> {
                march::ReflectMut::Record(self)
            }

            fn fresh(&self) -> ::std::boxed::Box<dyn march::Reflect> {
                ::std::boxed::Box::new(<Self as ::core::default::Default>::default())
            }

            fn set(&mut self, value: ::std::boxed::Box<dyn march::Reflect>) -> march::Result<()> {
                *self = march::take::<Self>(value)?;
                ::core::result::Result::Ok(())
            }

            fn as_any(&self) -> &dyn ::core::any::Any {
                self
            }

            fn into_any(self: ::std::boxed::Box<Self>) -> ::std::boxed::Box<dyn ::core::any::Any> {
                self
            }

            #custom_methods
        }

        impl #impl_generics march::Record for #name #ty_generics #where_clause {
            fn field_len(&self) -> usize {
                #field_count
            }

            fn field_info(&self, index: usize) -> ::core::option::Option<&'static march::FieldInfo> {
                static FIELDS: &[march::FieldInfo] = &[#(#infos),*];
                FIELDS.get(index)
            }

            fn field(&self, index: usize) -> ::core::option::Option<&dyn march::Reflect> {
                match index {
                    #(#indices => ::core::option::Option::Some(&self.#idents as &dyn march::Reflect),)*
                    _ => ::core::option::Option::None,
                }
            }

            fn field_mut(&mut self, index: usize) -> ::core::option::Option<&mut dyn march::Reflect> {
                match index {
                    #(#indices => ::core::option::Option::Some(&mut self.#idents as &mut dyn march::Reflect),)*
                    _ => ::core::option::Option::None,
                }
            }
        }
    };

    Ok(expanded)
}
