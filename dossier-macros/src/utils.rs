use crate::prelude::*;
use darling::util::{Flag, Override};
use proc_macro_crate::{FoundCrate, crate_name};

macro_rules! extract {
    ($val:expr, $pat:pat, $error_message: expr) => {
        let $pat = $val else {
            return Err(Error::new_spanned($val, $error_message));
        };
    };
}

pub(crate) use extract;

pub fn extract_named_fields(span: Span, data: Data) -> Result<FieldsNamed> {
    let Data::Struct(data_struct) = data else {
        return Err(Error::new(span, "expected struct"));
    };

    extract!(
        data_struct.fields,
        Fields::Named(named_fields),
        "expected named fields"
    );

    Ok(named_fields)
}

pub fn reject_generics(input: &DeriveInput) -> Result<()> {
    if input.generics.params.is_empty() && input.generics.where_clause.is_none() {
        return Ok(());
    }

    Err(Error::new_spanned(
        &input.generics,
        "generic types are not supported",
    ))
}

#[derive(FromAttributes)]
#[darling(attributes(entity, document))]
struct FieldAttributes {
    state: Flag,
    reserved: Flag,
    rename: Option<String>,
    setter: Option<Override<Ident>>,
    getter: Option<Override<Ident>>,
}

pub struct FieldConfig {
    pub ident: Ident,
    pub lit: LitStr,
    pub reserved: bool,
    pub setter: Option<Ident>,
    pub getter: Option<Ident>,
}

pub enum ParsedField {
    State(Ident),
    Attribute(FieldConfig),
}

pub fn parse_field(field: Field) -> Result<ParsedField> {
    let attributes = FieldAttributes::from_attributes(&field.attrs)?;

    let Some(ident) = field.ident else {
        return Err(Error::new_spanned(&field.ty, "expected named field"));
    };

    if attributes.state.is_present() {
        return Ok(ParsedField::State(ident));
    }

    let name = attributes.rename.unwrap_or_else(|| ident.to_string());

    if name == "_id" {
        return Err(Error::new_spanned(
            &ident,
            "`_id` is managed by the entity state",
        ));
    }

    let accessor = |option: Option<Override<Ident>>, prefix: &str| {
        option.map(|accessor| {
            accessor.unwrap_or_else(|| {
                format_ident!("{}_{}", prefix, ident.to_string().to_snake_case())
            })
        })
    };

    Ok(ParsedField::Attribute(FieldConfig {
        lit: LitStr::new(&name, ident.span()),
        reserved: attributes.reserved.is_present(),
        setter: accessor(attributes.setter, "set"),
        getter: accessor(attributes.getter, "get"),
        ident,
    }))
}

/// The `Attributes` impl shared by both derives.
pub fn build_attributes(
    krate: &TokenStream,
    ident: &Ident,
    schema_constructor: &TokenStream,
    fields: &[FieldConfig],
) -> TokenStream {
    let descriptors = fields.iter().map(|field| {
        let lit = &field.lit;
        let reserved = field.reserved.then(|| quote! { .reserved() });
        let setter = field.setter.is_some().then(|| quote! { .with_setter() });
        let getter = field.getter.is_some().then(|| quote! { .with_getter() });

        quote! { #krate::FieldDescriptor::new(#lit) #reserved #setter #getter }
    });

    let field_idents = fields.iter().map(|field| &field.ident).collect_vec();
    let field_lits = fields.iter().map(|field| &field.lit).collect_vec();

    let (setter_lits, setters): (Vec<_>, Vec<_>) = fields
        .iter()
        .filter_map(|field| Some((&field.lit, field.setter.as_ref()?)))
        .unzip();

    let (getter_lits, getters): (Vec<_>, Vec<_>) = fields
        .iter()
        .filter_map(|field| Some((&field.lit, field.getter.as_ref()?)))
        .unzip();

    quote! {
        impl #krate::Attributes for #ident {
            fn schema() -> &'static #krate::Schema {
                const FIELDS: &[#krate::FieldDescriptor] = &[ #( #descriptors ),* ];
                static SCHEMA: #krate::Schema = #krate::Schema::#schema_constructor(FIELDS);

                &SCHEMA
            }

            fn read_field(
                &self,
                name: &str,
            ) -> #krate::Result<::std::option::Option<#krate::bson::Bson>> {
                match name {
                    #(
                        #field_lits => ::std::result::Result::Ok(::std::option::Option::Some(
                            #krate::bson::to_bson(&self.#field_idents)?,
                        )),
                    )*
                    _ => ::std::result::Result::Ok(::std::option::Option::None),
                }
            }

            fn write_field(
                &mut self,
                name: &str,
                value: #krate::bson::Bson,
            ) -> #krate::Result<bool> {
                match name {
                    #(
                        #field_lits => {
                            self.#field_idents = #krate::bson::from_bson(value)?;
                            ::std::result::Result::Ok(true)
                        }
                    )*
                    _ => ::std::result::Result::Ok(false),
                }
            }

            #[allow(unused_variables)]
            fn call_setter(
                &mut self,
                name: &str,
                value: #krate::bson::Bson,
            ) -> ::std::option::Option<#krate::Result<()>> {
                match name {
                    #(
                        #setter_lits => ::std::option::Option::Some(Self::#setters(self, value)),
                    )*
                    _ => ::std::option::Option::None,
                }
            }

            #[allow(unused_variables)]
            fn call_getter(
                &self,
                name: &str,
            ) -> ::std::option::Option<#krate::Result<#krate::bson::Bson>> {
                match name {
                    #(
                        #getter_lits => ::std::option::Option::Some(Self::#getters(self)),
                    )*
                    _ => ::std::option::Option::None,
                }
            }
        }
    }
}

pub fn krate() -> TokenStream {
    match crate_name("dossier") {
        Ok(FoundCrate::Name(name)) => {
            let ident = Ident::new(&name, Span::call_site());
            quote! { ::#ident }
        }
        Ok(FoundCrate::Itself) | Err(_) => quote! { ::dossier },
    }
}
