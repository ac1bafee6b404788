use crate::{
    prelude::*,
    utils::{FieldConfig, ParsedField, build_attributes, extract_named_fields, parse_field, reject_generics},
};
use darling::util::Flag;

#[derive(FromAttributes)]
#[darling(attributes(entity))]
struct Attributes {
    hooks: Flag,
}

pub fn derive_entity(item: TokenStream) -> Result<TokenStream> {
    let input = parse2::<DeriveInput>(item)?;

    reject_generics(&input)?;

    let attributes = Attributes::from_attributes(&input.attrs)?;

    let fields_named = extract_named_fields(input.span(), input.data)?;
    let fields_span = fields_named.span();

    let mut state = None;
    let mut fields = vec![];

    for field in fields_named.named {
        match parse_field(field)? {
            ParsedField::State(ident) => {
                if state.is_some() {
                    return Err(Error::new_spanned(
                        ident,
                        "an entity must have exactly one `#[entity(state)]` field",
                    ));
                }

                state = Some(ident);
            }
            ParsedField::Attribute(field) => fields.push(field),
        }
    }

    let Some(state) = state else {
        return Err(Error::new(
            fields_span,
            "an entity must have an `EntityState` field marked `#[entity(state)]`",
        ));
    };

    Ok(build(&input.ident, &state, &fields, attributes.hooks.is_present()))
}

fn build(ident: &Ident, state: &Ident, fields: &[FieldConfig], hooks: bool) -> TokenStream {
    let krate = krate();

    let attributes_impl = build_attributes(&krate, ident, &quote! { new }, fields);

    let hooks_impl = if hooks {
        quote! {}
    } else {
        quote! {
            impl #krate::Hooks for #ident {}
        }
    };

    quote! {
        #attributes_impl

        #hooks_impl

        impl #krate::Entity for #ident {
            fn state(&self) -> &#krate::EntityState {
                &self.#state
            }

            fn state_mut(&mut self) -> &mut #krate::EntityState {
                &mut self.#state
            }
        }

        impl #krate::FromDocument for #ident {
            fn from_document(
                manager: &::std::sync::Arc<#krate::Manager>,
                document: #krate::bson::Document,
            ) -> #krate::Result<Self> {
                <Self as #krate::Entity>::from_store_document(manager, document)
            }
        }
    }
}
