use crate::{
    prelude::*,
    utils::{ParsedField, build_attributes, extract_named_fields, parse_field, reject_generics},
};

#[derive(FromAttributes)]
#[darling(attributes(document))]
struct Attributes {
    on_construct: Option<Ident>,
}

pub fn derive_document(item: TokenStream) -> Result<TokenStream> {
    let input = parse2::<DeriveInput>(item)?;

    reject_generics(&input)?;

    let attributes = Attributes::from_attributes(&input.attrs)?;

    let ident = input.ident;
    let fields = extract_named_fields(ident.span(), input.data)?
        .named
        .into_iter()
        .map(|field| match parse_field(field)? {
            ParsedField::State(ident) => Err(Error::new_spanned(
                ident,
                "typed documents have no entity state",
            )),
            ParsedField::Attribute(field) => Ok(field),
        })
        .try_collect::<_, Vec<_>, _>()?;

    let krate = krate();

    let attributes_impl = build_attributes(&krate, &ident, &quote! { embedded }, &fields);

    let on_construct = attributes.on_construct.map(|method| {
        quote! {
            fn on_construct(&mut self, data: &#krate::bson::Document) {
                Self::#method(self, data);
            }
        }
    });

    let serde = quote! { #krate::__private::serde };

    Ok(quote! {
        #attributes_impl

        impl #krate::TypedDocument for #ident {
            #on_construct
        }

        impl #serde::Serialize for #ident {
            fn serialize<S: #serde::Serializer>(
                &self,
                serializer: S,
            ) -> ::std::result::Result<S::Ok, S::Error> {
                let document = #krate::TypedDocument::bson_serialize(self)
                    .map_err(<S::Error as #serde::ser::Error>::custom)?;

                #serde::Serialize::serialize(&document, serializer)
            }
        }

        impl<'de> #serde::Deserialize<'de> for #ident {
            fn deserialize<D: #serde::Deserializer<'de>>(
                deserializer: D,
            ) -> ::std::result::Result<Self, D::Error> {
                let document: #krate::bson::Document =
                    #serde::Deserialize::deserialize(deserializer)?;

                <Self as #krate::TypedDocument>::from_bson_document(document)
                    .map_err(<D::Error as #serde::de::Error>::custom)
            }
        }
    })
}
