#[warn(clippy::pedantic)]
mod derive_document;
mod derive_entity;
mod prelude;
mod utils;

fn expand<F: FnOnce(proc_macro2::TokenStream) -> syn::Result<proc_macro2::TokenStream>>(
    fun: F,
    input: proc_macro::TokenStream,
) -> proc_macro::TokenStream {
    fun(input.into())
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

/// Implements `Attributes`, `Entity`, `FromDocument` and, unless `#[entity(hooks)]` is
/// given, an empty `Hooks` for a struct with one `#[entity(state)]` field.
///
/// Field options: `#[entity(reserved)]`, `#[entity(rename = "name")]`,
/// `#[entity(setter)]`/`#[entity(setter = "method")]` and the same for `getter`.
#[proc_macro_derive(Entity, attributes(entity))]
pub fn entity(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
    expand(derive_entity::derive_entity, input)
}

/// Implements `Attributes`, `TypedDocument` and `serde` traits for an embedded document.
///
/// Accepts `#[document(on_construct = "method")]` on the struct and the field options of
/// `Entity` under `#[document(...)]`.
#[proc_macro_derive(TypedDocument, attributes(document))]
pub fn typed_document(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
    expand(derive_document::derive_document, input)
}
