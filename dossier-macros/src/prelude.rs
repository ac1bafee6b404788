pub(crate) use crate::utils::{extract, krate};
pub use darling::FromAttributes;
pub use heck::ToSnakeCase;
pub use itertools::Itertools;
pub use proc_macro2::{Span, TokenStream};
pub use quote::{format_ident, quote};
pub use syn::{
    Data, DeriveInput, Error, Field, Fields, FieldsNamed, Ident, LitStr, Result, parse2,
    spanned::Spanned,
};
