use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use std::collections::BTreeMap;
use syn::spanned::Spanned;
use syn::{Data, DeriveInput, Fields, LitInt, Variant, parse_macro_input};

/// Reads the single optional `#[code(n)]` attribute of a variant.
fn variant_code(variant: &Variant) -> syn::Result<Option<u32>> {
    let mut tagged = variant.attrs.iter().filter(|a| a.path().is_ident("code"));
    let Some(attr) = tagged.next() else {
        return Ok(None);
    };
    if let Some(extra) = tagged.next() {
        return Err(syn::Error::new(extra.span(), "`code` given more than once"));
    }
    let code: u32 = attr.parse_args::<LitInt>()?.base10_parse()?;
    if code == 0 {
        return Err(syn::Error::new(attr.span(), "business codes start at 1"));
    }
    Ok(Some(code))
}

fn wildcard_pattern(variant: &Variant) -> TokenStream2 {
    let name = &variant.ident;
    match variant.fields {
        Fields::Unit => quote!(Self::#name),
        Fields::Unnamed(_) => quote!(Self::#name(..)),
        Fields::Named(_) => quote!(Self::#name { .. }),
    }
}

fn expand(input: DeriveInput) -> syn::Result<TokenStream2> {
    let Data::Enum(data) = &input.data else {
        return Err(syn::Error::new(
            input.ident.span(),
            "LobbyBusinessError can only be derived for enums",
        ));
    };
    let ident = &input.ident;

    let mut seen = BTreeMap::<u32, &Variant>::new();
    let mut arms = Vec::new();
    let mut guards = Vec::new();
    for variant in &data.variants {
        let Some(code) = variant_code(variant)? else {
            continue;
        };
        if let Some(first) = seen.insert(code, variant) {
            return Err(syn::Error::new(
                variant.ident.span(),
                format!("code {code} already used by `{}`", first.ident),
            ));
        }
        let pat = wildcard_pattern(variant);
        arms.push(quote!(#pat => Some(#code),));

        // Codes must also be unique across enums, which only the linker can see.
        let guard = format_ident!("__LOBBY_ERR_CODE_{}_{}", ident, variant.ident);
        let symbol = format!("__lobby_err_code__{code}");
        guards.push(quote! {
            #[doc(hidden)]
            #[used]
            #[unsafe(export_name = #symbol)]
            #[allow(non_upper_case_globals)]
            static #guard: [u8; 0] = [];
        });
    }

    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    Ok(quote! {
        #[automatically_derived]
        impl #impl_generics crate::errors::LobbyBusinessErrCode for #ident #ty_generics #where_clause {
            fn code(&self) -> Option<u32> {
                #[allow(unreachable_patterns)]
                match self {
                    #(#arms)*
                    _ => None,
                }
            }
        }
        #(#guards)*
    })
}

/// Derives `crate::errors::LobbyBusinessErrCode` for an error enum.
///
/// Variants tagged `#[code(n)]` report `Some(n)`, the rest `None`. A code repeated
/// within one enum is a compile error; one repeated across enums fails to link.
#[proc_macro_derive(LobbyBusinessError, attributes(code))]
pub fn derive_lobby_err_code(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand(input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}
