use crate::common::register_fn_name;
use proc_macro::TokenStream;
use quote::quote;
use syn::{ItemImpl, parse_macro_input};

pub fn bus_pipeline(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as ItemImpl);
    let self_ty = &input.self_ty;

    let type_name = quote!(#self_ty).to_string();
    let fn_name = register_fn_name("pipeline", &type_name);

    let expanded = quote! {
        #input

        #[doc(hidden)]
        #[::ctor::ctor]
        fn #fn_name() {
            ::service_host::core::registry::bus_pipeline(|| {
                ::std::sync::Arc::new(<#self_ty as ::core::default::Default>::default())
            });
        }
    };

    TokenStream::from(expanded)
}
