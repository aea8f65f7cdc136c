use crate::common::register_fn_name;
use proc_macro::TokenStream;
use quote::quote;
use syn::{ItemImpl, Meta, PathArguments, parse_macro_input};

#[derive(Clone, Copy)]
pub enum HandlerKind {
    Command,
    Event,
}

impl HandlerKind {
    fn attribute(self) -> &'static str {
        match self {
            HandlerKind::Command => "CommandHandler",
            HandlerKind::Event => "EventHandler",
        }
    }
}

enum Mode {
    Default,
    Factory,
}

fn parse_mode(kind: HandlerKind, meta: Meta) -> Mode {
    match meta {
        Meta::Path(path) if path.is_ident("factory") => Mode::Factory,
        _ => panic!(
            "Expected #[{0}] or #[{0}(factory)]",
            kind.attribute()
        ),
    }
}

pub fn message_handler(kind: HandlerKind, attr: TokenStream, item: TokenStream) -> TokenStream {
    let mode = if attr.is_empty() {
        Mode::Default
    } else {
        let meta = parse_macro_input!(attr as Meta);
        parse_mode(kind, meta)
    };

    let input = parse_macro_input!(item as ItemImpl);
    let self_ty = &input.self_ty;

    let trait_args = input
        .trait_
        .as_ref()
        .unwrap_or_else(|| panic!("#[{}] expects a trait impl", kind.attribute()))
        .1
        .segments
        .last()
        .expect("Expected trait path")
        .arguments
        .clone();

    let PathArguments::AngleBracketed(generic_args) = trait_args else {
        panic!("#[{}] expects <TMessage, TError> on the handler trait", kind.attribute());
    };

    let mut args = generic_args.args.iter();
    let message_ty = args.next().expect("Missing TMessage").clone();
    let error_ty = args.next().expect("Missing TError").clone();

    // one type may handle several messages, so the trait arguments are part
    // of the generated name
    let type_name = quote!(#self_ty #message_ty #error_ty).to_string();

    let (prefix, register, factory_trait) = match kind {
        HandlerKind::Command => (
            "command",
            quote!(::service_host::core::registry::command_handler),
            quote!(::service_host::core::factory::CommandProvidesFactory),
        ),
        HandlerKind::Event => (
            "event",
            quote!(::service_host::core::registry::event_handler),
            quote!(::service_host::core::factory::EventProvidesFactory),
        ),
    };
    let fn_name = register_fn_name(prefix, &type_name);

    let factory_expr = match mode {
        Mode::Default => quote! {
            |_: &::service_host::core::services::ServiceProvider| {
                Ok(::core::default::Default::default())
            }
        },
        Mode::Factory => quote! {
            |provider: &::service_host::core::services::ServiceProvider| {
                <#self_ty as #factory_trait<#self_ty, #message_ty, #error_ty>>::factory(provider)
            }
        },
    };

    let expanded = quote! {
        #input

        #[doc(hidden)]
        #[::ctor::ctor]
        fn #fn_name() {
            let _ = #register::<#self_ty, #message_ty, #error_ty, _>(#factory_expr);
        }
    };

    TokenStream::from(expanded)
}
