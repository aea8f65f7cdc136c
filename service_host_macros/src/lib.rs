use proc_macro::TokenStream;

extern crate proc_macro;

mod bus_pipeline;
mod common;
mod message_handler;

use message_handler::HandlerKind;

#[allow(non_snake_case)]
#[proc_macro_attribute]
pub fn CommandHandler(attr: TokenStream, item: TokenStream) -> TokenStream {
    message_handler::message_handler(HandlerKind::Command, attr, item)
}

#[proc_macro_attribute]
#[allow(non_snake_case)]
pub fn EventHandler(attr: TokenStream, item: TokenStream) -> TokenStream {
    message_handler::message_handler(HandlerKind::Event, attr, item)
}

#[proc_macro_attribute]
#[allow(non_snake_case)]
pub fn BusPipeline(attr: TokenStream, item: TokenStream) -> TokenStream {
    bus_pipeline::bus_pipeline(attr, item)
}
