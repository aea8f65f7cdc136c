use proc_macro2::Ident;
use quote::format_ident;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

fn hash_type_name(ty: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    ty.hash(&mut hasher);
    hasher.finish()
}

/// Unique, valid identifier for the generated `#[ctor]` function.
pub fn register_fn_name(prefix: &str, type_name: &str) -> Ident {
    let sanitized: String = type_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format_ident!("__register_{}_{}_{}", prefix, sanitized, hash_type_name(type_name))
}
