//! Procedural macros for ez-lang builtin functions
//!
//! Provides the `#[builtin]` attribute macro for defining EZ standard-library
//! functions. The macro leaves the function itself untouched and submits a
//! registration record to the process-wide registry via `inventory`, together
//! with the first rustdoc line as a one-line summary.

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Attribute, ItemFn, Meta};

/// Extract rustdoc comments from function attributes
fn extract_doc_comments(attrs: &[Attribute]) -> String {
    attrs
        .iter()
        .filter_map(|attr| {
            if attr.path().is_ident("doc") {
                if let Meta::NameValue(nv) = &attr.meta {
                    if let syn::Expr::Lit(syn::ExprLit {
                        lit: syn::Lit::Str(lit_str),
                        ..
                    }) = &nv.value
                    {
                        return Some(lit_str.value());
                    }
                }
            }
            None
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Parse builtin attribute arguments: name = "..."
fn parse_builtin_name(attr_stream: TokenStream) -> String {
    let attr_str = attr_stream.to_string();

    let mut name = String::new();
    if let Some(start) = attr_str.find("name = \"") {
        let rest = &attr_str[start + 8..];
        if let Some(end) = rest.find('"') {
            name = rest[..end].to_string();
        }
    }
    name
}

/// Attribute macro for defining EZ builtin functions
///
/// # Attribute Arguments
///
/// - `name`: the qualified EZ name for this builtin (e.g., "strings.upper")
///
/// # Example
///
/// ```ignore
/// #[builtin(name = "strings.upper")]
/// /// Return an uppercased copy of the string.
/// pub fn strings_upper(args: &[Value]) -> Value {
///     // ...
/// }
/// ```
#[proc_macro_attribute]
pub fn builtin(attr: TokenStream, item: TokenStream) -> TokenStream {
    let func = parse_macro_input!(item as ItemFn);

    let ez_name = parse_builtin_name(attr);
    let fn_name = func.sig.ident.clone();

    // Use provided name or fall back to the Rust function name
    let name_to_use = if !ez_name.is_empty() {
        ez_name
    } else {
        fn_name.to_string()
    };

    // First non-empty doc line becomes the registry summary
    let raw_docs = extract_doc_comments(&func.attrs);
    let summary = raw_docs
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("")
        .to_string();

    let expanded = quote! {
        #func

        inventory::submit! {
            crate::registry::BuiltinDef {
                name: #name_to_use,
                summary: #summary,
                func: #fn_name,
            }
        }
    };

    TokenStream::from(expanded)
}
