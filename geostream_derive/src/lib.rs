//! Procedural macros shared by the geostream crates.
//!
//! Currently this is only [`macro@context`], which attaches a formatted `anyhow` context
//! message to every error returned from the annotated function.

mod args;

use crate::args::ContextArgs;
use proc_macro::TokenStream;
use proc_macro2::{Ident, Span};
use quote::{ToTokens, quote};
use syn::parse_macro_input;

/// Wraps the error of a `Result`-returning function with a formatted context message.
///
/// ```ignore
/// #[context("reading page {index} of '{}'", self.name)]
/// async fn read_page(&self, index: u64) -> Result<Blob> { ... }
/// ```
///
/// Works for sync and async functions. Prefix the arguments with `move,` to move captured
/// values into the wrapped body.
#[proc_macro_attribute]
pub fn context(args: TokenStream, input: TokenStream) -> TokenStream {
	let ContextArgs {
		move_token,
		format_args,
	} = parse_macro_input!(args);
	let mut function = parse_macro_input!(input as syn::ItemFn);

	let body = &function.block;
	let output = &function.sig.output;
	let err = Ident::new("err", Span::mixed_site());

	let wrapped = if function.sig.asyncness.is_some() {
		let result_type = match output {
			syn::ReturnType::Default => {
				return syn::Error::new_spanned(function, "#[context] requires a function returning Result")
					.to_compile_error()
					.into();
			}
			syn::ReturnType::Type(_, ty) => ty,
		};
		let result = Ident::new("result", Span::mixed_site());
		quote! {
			let #result: #result_type = async #move_token { #body }.await;
			#result.map_err(|#err| #err.context(format!(#format_args)).into())
		}
	} else {
		let once = Ident::new("once", Span::mixed_site());
		quote! {
			// A moved non-Copy value keeps the closure FnOnce for the borrow checker.
			let #once = ::core::iter::empty::<()>();
			(#move_token || #output {
				::core::mem::drop(#once);
				#body
			})().map_err(|#err| #err.context(format!(#format_args)).into())
		}
	};
	function.block.stmts = vec![syn::Stmt::Expr(syn::Expr::Verbatim(wrapped), None)];

	function.into_token_stream().into()
}
