use proc_macro2::TokenStream as TokenStream2;
use syn::Token;
use syn::parse::{self, Parse, ParseStream};

/// Arguments of `#[context(...)]`: an optional leading `move,` followed by `format!` arguments.
#[derive(Debug)]
pub struct ContextArgs {
	pub move_token: Option<Token![move]>,
	pub format_args: TokenStream2,
}

impl Parse for ContextArgs {
	fn parse(input: ParseStream<'_>) -> parse::Result<Self> {
		let move_token = if input.peek(Token![move]) {
			let token = input.parse()?;
			input.parse::<Token![,]>()?;
			Some(token)
		} else {
			None
		};
		Ok(Self {
			move_token,
			format_args: input.parse()?,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::ContextArgs;
	use syn::parse_str;

	#[test]
	fn plain_format_string() {
		let args: ContextArgs = parse_str("\"reading page {}\", index").unwrap();
		assert!(args.move_token.is_none());
		assert_eq!(args.format_args.to_string(), "\"reading page {}\" , index");
	}

	#[test]
	fn leading_move() {
		let args: ContextArgs = parse_str("move, \"opening {key}\"").unwrap();
		assert!(args.move_token.is_some());
		assert_eq!(args.format_args.to_string(), "\"opening {key}\"");
	}

	#[test]
	fn move_requires_comma() {
		let err = parse_str::<ContextArgs>("move \"x\"").unwrap_err();
		assert!(err.to_string().contains(','), "unexpected error: {err}");
	}
}
