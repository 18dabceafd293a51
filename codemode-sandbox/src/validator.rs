//! Static checks run before a worker is started.

use codemode_types::SandboxError;
use oxc_allocator::Allocator;
use oxc_ast::ast::Expression;
use oxc_parser::Parser;
use oxc_span::{GetSpan, SourceType};

/// Check that `code` is exactly one function expression and return its
/// source text.
///
/// The whole script is parsed as a single expression, so trailing tokens
/// fail the parse. Surrounding comments and parentheses are dropped from
/// the returned text; only the function itself is ever compiled.
///
/// # Errors
///
/// [`SandboxError::InvalidScript`] for empty, oversized, unparsable or
/// non-function scripts.
pub fn validate_script(code: &str, max_bytes: usize) -> Result<&str, SandboxError> {
    if code.len() > max_bytes {
        return Err(invalid(format!(
            "script is {} bytes; the limit is {max_bytes} bytes",
            code.len()
        )));
    }

    let allocator = Allocator::default();
    let expression = match Parser::new(&allocator, code, SourceType::cjs()).parse_expression() {
        Ok(expression) => expression,
        Err(_) if is_blank(code) => return Err(invalid("script is empty")),
        Err(errors) => {
            let detail = errors
                .first()
                .map_or_else(|| "unknown parse error".to_string(), ToString::to_string);
            return Err(invalid(format!("script does not parse: {detail}")));
        }
    };

    let mut function = &expression;
    while let Expression::ParenthesizedExpression(inner) = function {
        function = &inner.expression;
    }
    match function {
        Expression::ArrowFunctionExpression(_) | Expression::FunctionExpression(_) => {
            let span = function.span();
            Ok(&code[span.start as usize..span.end as usize])
        }
        _ => Err(invalid(
            "script must be a single function expression such as `async () => { ... }`",
        )),
    }
}

fn invalid(message: impl Into<String>) -> SandboxError {
    SandboxError::InvalidScript {
        message: message.into(),
    }
}

fn is_blank(mut code: &str) -> bool {
    loop {
        code = code.trim_start();
        if let Some(rest) = code.strip_prefix("//") {
            code = rest.split_once('\n').map_or("", |(_, tail)| tail);
        } else if let Some(rest) = code.strip_prefix("/*") {
            code = rest.split_once("*/").map_or("", |(_, tail)| tail);
        } else {
            return code.is_empty();
        }
    }
}
