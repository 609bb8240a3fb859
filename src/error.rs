use thiserror::Error;

/// DOM `XPathException` code for an expression that fails to compile.
pub const INVALID_EXPRESSION_ERR: u16 = 51;
/// DOM `XPathException` code for a value used as the wrong type.
pub const TYPE_ERR: u16 = 52;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum XPathError {
    #[error("Invalid expression: {0}")]
    InvalidExpression(String),

    #[error("Type error: {0}")]
    TypeError(String),

    #[error("Function '{function}' error: {message}")]
    FunctionError { function: String, message: String },

    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    #[error("Variable '${0}' is not declared")]
    UnknownVariable(String),

    #[error("Namespace prefix '{0}' cannot be resolved")]
    UnresolvedPrefix(String),

    #[error("Unknown XPath result type: {0}")]
    UnknownResultType(u16),
}

impl XPathError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidExpression(message.into())
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::TypeError(message.into())
    }

    pub fn function(function: impl Into<String>, message: impl Into<String>) -> Self {
        Self::FunctionError {
            function: function.into(),
            message: message.into(),
        }
    }

    /// The DOM `XPathException` code observable through the DOM-3 surface.
    /// Other variants are generic evaluation errors without a DOM code.
    pub fn code(&self) -> Option<u16> {
        match self {
            Self::InvalidExpression(_) => Some(INVALID_EXPRESSION_ERR),
            Self::TypeError(_) | Self::UnknownResultType(_) => Some(TYPE_ERR),
            _ => None,
        }
    }
}
