use thiserror::Error;

#[derive(Error, Debug)]
#[error(transparent)]
pub struct QuarryError(Box<ErrorKind>);

#[derive(Error, Debug)]
pub enum ErrorKind {
    /// Non-2xx response. `message` is what the user gets to see.
    #[error("{message}")]
    Http {
        action: &'static str,
        status: u16,
        message: String,
    },
    #[error("TransportError: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("SerdeJsonError: {0}")]
    SerdeJsonError(#[from] serde_json::Error),
    #[error("UrlParseError: {0}")]
    UrlParseError(#[from] url::ParseError),
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("InvalidInput: {0}")]
    InvalidInput(String),
}

impl<E> From<E> for QuarryError
where
    ErrorKind: From<E>,
{
    fn from(err: E) -> Self {
        QuarryError(Box::new(ErrorKind::from(err)))
    }
}

impl QuarryError {
    pub fn missing(parameter: &'static str) -> Self {
        ErrorKind::MissingParameter(parameter).into()
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        ErrorKind::InvalidInput(message.into()).into()
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.0
    }

    pub fn is_missing_parameter(&self) -> bool {
        matches!(*self.0, ErrorKind::MissingParameter(_))
    }

    pub fn status(&self) -> Option<u16> {
        match *self.0 {
            ErrorKind::Http { status, .. } => Some(status),
            _ => None,
        }
    }
}
