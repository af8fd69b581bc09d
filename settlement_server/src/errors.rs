use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use settlement_engine::OrderFlowError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("Could not read request path: {0}")]
    InvalidRequestPath(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error(transparent)]
    OrderFlow(#[from] OrderFlowError),
}

impl ServerError {
    /// The taxonomy name carried in the error body, so clients can branch without parsing messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidRequestBody(_) | Self::InvalidRequestPath(_) => "Validation",
            Self::OrderFlow(e) => match e {
                OrderFlowError::ValidationError(_) => "Validation",
                OrderFlowError::OrderNotFound(_) => "OrderNotFound",
                OrderFlowError::InvalidTransition { .. } => "InvalidTransition",
                OrderFlowError::PaymentSessionAlreadyOpen(_) => "PaymentSessionAlreadyOpen",
                OrderFlowError::PaymentSessionMissing(_) => "PaymentSessionMissing",
                OrderFlowError::UpstreamGatewayError(_) => "UpstreamGateway",
                OrderFlowError::TransientStoreError(_) => "TransientStore",
            },
            _ => "Internal",
        }
    }
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::OrderFlow(e) => match e {
                OrderFlowError::ValidationError(_) => StatusCode::BAD_REQUEST,
                OrderFlowError::OrderNotFound(_) => StatusCode::NOT_FOUND,
                OrderFlowError::InvalidTransition { .. } => StatusCode::CONFLICT,
                OrderFlowError::PaymentSessionAlreadyOpen(_) => StatusCode::CONFLICT,
                OrderFlowError::PaymentSessionMissing(_) => StatusCode::BAD_REQUEST,
                OrderFlowError::UpstreamGatewayError(_) => StatusCode::BAD_GATEWAY,
                OrderFlowError::TransientStoreError(_) => StatusCode::SERVICE_UNAVAILABLE,
            },
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string(), "kind": self.kind() }).to_string())
    }
}
