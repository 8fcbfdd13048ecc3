use wstudio_api::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("config ({context}): {detail}")]
    Config {
        context: &'static str,
        detail: String,
    },

    #[error("store: {0}")]
    Store(#[from] StoreError),

    #[error("api: {0}")]
    Api(String),

    #[error("signal: {0}")]
    Signal(#[from] std::io::Error),
}

impl ServerError {
    pub fn config(context: &'static str, detail: impl Into<String>) -> Self {
        ServerError::Config {
            context,
            detail: detail.into(),
        }
    }
}
