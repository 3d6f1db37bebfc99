use async_trait::async_trait;
use std::collections::HashMap;

/// Extra HTTP headers sent with the opening handshake
pub type Headers = HashMap<String, String>;

/// Trait for providing handshake headers dynamically
///
/// Called once per connection attempt (including reconnections), so
/// tokens and timestamps can be refreshed on every handshake.
///
/// # Example
/// ```ignore
/// struct BearerToken {
///     token: String,
/// }
///
/// #[async_trait::async_trait]
/// impl HeaderProvider for BearerToken {
///     async fn get_headers(&self) -> Headers {
///         let mut headers = Headers::new();
///         headers.insert("Authorization".to_string(), format!("Bearer {}", self.token));
///         headers
///     }
/// }
/// ```
#[async_trait]
pub trait HeaderProvider: Send + Sync {
    /// Headers for the next handshake
    async fn get_headers(&self) -> Headers;
}

/// A header provider that adds nothing
pub struct NoHeaders;

#[async_trait]
impl HeaderProvider for NoHeaders {
    async fn get_headers(&self) -> Headers {
        HashMap::new()
    }
}

/// Fixed set of headers, reused for every handshake
pub struct StaticHeaders(pub Headers);

#[async_trait]
impl HeaderProvider for StaticHeaders {
    async fn get_headers(&self) -> Headers {
        self.0.clone()
    }
}
