//! Remote-procedure proxy seam.
//!
//! Building a proxy (transport selection, endpoint resolution) happens
//! outside this crate. Anything that can answer request/response calls for
//! one service endpoint implements [`ServiceProxy`].

use crate::error::ProxyError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Address of a single remote service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceEndpoint {
    pub service_id: String,
    pub host: String,
}

impl ServiceEndpoint {
    pub fn new(service_id: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            service_id: service_id.into(),
            host: host.into(),
        }
    }

    /// Endpoint on the public boundary host, `https://{service_id}.ic0.app`.
    pub fn public(service_id: impl Into<String>) -> Self {
        let service_id = service_id.into();
        let host = format!("https://{}.ic0.app", service_id);
        Self { service_id, host }
    }
}

/// Callable stub for one remote service.
pub trait ServiceProxy: Send + Sync {
    fn endpoint(&self) -> &ServiceEndpoint;

    /// Raw request/response call.
    fn call(&self, method: &str, args: &[u8]) -> Result<Vec<u8>, ProxyError>;

    /// Typed call with JSON-encoded arguments and reply.
    fn call_json<Req, Resp>(&self, method: &str, request: &Req) -> Result<Resp, ProxyError>
    where
        Self: Sized,
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        let args = serde_json::to_vec(request).map_err(|e| ProxyError::Encode {
            method: method.to_string(),
            message: e.to_string(),
        })?;
        let reply = self.call(method, &args)?;
        serde_json::from_slice(&reply).map_err(|e| ProxyError::MalformedReply {
            method: method.to_string(),
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct EchoProxy {
        endpoint: ServiceEndpoint,
    }

    impl ServiceProxy for EchoProxy {
        fn endpoint(&self) -> &ServiceEndpoint {
            &self.endpoint
        }

        fn call(&self, method: &str, args: &[u8]) -> Result<Vec<u8>, ProxyError> {
            match method {
                "echo" => Ok(args.to_vec()),
                "garbage" => Ok(b"not json".to_vec()),
                _ => Err(ProxyError::Rejected {
                    method: method.to_string(),
                    message: "unknown method".to_string(),
                }),
            }
        }
    }

    fn proxy() -> EchoProxy {
        EchoProxy {
            endpoint: ServiceEndpoint::public("rrkah-fqaaa-aaaaa-aaaaq-cai"),
        }
    }

    #[test]
    fn test_public_endpoint() {
        let endpoint = proxy().endpoint().clone();
        assert_eq!(endpoint.host, "https://rrkah-fqaaa-aaaaa-aaaaq-cai.ic0.app");
        assert_eq!(endpoint.service_id, "rrkah-fqaaa-aaaaa-aaaaq-cai");
    }

    #[test]
    fn test_call_json() {
        let reply: serde_json::Value = proxy()
            .call_json("echo", &json!({"message": "hi"}))
            .unwrap();
        assert_eq!(reply["message"], "hi");
    }

    #[test]
    fn test_call_errors() {
        let rejected = proxy().call_json::<_, serde_json::Value>("missing", &json!({}));
        assert!(matches!(rejected, Err(ProxyError::Rejected { .. })));

        let malformed = proxy().call_json::<_, serde_json::Value>("garbage", &json!({}));
        assert!(matches!(malformed, Err(ProxyError::MalformedReply { .. })));
    }

    #[test]
    fn test_unencodable_request_is_not_sent() {
        // JSON object keys must be strings.
        let request: std::collections::BTreeMap<(u8, u8), u8> = [((1, 2), 3)].into_iter().collect();

        let result = proxy().call_json::<_, serde_json::Value>("echo", &request);
        match result {
            Err(ProxyError::Encode { method, .. }) => assert_eq!(method, "echo"),
            other => panic!("Expected encode error, got {:?}", other),
        }
    }
}
