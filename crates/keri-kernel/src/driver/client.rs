//! HTTP client for a driver process.

use async_trait::async_trait;
use keri_kernel_core::{
    validate_event_bytes, ControlEvent, Ed25519PublicKey, Ed25519Signature, GroupBody, GroupEvent,
    GroupEventRequest, IdentityState, KeyEvent, Prefix,
};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::types::*;
use crate::config::DriverConfig;
use crate::controller::{Controller, Inception, Rotation};
use crate::error::{KernelError, Result};

/// A [`Controller`] that delegates to a driver over loopback HTTP.
#[derive(Clone)]
pub struct DriverClient {
    base: String,
    client: Client,
}

impl DriverClient {
    pub fn new(config: &DriverConfig) -> Result<Self> {
        Self::with_base(config.base_url(), config)
    }

    /// Connect to an explicit base URL, e.g. `http://127.0.0.1:40123`.
    pub fn with_base(base: impl Into<String>, config: &DriverConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| KernelError::Transport(format!("building http client: {}", e)))?;
        Ok(Self {
            base: base.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base
    }

    /// Fetch `/status`.
    pub async fn status(&self) -> Result<StatusResponse> {
        self.send(self.client.get(self.url("/status"))).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    /// Send a request and decode either the success body or an [`ErrorBody`].
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let resp = request.send().await.map_err(transport)?;
        let status = resp.status();
        if status.is_success() {
            return resp.json::<T>().await.map_err(transport);
        }

        let text = resp.text().await.unwrap_or_default();
        debug!(%status, body = %text, "driver returned error");
        match serde_json::from_str::<ErrorBody>(&text) {
            Ok(body) => Err(body.into_error()),
            Err(_) => Err(KernelError::Transport(format!(
                "driver answered {} {}",
                status, text
            ))),
        }
    }
}

fn transport(e: reqwest::Error) -> KernelError {
    KernelError::Transport(e.to_string())
}

fn malformed(what: &str) -> KernelError {
    KernelError::Transport(format!("driver returned malformed {}", what))
}

#[async_trait]
impl Controller for DriverClient {
    async fn incept(
        &self,
        signing: &Ed25519PublicKey,
        next: &Ed25519PublicKey,
    ) -> Result<Inception> {
        let body = InceptionRequest {
            public_key: signing.to_encoded().to_string(),
            next_public_key: next.to_encoded().to_string(),
        };
        let resp: InceptionResponse = self
            .send(self.client.post(self.url("/inception")).json(&body))
            .await?;
        let identifier = Prefix::parse(&resp.identifier).map_err(|_| malformed("identifier"))?;
        Ok(Inception {
            identifier,
            event: resp.event,
        })
    }

    async fn rotate(
        &self,
        identifier: &Prefix,
        new_signing: &Ed25519PublicKey,
        new_next: &Ed25519PublicKey,
    ) -> Result<Rotation> {
        let body = RotationRequest {
            identifier: identifier.to_string(),
            new_public_key: new_signing.to_encoded().to_string(),
            new_next_public_key: new_next.to_encoded().to_string(),
        };
        let resp: RotationResponse = self
            .send(self.client.post(self.url("/rotation")).json(&body))
            .await?;
        Ok(Rotation {
            event: resp.event,
            sn: resp.sequence_number,
        })
    }

    async fn sign(&self, identifier: &Prefix, payload: &[u8]) -> Result<Ed25519Signature> {
        let body = SignRequest {
            identifier: identifier.to_string(),
            data: encode_b64(payload),
        };
        let resp: SignResponse = self
            .send(self.client.post(self.url("/sign")).json(&body))
            .await?;
        let bytes = decode_b64("signature", &resp.signature).map_err(|_| malformed("signature"))?;
        Ed25519Signature::from_slice(&bytes).ok_or_else(|| malformed("signature"))
    }

    async fn verify(&self, payload: &[u8], signature: &[u8], public_key: &str) -> Result<bool> {
        let body = VerifyRequest {
            data: encode_b64(payload),
            signature: encode_b64(signature),
            public_key: public_key.to_string(),
        };
        let resp: VerifyResponse = self
            .send(self.client.post(self.url("/verify")).json(&body))
            .await?;
        Ok(resp.valid)
    }

    async fn multisig(&self, request: &GroupEventRequest) -> Result<GroupEvent> {
        let resp: MultisigResponse = self
            .send(
                self.client
                    .post(self.url("/generate-multisig-event"))
                    .json(request),
            )
            .await?;

        // The raw bytes must carry the SAID and size the response claims.
        let raw = decode_b64("raw_bytes_b64", &resp.raw_bytes_b64)
            .map_err(|_| malformed("group event"))?;
        let event = match validate_event_bytes(&raw)? {
            ControlEvent::Group(event) => event,
            ControlEvent::Inception(event) => GroupEvent {
                members: resp.members.clone(),
                body: GroupBody::Inception(event),
            },
            ControlEvent::Rotation(_) => return Err(malformed("group event")),
        };
        if event.said() != resp.said || event.prefix() != resp.pre || raw.len() != resp.size {
            return Err(malformed("group event"));
        }
        Ok(event)
    }

    async fn kel(&self, identifier: &Prefix) -> Result<Vec<KeyEvent>> {
        let url = format!("{}/kel?identifier={}", self.base, identifier);
        let resp: KelResponse = self.send(self.client.get(url)).await?;
        Ok(resp.kel)
    }

    async fn state(&self, identifier: &Prefix) -> Result<IdentityState> {
        let url = format!("{}/state?identifier={}", self.base, identifier);
        self.send(self.client.get(url)).await
    }

    async fn create_identity(&self) -> Result<IdentityState> {
        self.send(self.client.post(self.url("/identities"))).await
    }

    async fn rotate_identity(&self, identifier: &Prefix) -> Result<IdentityState> {
        let body = IdentityRotateRequest {
            identifier: identifier.to_string(),
        };
        self.send(self.client.post(self.url("/identities/rotate")).json(&body))
            .await
    }
}
