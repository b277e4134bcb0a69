//! # Authenticated Dispersal Handshake
//!
//! State machine for the challenge/response exchange on one bidirectional
//! stream:
//!
//! ```text
//! Init --send request--> SentRequest --recv challenge--> AwaitingChallenge
//!   --send auth data--> SentAuthData --> AwaitingFinalReply --recv reply--> Done
//! ```
//!
//! Any unexpected message moves the machine to `Failed`, which is terminal.
//! The machine performs no I/O; the caller drives the stream and feeds each
//! received message in.

use crate::domain::errors::DisperserError;
use shared_types::{
    AuthenticatedReply, AuthenticatedRequest, AuthenticationData, BlobAuthChallenge,
    DisperseBlobReply, DisperseBlobRequest,
};
use std::fmt;

/// Handshake states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    /// Nothing sent yet.
    Init,
    /// Dispersal request sent, challenge not yet received.
    SentRequest,
    /// Challenge received, to be signed.
    AwaitingChallenge,
    /// Signed challenge sent.
    SentAuthData,
    /// Waiting for the dispersal result.
    AwaitingFinalReply,
    /// Result received.
    Done,
    /// Protocol violated or stream broke.
    Failed,
}

impl HandshakeState {
    /// State name, for errors and metrics.
    pub fn name(self) -> &'static str {
        match self {
            Self::Init => "Init",
            Self::SentRequest => "SentRequest",
            Self::AwaitingChallenge => "AwaitingChallenge",
            Self::SentAuthData => "SentAuthData",
            Self::AwaitingFinalReply => "AwaitingFinalReply",
            Self::Done => "Done",
            Self::Failed => "Failed",
        }
    }

    /// `Done` or `Failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl fmt::Display for HandshakeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One authenticated dispersal exchange.
#[derive(Debug)]
pub struct AuthenticatedHandshake {
    state: HandshakeState,
    request: Option<DisperseBlobRequest>,
    challenge: Option<BlobAuthChallenge>,
}

impl AuthenticatedHandshake {
    /// New handshake for `request`, which must carry the requester's account id.
    pub fn new(request: DisperseBlobRequest) -> Self {
        Self {
            state: HandshakeState::Init,
            request: Some(request),
            challenge: None,
        }
    }

    /// Current state.
    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// Challenge received from the server, once in `AwaitingChallenge` or later.
    pub fn challenge(&self) -> Option<BlobAuthChallenge> {
        self.challenge
    }

    /// `Init → SentRequest`: first stream message.
    pub fn request_message(&mut self) -> Result<AuthenticatedRequest, DisperserError> {
        self.require(HandshakeState::Init, "DisperseRequest")?;
        let Some(request) = self.request.take() else {
            return Err(self.violation("DisperseRequest", "request already consumed".into()));
        };
        self.state = HandshakeState::SentRequest;
        Ok(AuthenticatedRequest::DisperseRequest(request))
    }

    /// `SentRequest → AwaitingChallenge`: the reply must be a challenge.
    pub fn receive_challenge(
        &mut self,
        reply: AuthenticatedReply,
    ) -> Result<BlobAuthChallenge, DisperserError> {
        self.require(HandshakeState::SentRequest, "BlobAuthHeader")?;
        match reply {
            AuthenticatedReply::BlobAuthHeader(challenge) => {
                self.challenge = Some(challenge);
                self.state = HandshakeState::AwaitingChallenge;
                Ok(challenge)
            }
            other => Err(self.violation("BlobAuthHeader", other.kind().to_string())),
        }
    }

    /// `AwaitingChallenge → SentAuthData`: second stream message carrying the signed challenge.
    pub fn authentication_message(
        &mut self,
        signature: Vec<u8>,
    ) -> Result<AuthenticatedRequest, DisperserError> {
        self.require(HandshakeState::AwaitingChallenge, "AuthenticationData")?;
        self.state = HandshakeState::SentAuthData;
        Ok(AuthenticatedRequest::AuthenticationData(AuthenticationData {
            authentication_data: signature,
        }))
    }

    /// `SentAuthData → AwaitingFinalReply`, entered before blocking on the stream.
    pub fn expect_final_reply(&mut self) -> Result<(), DisperserError> {
        self.require(HandshakeState::SentAuthData, "DisperseReply")?;
        self.state = HandshakeState::AwaitingFinalReply;
        Ok(())
    }

    /// `AwaitingFinalReply → Done`: the reply must be the dispersal result.
    pub fn receive_final_reply(
        &mut self,
        reply: AuthenticatedReply,
    ) -> Result<DisperseBlobReply, DisperserError> {
        self.require(HandshakeState::AwaitingFinalReply, "DisperseReply")?;
        match reply {
            AuthenticatedReply::DisperseReply(result) => {
                self.state = HandshakeState::Done;
                Ok(result)
            }
            other => Err(self.violation("DisperseReply", other.kind().to_string())),
        }
    }

    /// Abort after a transport error or deadline. Returns the state the
    /// handshake was in when it failed.
    pub fn fail(&mut self) -> HandshakeState {
        let previous = self.state;
        if !previous.is_terminal() {
            self.state = HandshakeState::Failed;
        }
        previous
    }

    fn require(
        &mut self,
        expected: HandshakeState,
        message: &'static str,
    ) -> Result<(), DisperserError> {
        if self.state == expected {
            return Ok(());
        }
        Err(self.violation(message, format!("local step while in {}", self.state)))
    }

    // Records the failure; the returned error names the state it happened in.
    fn violation(&mut self, expected: &'static str, received: String) -> DisperserError {
        let state = self.state.name();
        self.state = HandshakeState::Failed;
        DisperserError::ProtocolSequence {
            state,
            expected,
            received,
        }
    }
}
