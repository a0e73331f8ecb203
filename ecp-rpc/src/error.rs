//! Error handling for the wire protocol.

/// An error that may occur when exchanging messages with a signer.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An I/O error on the underlying stream.
    #[error("I/O error while {context}:\n{source}")]
    Io {
        /// The short description of the operation.
        ///
        /// This is meant to complete the sentence "I/O error while ".
        context: &'static str,

        /// The source error.
        source: std::io::Error,
    },

    /// A message can not be serialized or deserialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A frame exceeds the maximum frame size.
    #[error("Frame of {len} bytes exceeds the maximum of {max} bytes")]
    FrameTooLarge {
        /// The size of the frame.
        len: usize,

        /// The maximum frame size.
        max: usize,
    },

    /// The peer closed the stream while a response was outstanding.
    #[error("Connection closed by the signer")]
    ConnectionClosed,

    /// A response does not belong to the outstanding request.
    #[error("Response id {actual} does not match request id {expected}")]
    UnexpectedResponseId {
        /// The id of the outstanding request.
        expected: u64,

        /// The id found in the response.
        actual: u64,
    },

    /// A response carries neither a result nor an error.
    #[error("Response {id} carries neither a result nor an error")]
    EmptyResponse {
        /// The id of the response.
        id: u64,
    },

    /// A response carries a result of the wrong kind.
    #[error("Unexpected {actual} reply to a {call} call")]
    UnexpectedReply {
        /// The name of the call.
        call: &'static str,

        /// The name of the reply.
        actual: &'static str,
    },

    /// A request uses a protocol version the peer does not speak.
    #[error("Unsupported protocol version {actual}, expected {expected}")]
    UnsupportedVersion {
        /// The version found in the request.
        actual: u32,

        /// The version spoken by the peer.
        expected: u32,
    },

    /// The signer answered a call with an error.
    #[error("{0}")]
    Remote(String),
}
