//! Request and result types shared by the client and the offline queue.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// HTTP method of a logical API call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    /// Read; never queued.
    Get,
    /// Create.
    Post,
    /// Replace.
    Put,
    /// Partial update.
    Patch,
    /// Delete.
    Delete,
}

impl Method {
    /// Whether the method has a side effect on server state.
    pub fn is_write(self) -> bool {
        !matches!(self, Self::Get)
    }

    /// Upper-case wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "PATCH" => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            other => Err(Error::internal(format!("unsupported method: {}", other))),
        }
    }
}

impl From<Method> for http::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => http::Method::GET,
            Method::Post => http::Method::POST,
            Method::Put => http::Method::PUT,
            Method::Patch => http::Method::PATCH,
            Method::Delete => http::Method::DELETE,
        }
    }
}

/// The subset of [`Method`] that may be stored in the offline queue.
///
/// Reads are not representable, so a queued record can never be a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WriteMethod {
    /// Create.
    Post,
    /// Replace.
    Put,
    /// Partial update.
    Patch,
    /// Delete.
    Delete,
}

impl TryFrom<Method> for WriteMethod {
    type Error = Error;

    fn try_from(method: Method) -> Result<Self, Self::Error> {
        match method {
            Method::Post => Ok(Self::Post),
            Method::Put => Ok(Self::Put),
            Method::Patch => Ok(Self::Patch),
            Method::Delete => Ok(Self::Delete),
            Method::Get => Err(Error::internal("read requests are never queued")),
        }
    }
}

impl From<WriteMethod> for Method {
    fn from(method: WriteMethod) -> Self {
        match method {
            WriteMethod::Post => Self::Post,
            WriteMethod::Put => Self::Put,
            WriteMethod::Patch => Self::Patch,
            WriteMethod::Delete => Self::Delete,
        }
    }
}

impl fmt::Display for WriteMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Method::from(*self).fmt(f)
    }
}

/// Result of a call through [`ApiClient`](crate::client::ApiClient).
///
/// Failures are reported through [`Error`]; this type enumerates the ways
/// a call can *settle without* an error.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiResponse<T> {
    /// Parsed response payload.
    Data(T),
    /// 204 No Content, or a success response with an empty body.
    Empty,
    /// The server was unreachable; the write was stored durably and will be
    /// replayed when connectivity returns.
    Queued {
        /// Id of the stored queue record.
        id: String,
    },
    /// The session could not be renewed. The navigator has already been
    /// sent to the sign-in page and the caller should not act on this call.
    Abandoned,
}

impl<T> ApiResponse<T> {
    /// The payload, if the server returned one.
    pub fn into_data(self) -> Option<T> {
        match self {
            Self::Data(data) => Some(data),
            _ => None,
        }
    }

    /// Whether the call was parked in the offline queue.
    pub fn is_queued(&self) -> bool {
        matches!(self, Self::Queued { .. })
    }

    /// Whether the call was abandoned after an unrecoverable auth failure.
    pub fn is_abandoned(&self) -> bool {
        matches!(self, Self::Abandoned)
    }

    /// Map the payload, preserving the other variants.
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> ApiResponse<U> {
        match self {
            Self::Data(data) => ApiResponse::Data(f(data)),
            Self::Empty => ApiResponse::Empty,
            Self::Queued { id } => ApiResponse::Queued { id },
            Self::Abandoned => ApiResponse::Abandoned,
        }
    }
}

/// One part of a multipart upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPart {
    /// Form field name.
    pub name: String,
    /// File name reported to the server, if any.
    pub file_name: Option<String>,
    /// MIME type, if known.
    pub mime_type: Option<String>,
    /// Raw bytes.
    pub data: Vec<u8>,
}

/// Multipart form for document uploads.
///
/// Kept as plain data so the client can re-send it after a session refresh.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadForm {
    /// Form parts in submission order.
    pub parts: Vec<UploadPart>,
}

impl UploadForm {
    /// Create an empty form.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a plain text field.
    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.push(UploadPart {
            name: name.into(),
            file_name: None,
            mime_type: None,
            data: value.into().into_bytes(),
        });
        self
    }

    /// Add a file field.
    pub fn file(
        mut self,
        name: impl Into<String>,
        file_name: impl Into<String>,
        mime_type: impl Into<String>,
        data: Vec<u8>,
    ) -> Self {
        self.parts.push(UploadPart {
            name: name.into(),
            file_name: Some(file_name.into()),
            mime_type: Some(mime_type.into()),
            data,
        });
        self
    }

    /// Total payload size in bytes.
    pub fn len_bytes(&self) -> usize {
        self.parts.iter().map(|p| p.data.len()).sum()
    }
}
