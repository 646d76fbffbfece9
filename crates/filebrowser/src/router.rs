//! Message router for dispatching requests to the file manager.
//!
//! This module provides the [`Router`] struct that receives protocol
//! messages, runs the matching [`FileManager`] operation and turns the
//! outcome into a response message. Failures become
//! [`Message::Error`] responses carrying an [`ErrorCode`].

use std::sync::Arc;

use protocol::messages::{
    CreateDirRequest, DeleteRequest, EntryRef, ListRequest, RenameRequest, Renamed,
    SaveTextRequest, TextContent, UploadRequest, Uploaded, VersionsResponse,
};
use protocol::{Envelope, ErrorCode, ErrorMessage, Message, ProtocolError};
use tracing::{debug, warn};

use crate::files::{join_relative, FileManager, FilesError};

/// Result type for router operations.
pub type RouterResult = Result<Message, RouterError>;

/// Errors that can occur during message routing.
#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    /// File operation error.
    #[error(transparent)]
    Files(#[from] FilesError),

    /// Invalid request.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl RouterError {
    /// Convert the error to a protocol ErrorMessage.
    pub fn to_error_message(&self, context: Option<String>) -> ErrorMessage {
        let code = match self {
            RouterError::Files(e) => e.code(),
            RouterError::InvalidRequest(_) => ErrorCode::InvalidRequest,
        };

        ErrorMessage {
            code,
            message: self.to_string(),
            context,
        }
    }
}

/// Dispatches request messages to a [`FileManager`].
pub struct Router {
    manager: Arc<FileManager>,
}

impl Router {
    /// Create a new router over the given manager.
    pub fn new(manager: Arc<FileManager>) -> Self {
        Self { manager }
    }

    /// The manager requests are dispatched to.
    pub fn manager(&self) -> &FileManager {
        &self.manager
    }

    /// Route a message and return the response, errors included.
    pub fn route(&self, message: Message) -> Message {
        let context = request_context(&message);
        match self.dispatch(message) {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, context = ?context, "Request failed");
                Message::Error(e.to_error_message(context))
            }
        }
    }

    /// Route the payload of an envelope; the response keeps its sequence
    /// number.
    pub fn handle(&self, envelope: Envelope) -> Envelope {
        debug!(sequence = envelope.sequence, "Handling envelope");
        Envelope::new(envelope.sequence, self.route(envelope.payload))
    }

    /// Handle one JSON-encoded envelope and return the JSON response.
    ///
    /// Undecodable input is answered with an `InvalidRequest` error in an
    /// envelope with sequence 0.
    pub fn handle_json(&self, json: &str) -> Result<String, ProtocolError> {
        let response = match Envelope::from_json(json) {
            Ok(envelope) => self.handle(envelope),
            Err(e) => {
                warn!(error = %e, "Rejecting undecodable request");
                let error = RouterError::InvalidRequest(e.to_string());
                Envelope::new(0, Message::Error(error.to_error_message(None)))
            }
        };
        response.to_json()
    }

    fn dispatch(&self, message: Message) -> RouterResult {
        match message {
            Message::ListRequest(req) => self.handle_list(req),
            Message::CreateDirRequest(req) => self.handle_create_dir(req),
            Message::UploadRequest(req) => self.handle_upload(req),
            Message::DeleteRequest(req) => self.handle_delete(req),
            Message::RenameRequest(req) => self.handle_rename(req),
            Message::ReadTextRequest(req) => self.handle_read_text(req),
            Message::SaveTextRequest(req) => self.handle_save_text(req),
            Message::VersionsRequest(req) => self.handle_versions(req),
            other => Err(RouterError::InvalidRequest(format!(
                "{} is not a request",
                message_name(&other)
            ))),
        }
    }

    fn handle_list(&self, req: ListRequest) -> RouterResult {
        debug!(dir = %req.dir, page = req.page, "Listing directory");
        let listing = self.manager.browser().list(&req)?;
        Ok(Message::ListResponse(listing.to_protocol()))
    }

    fn handle_create_dir(&self, req: CreateDirRequest) -> RouterResult {
        let name = self.manager.create_dir(&req.dir, &req.name)?;
        Ok(Message::DirCreated(EntryRef { dir: req.dir, name }))
    }

    fn handle_upload(&self, req: UploadRequest) -> RouterResult {
        debug!(dir = %req.dir, file_name = %req.file_name, size = req.data.len(), "Uploading file");
        let name = self.manager.upload(&req.dir, &req.file_name, &req.data)?;
        Ok(Message::Uploaded(Uploaded {
            dir: req.dir,
            name,
            size: req.data.len() as u64,
        }))
    }

    fn handle_delete(&self, req: DeleteRequest) -> RouterResult {
        let entry = self.manager.delete(&req.dir, &req.name)?;
        Ok(Message::Deleted(EntryRef {
            dir: req.dir,
            name: entry.name,
        }))
    }

    fn handle_rename(&self, req: RenameRequest) -> RouterResult {
        let new_name = self.manager.rename(&req.dir, &req.name, &req.new_name)?;
        Ok(Message::Renamed(Renamed {
            dir: req.dir,
            old_name: req.name,
            new_name,
        }))
    }

    fn handle_read_text(&self, req: EntryRef) -> RouterResult {
        let content = self.manager.read_text(&req.dir, &req.name)?;
        Ok(Message::TextContent(TextContent {
            dir: req.dir,
            name: req.name,
            content,
        }))
    }

    fn handle_save_text(&self, req: SaveTextRequest) -> RouterResult {
        self.manager.save_text(&req.dir, &req.name, &req.content)?;
        Ok(Message::TextSaved(EntryRef {
            dir: req.dir,
            name: req.name,
        }))
    }

    fn handle_versions(&self, req: EntryRef) -> RouterResult {
        let versions = self.manager.versions(&req.dir, &req.name)?;
        Ok(Message::VersionsResponse(VersionsResponse {
            dir: req.dir,
            name: req.name,
            versions,
        }))
    }
}

/// Path a request is about, for error context.
fn request_context(message: &Message) -> Option<String> {
    let (dir, name) = match message {
        Message::ListRequest(req) => return Some(req.dir.clone()).filter(|dir| !dir.is_empty()),
        Message::CreateDirRequest(req) => (req.dir.as_str(), req.name.as_str()),
        Message::UploadRequest(req) => (req.dir.as_str(), req.file_name.as_str()),
        Message::DeleteRequest(req) => (req.dir.as_str(), req.name.as_str()),
        Message::RenameRequest(req) => (req.dir.as_str(), req.name.as_str()),
        Message::ReadTextRequest(req) | Message::VersionsRequest(req) => {
            (req.dir.as_str(), req.name.as_str())
        }
        Message::SaveTextRequest(req) => (req.dir.as_str(), req.name.as_str()),
        _ => return None,
    };
    Some(join_relative(dir, name))
}

fn message_name(message: &Message) -> &'static str {
    match message {
        Message::ListResponse(_) => "ListResponse",
        Message::DirCreated(_) => "DirCreated",
        Message::Uploaded(_) => "Uploaded",
        Message::Deleted(_) => "Deleted",
        Message::Renamed(_) => "Renamed",
        Message::TextContent(_) => "TextContent",
        Message::TextSaved(_) => "TextSaved",
        Message::VersionsResponse(_) => "VersionsResponse",
        Message::Error(_) => "Error",
        _ => "request",
    }
}
