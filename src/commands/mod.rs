/*!
Command handlers for the CLI

This module provides command handlers invoked by the CLI entrypoint:

- `upload`   - Upload a PDF and report the new session
- `chat`     - Interactive chat about an uploaded document
- `history`  - Locally saved conversations
- `sessions` - Sessions held by the server
- `health`   - Server liveness check

Handlers are thin; the work happens in `client`, `chat`, and `storage`.
*/

pub mod chat;
pub mod health;
pub mod history;
pub mod sessions;
pub mod special_commands;
pub mod upload;
