// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod context;
mod events;
mod manager;
mod session;

pub use context::{build_context, BuilderMessage, BuiltContext, Compaction};
pub use events::SessionEvent;
pub use manager::{ProviderFactory, SendOutcome, SessionManager, SessionOptions};
pub use session::{repair_orphans, SessionState};
