// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use async_trait::async_trait;

use crate::{ChatRequest, ChatResponse, ModelError, SegmentSink};

/// Uniform contract over chat-completion providers.
///
/// When `sink` is given and the request streams, the driver forwards
/// incremental `content` fragments as [`SegmentKind::Content`] and any
/// provider reasoning channel as [`SegmentKind::Reasoning`], then returns
/// the fully accumulated response.  Without a sink the same response is
/// returned silently.
///
/// [`SegmentKind::Content`]: crate::SegmentKind::Content
/// [`SegmentKind::Reasoning`]: crate::SegmentKind::Reasoning
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Stable adapter identifier for status display and logging.
    fn name(&self) -> &str;

    /// Default model identifier used when the request does not carry one.
    fn model_name(&self) -> &str;

    /// Send one completion request and return the (synthesized) response.
    async fn chat(
        &self,
        req: ChatRequest,
        sink: Option<&SegmentSink>,
    ) -> Result<ChatResponse, ModelError>;
}
